//! Result output and exit status.

use std::io::Write;

use abatcher_core::{BatchStats, DispatchResult};
use anyhow::{Context, Result};

/// Every request succeeded (or there were none).
pub const EXIT_SUCCESS: u8 = 0;
/// Every request failed, or the run could not complete.
pub const EXIT_FAILURE: u8 = 1;
/// Some requests succeeded and some failed.
pub const EXIT_PARTIAL: u8 = 2;

/// Writes results as a pretty-printed JSON array followed by a newline.
pub fn write_results<W: Write>(mut out: W, results: &[DispatchResult]) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, results).context("failed to serialize results")?;
    writeln!(out).context("failed to write results")?;
    out.flush().context("failed to flush results")
}

/// Maps batch statistics to the process exit code.
pub fn exit_code(stats: &BatchStats) -> u8 {
    match (stats.succeeded(), stats.failed()) {
        (_, 0) => EXIT_SUCCESS,
        (0, _) => EXIT_FAILURE,
        _ => EXIT_PARTIAL,
    }
}
