//! Progress UI (spinner) for batch runs.

use std::time::Duration;

use abatcher_core::DispatchResult;
use indicatif::{ProgressBar, ProgressStyle};

/// Counts finished requests on a terminal spinner.
///
/// Hidden when `enabled` is false, so callers can tick it unconditionally.
pub struct Progress {
    bar: ProgressBar,
    total: usize,
    failed: usize,
}

impl Progress {
    pub fn new(enabled: bool, total: usize) -> Self {
        let bar = if enabled && total > 0 {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner
        } else {
            ProgressBar::hidden()
        };
        let progress = Self {
            bar,
            total,
            failed: 0,
        };
        progress.redraw(0);
        progress
    }

    /// Records one finished request.
    pub fn record(&mut self, result: &DispatchResult) {
        if !result.is_success() {
            self.failed += 1;
        }
        self.bar.inc(1);
        self.redraw(usize::try_from(self.bar.position()).unwrap_or(self.total));
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn redraw(&self, done: usize) {
        let failed = if self.failed > 0 {
            format!(", {} failed", self.failed)
        } else {
            String::new()
        };
        self.bar
            .set_message(format!("[{}/{}] requests done{failed}", done.min(self.total), self.total));
    }
}
