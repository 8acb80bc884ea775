//! Reading request items from text input.

use abatcher_core::RequestItem;
use anyhow::{Context, Result};

/// Parses one request item per line.
///
/// Blank lines and lines starting with `#` are skipped. Lines that start like
/// JSON (`{`, `[` or `"`) are decoded as items; anything else is a bare URL.
pub fn parse_items(text: &str) -> Result<Vec<RequestItem>> {
    text.lines()
        .enumerate()
        .filter_map(|(n, line)| {
            let line = line.trim();
            (!line.is_empty() && !line.starts_with('#')).then_some((n + 1, line))
        })
        .map(|(line_no, line)| parse_line(line).with_context(|| format!("line {line_no}")))
        .collect()
}

fn parse_line(line: &str) -> Result<RequestItem> {
    if line.starts_with(['{', '[', '"']) {
        serde_json::from_str(line).context("invalid JSON request item")
    } else {
        Ok(RequestItem::Url(line.to_string()))
    }
}
