//! CLI argument definitions using clap derive macros.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use abatcher_core::request::STANDARD_METHODS;
use abatcher_core::{BatchConfig, Method};
use clap::Parser;

/// Send a batch of HTTP requests with concurrency and rate limits.
///
/// Requests come from positional URLs, an --input file, or stdin, one per
/// line. A line is either a bare URL or a JSON item: a string, a
/// `[url, params]` pair, or an object with `url`, `method`, `params` and
/// `headers`. Results are printed to stdout as a JSON array in input order.
#[derive(Parser, Debug)]
#[command(name = "abatcher")]
#[command(author, version, about)]
pub struct Args {
    /// URLs to request (read from --input or stdin when omitted)
    pub urls: Vec<String>,

    /// Read request items from a file, one per line
    #[arg(short, long, value_name = "FILE", conflicts_with = "urls")]
    pub input: Option<PathBuf>,

    /// Load batch configuration from a JSON file (flags override it)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Default HTTP method for items that do not name one
    #[arg(short = 'X', long, default_value = "GET", value_parser = parse_method)]
    pub method: Method,

    /// Maximum requests in flight at once
    #[arg(short = 'c', long, value_name = "N")]
    pub max_concurrent: Option<NonZeroUsize>,

    /// Maximum request starts per second
    #[arg(short = 'p', long, value_name = "RATE", value_parser = parse_rate)]
    pub max_per_second: Option<f64>,

    /// Maximum pooled connections kept per host
    #[arg(long, value_name = "N")]
    pub max_connections: Option<NonZeroUsize>,

    /// Per-request timeout in seconds
    #[arg(short = 't', long, value_name = "SECS", value_parser = parse_secs)]
    pub timeout: Option<Duration>,

    /// Retry attempts for transient failures (0-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub retries: Option<u32>,

    /// Negotiate HTTP/2 when the server offers it
    #[arg(long)]
    pub http2: bool,

    /// Base URL that relative request URLs are joined onto
    #[arg(short = 'b', long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Stop at the first failed request
    #[arg(long)]
    pub fail_fast: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Applies command-line overrides on top of `base`.
    pub fn apply_to(&self, mut base: BatchConfig) -> BatchConfig {
        if let Some(base_url) = &self.base_url {
            base.base_url = Some(base_url.clone());
        }
        if let Some(n) = self.max_concurrent {
            base.max_concurrent = Some(n.get());
        }
        if let Some(rate) = self.max_per_second {
            base.max_per_second = Some(rate);
        }
        if let Some(n) = self.max_connections {
            base.max_connections = Some(n.get());
        }
        if let Some(timeout) = self.timeout {
            base.timeout = Some(timeout);
        }
        if let Some(retries) = self.retries {
            base.retry_attempts = Some(retries);
        }
        if self.http2 {
            base.use_http2 = true;
        }
        if self.fail_fast {
            base.raise_on_any_failure = true;
        }
        base
    }
}

fn parse_method(raw: &str) -> Result<Method, String> {
    let upper = raw.to_ascii_uppercase();
    STANDARD_METHODS
        .iter()
        .find(|method| method.as_str() == upper)
        .cloned()
        .ok_or_else(|| format!("unsupported HTTP method '{raw}'"))
}

fn parse_rate(raw: &str) -> Result<f64, String> {
    let rate: f64 = raw.parse().map_err(|e| format!("invalid rate '{raw}': {e}"))?;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(format!("rate must be a positive number, got {raw}"))
    }
}

fn parse_secs(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw.parse().map_err(|e| format!("invalid timeout '{raw}': {e}"))?;
    match Duration::try_from_secs_f64(secs) {
        Ok(timeout) if !timeout.is_zero() => Ok(timeout),
        _ => Err(format!("timeout must be a positive number of seconds, got {raw}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["abatcher"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(args.urls.is_empty());
        assert_eq!(args.method, Method::GET);
        assert!(args.max_concurrent.is_none());
        assert!(args.max_per_second.is_none());
        assert!(!args.fail_fast);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["abatcher", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["abatcher", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["abatcher", "--quiet"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["abatcher", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["abatcher", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_positional_urls() {
        let args = Args::try_parse_from(["abatcher", "https://a.test", "https://b.test"]).unwrap();
        assert_eq!(args.urls, vec!["https://a.test", "https://b.test"]);
    }

    #[test]
    fn test_cli_input_conflicts_with_urls() {
        let err =
            Args::try_parse_from(["abatcher", "--input", "items.txt", "https://a.test"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    // ==================== Method Tests ====================

    #[test]
    fn test_cli_method_is_case_insensitive() {
        let args = Args::try_parse_from(["abatcher", "-X", "post"]).unwrap();
        assert_eq!(args.method, Method::POST);
    }

    #[test]
    fn test_cli_nonstandard_method_rejected() {
        let err = Args::try_parse_from(["abatcher", "--method", "FETCH"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    // ==================== Limit Tests ====================

    #[test]
    fn test_cli_max_concurrent_zero_rejected() {
        let err = Args::try_parse_from(["abatcher", "-c", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_rate_accepts_fractions() {
        let args = Args::try_parse_from(["abatcher", "-p", "0.5"]).unwrap();
        assert_eq!(args.max_per_second, Some(0.5));
    }

    #[test]
    fn test_cli_rate_zero_rejected() {
        let err = Args::try_parse_from(["abatcher", "-p", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_timeout_parses_seconds() {
        let args = Args::try_parse_from(["abatcher", "--timeout", "1.5"]).unwrap();
        assert_eq!(args.timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_cli_timeout_zero_rejected() {
        let err = Args::try_parse_from(["abatcher", "-t", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_retries_over_max_rejected() {
        let err = Args::try_parse_from(["abatcher", "-r", "11"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    // ==================== Config Override Tests ====================

    #[test]
    fn test_apply_to_keeps_file_values_without_flags() {
        let file = BatchConfig::default()
            .with_max_concurrent(3)
            .with_max_per_second(7.0);
        let args = Args::try_parse_from(["abatcher"]).unwrap();
        assert_eq!(args.apply_to(file.clone()), file);
    }

    #[test]
    fn test_apply_to_flags_override_file() {
        let file = BatchConfig::default()
            .with_max_concurrent(3)
            .with_base_url("https://file.test");
        let args = Args::try_parse_from([
            "abatcher",
            "-c",
            "9",
            "-b",
            "https://flag.test",
            "-r",
            "2",
            "--http2",
            "--fail-fast",
            "--max-connections",
            "4",
        ])
        .unwrap();
        let config = args.apply_to(file);
        assert_eq!(config.max_concurrent, Some(9));
        assert_eq!(config.base_url.as_deref(), Some("https://flag.test"));
        assert_eq!(config.retry_attempts, Some(2));
        assert_eq!(config.max_connections, Some(4));
        assert!(config.use_http2);
        assert!(config.raise_on_any_failure);
    }
}
