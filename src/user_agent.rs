//! User-Agent string sent with every batched request.

/// Project URL for User-Agent identification (RFC 9308 good citizenship).
const PROJECT_UA_URL: &str = "https://github.com/abatcher/abatcher";

/// Default User-Agent identifying the crate and its version.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("abatcher/{version} (+{PROJECT_UA_URL})")
}
