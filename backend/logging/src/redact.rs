//! Log Redaction
//!
//! Scrubs provider API keys and bearer tokens from strings prior to logging.

use regex::Regex;
use std::sync::LazyLock;

static GOOGLE_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"AIza[0-9A-Za-z_\-]{35}").unwrap());
static KEY_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([?&]key=)[^&\s]+").unwrap());
static BEARER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Bearer\s+[a-zA-Z0-9\-\._~+/]+=*").unwrap());

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let mut redacted = GOOGLE_KEY_RE.replace_all(input, "[REDACTED_KEY]").to_string();
    redacted = KEY_PARAM_RE.replace_all(&redacted, "${1}[REDACTED_KEY]").to_string();
    redacted = BEARER_RE.replace_all(&redacted, "[REDACTED_TOKEN]").to_string();
    redacted
}
