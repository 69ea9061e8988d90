//! Log Redaction Layer
//!
//! Scrubs API keys and bearer tokens from strings before they are logged or
//! written to debug files.

use once_cell::sync::Lazy;
use regex::Regex;

static SECRET_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"sk-[A-Za-z0-9_\-]{16,}").unwrap());
static BEARER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Bearer\s+[A-Za-z0-9\-\._~+/]+=*").unwrap());
static API_KEY_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)("?api[_-]?key"?\s*[:=]\s*"?)[^"\s,}]+"#).unwrap()
});

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = API_KEY_FIELD_RE.replace_all(input, "${1}[REDACTED]");
    let redacted = BEARER_RE.replace_all(&redacted, "Bearer [REDACTED_TOKEN]");
    SECRET_KEY_RE
        .replace_all(&redacted, "[REDACTED_TOKEN]")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_keys_and_tokens() {
        let raw = "calling with sk-abcdefghijklmnopqrstuvwx and Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";
        let clean = redact_sensitive_data(raw);
        assert!(!clean.contains("sk-abcdefghijklmnopqrstuvwx"));
        assert!(!clean.contains("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"));
        assert!(clean.contains("Bearer [REDACTED_TOKEN]"));
    }

    #[test]
    fn redacts_api_key_assignments() {
        assert_eq!(
            redact_sensitive_data(r#"{"api_key": "dsk-12345", "model": "x"}"#),
            r#"{"api_key": "[REDACTED]", "model": "x"}"#
        );
        assert_eq!(redact_sensitive_data("api_key: abc123"), "api_key: [REDACTED]");
    }

    #[test]
    fn leaves_ordinary_text() {
        let text = "TASK: ```Prove that sqrt(2) is irrational```";
        assert_eq!(redact_sensitive_data(text), text);
    }
}
