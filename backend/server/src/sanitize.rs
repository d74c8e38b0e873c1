//! # Sanitizer
//!
//! Free text is cleaned before it is validated or stored:
//! - `<script>...</script>` blocks, nearest closing tag, any case
//! - `javascript:` prefixes, the rest of the text stays
//! - inline handlers like `onclick=`, only inside a tag, so prose such as
//!   `online=true` is left alone
//!
//! Removal repeats until nothing changes, so pieces that join into a new
//! match after one pass are caught too. The result is trimmed.
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b.*?</script\s*>").expect("valid script pattern"));
static JAVASCRIPT_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)javascript:").expect("valid scheme pattern"));
/// Group 1 is the tag up to the handler and is kept.
static EVENT_HANDLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(<[a-z][^>]*?[\s/])on[a-z]+\s*=").expect("valid handler pattern")
});

pub fn sanitize(input: &str) -> String {
    let mut s = input.to_string();

    loop {
        let cleaned = strip(&SCRIPT_BLOCK, &s, "");
        let cleaned = strip(&JAVASCRIPT_SCHEME, &cleaned, "");
        let cleaned = strip(&EVENT_HANDLER, &cleaned, "$1");

        if cleaned == s {
            break;
        }
        s = cleaned;
    }

    s.trim().to_string()
}

/// Strings are sanitized, anything else comes back untouched.
pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize(&s)),
        other => other,
    }
}

fn strip(pattern: &Regex, s: &str, keep: &str) -> String {
    pattern.replace_all(s, keep).into_owned()
}
