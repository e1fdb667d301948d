use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap())
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\+?\d[\d\-. ()]{8,}\d)").unwrap()
    })
}

fn digit_run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d{12,19}").unwrap())
}

/// Replaces emails, phone-like sequences, and long digit runs in `text` with
/// fixed placeholder tokens. Applied in a fixed order so that a digit run
/// inside an already-matched phone number isn't redacted twice.
fn redact_string(text: &str) -> String {
    let text = email_pattern().replace_all(text, "[REDACTED_EMAIL]");
    let text = phone_pattern().replace_all(&text, "[REDACTED_PHONE]");
    let text = digit_run_pattern().replace_all(&text, "[REDACTED_NUMBER]");
    text.into_owned()
}

/// Recursively redacts a `JsonValue`. Idempotent: `redact(redact(v)) == redact(v)`
/// because placeholder tokens contain no email/phone/digit-run patterns of
/// their own. Null and (by construction, since `serde_json::Value` has no
/// undefined) any absent value both normalize to `Value::Null`.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(redact_string(s)),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        Value::Object(map) => {
            let redacted = map.iter().map(|(k, v)| (k.clone(), redact(v))).collect();
            Value::Object(redacted)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_email() {
        let value = json!({"contact": "reach me at jane.doe@example.com please"});
        let redacted = redact(&value);
        assert_eq!(redacted["contact"], json!("reach me at [REDACTED_EMAIL] please"));
    }

    #[test]
    fn redacts_long_digit_runs() {
        let value = json!({"card": "4111111111111111"});
        let redacted = redact(&value);
        assert_eq!(redacted["card"], json!("[REDACTED_NUMBER]"));
    }

    #[test]
    fn redacts_phone_like_patterns() {
        let value = json!({"phone": "call +1 (555) 123-4567 now"});
        let redacted = redact(&value);
        assert_eq!(redacted["phone"].as_str().unwrap().contains("REDACTED_PHONE"), true);
    }

    #[test]
    fn idempotent() {
        let value = json!({
            "a": "jane.doe@example.com",
            "b": [1, "4111111111111111", null],
            "c": {"nested": "+1 (555) 123-4567"}
        });
        let once = redact(&value);
        let twice = redact(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn null_stays_null() {
        assert_eq!(redact(&Value::Null), Value::Null);
    }
}
