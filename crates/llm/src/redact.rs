//! Redaction of credentials from diagnostic payloads before they are logged.

use serde_json::{Map, Value};

/// Normalised key names whose values never reach the logs.
const SENSITIVE_KEYS: [&str; 5] = ["apikey", "password", "token", "secret", "authorization"];

const REDACTED: &str = "[REDACTED]";

/// Returns a copy of `value` with every sensitive key's value replaced,
/// at any depth.
pub fn sanitize_for_logging(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| {
                    let v = if is_sensitive(key) {
                        Value::String(REDACTED.to_owned())
                    } else {
                        sanitize_for_logging(v)
                    };
                    (key.clone(), v)
                })
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_for_logging).collect()),
        other => other.clone(),
    }
}

/// `apiKey`, `api_key` and `API-KEY` all normalise to `apikey`.
fn is_sensitive(key: &str) -> bool {
    let normalised: String = key
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect();
    SENSITIVE_KEYS.contains(&normalised.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_known_keys_in_any_spelling_and_depth() {
        let input = json!({
            "apiKey": "sk-1",
            "nested": { "Authorization": "Bearer x", "items": [{ "api_key": "sk-2" }] },
            "message": "kept",
        });
        let out = sanitize_for_logging(&input);
        assert_eq!(out["apiKey"], REDACTED);
        assert_eq!(out["nested"]["Authorization"], REDACTED);
        assert_eq!(out["nested"]["items"][0]["api_key"], REDACTED);
        assert_eq!(out["message"], "kept");
    }

    #[test]
    fn token_usage_counters_are_not_redacted() {
        let input = json!({ "token": "t", "total_tokens": 12 });
        let out = sanitize_for_logging(&input);
        assert_eq!(out["token"], REDACTED);
        assert_eq!(out["total_tokens"], 12);
    }
}
