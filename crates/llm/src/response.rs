//! Interpretation of provider responses: HTTP status mapping, completion
//! parsing and JSON extraction from model output.

use pipeline::{
    CompletionResponse, GenerationError, ModelInfo, ResponseFormat, ResponseMetadata, TokenCount,
    TokenUsage,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Raw content excerpts attached to parse errors are cut to this many chars.
const RAW_EXCERPT_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// Status mapping
// ---------------------------------------------------------------------------

/// Maps a non-2xx response to its error kind.
///
/// `details` is the body parsed as JSON, or `{"message": <body>}` when the
/// body is not JSON.
pub(crate) fn map_http_error(status: u16, retry_after: Option<&str>, body: &str) -> GenerationError {
    let details =
        serde_json::from_str::<Value>(body).unwrap_or_else(|_| json!({ "message": body }));

    let api = |message: String| GenerationError::Api {
        status,
        message,
        details: Some(details.clone()),
    };

    match status {
        400 => GenerationError::validation("Invalid request").with_details(details.clone()),
        401 => api("Invalid API key".to_owned()),
        403 => api("Access forbidden".to_owned()),
        404 => api("Endpoint not found".to_owned()),
        429 => GenerationError::RateLimit {
            retry_after: retry_after.and_then(parse_retry_after),
        },
        500..=599 => api("Provider server error".to_owned()),
        other => api(format!("HTTP error {other}")),
    }
}

/// Only the delta-seconds form of `Retry-After` is honoured.
fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

// ---------------------------------------------------------------------------
// Completions
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct WireCompletion {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

/// Parses a 2xx chat-completions body and interprets its content according
/// to `format`.
pub(crate) fn parse_completion(
    body: &str,
    format: Option<&ResponseFormat>,
) -> Result<CompletionResponse<Value>, GenerationError> {
    let wire: WireCompletion = serde_json::from_str(body).map_err(|e| {
        GenerationError::parsing("Invalid API response structure").with_details(json!({
            "error": e.to_string(),
            "raw_content": excerpt(body),
        }))
    })?;

    let usage = wire
        .usage
        .ok_or_else(|| GenerationError::parsing("Invalid API response structure: missing usage"))?;
    let choice = wire
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::parsing("Invalid API response structure: no choices"))?;
    let raw_content = choice
        .message
        .and_then(|m| m.content)
        .ok_or_else(|| GenerationError::parsing("No content in API response"))?;

    let data = interpret_content(&raw_content, format)?;

    Ok(CompletionResponse {
        data,
        raw_content,
        metadata: ResponseMetadata {
            model: wire.model.unwrap_or_default(),
            usage: TokenUsage {
                prompt_tokens: TokenCount::new(usage.prompt_tokens),
                completion_tokens: TokenCount::new(usage.completion_tokens),
                total_tokens: TokenCount::new(usage.total_tokens),
            },
            finish_reason: choice.finish_reason,
        },
    })
}

/// JSON formats must parse; text is never parsed; with no format the content
/// is parsed when possible and kept as a string otherwise.
fn interpret_content(
    content: &str,
    format: Option<&ResponseFormat>,
) -> Result<Value, GenerationError> {
    match format {
        Some(format) if format.requires_json() => extract_json(content),
        Some(_) => Ok(Value::String(content.to_owned())),
        None => Ok(extract_json(content).unwrap_or_else(|_| Value::String(content.to_owned()))),
    }
}

/// Parses `content` as JSON, looking inside a ```` ```json ```` fence first
/// and any ```` ``` ```` fence second.
pub fn extract_json(content: &str) -> Result<Value, GenerationError> {
    let candidate = fenced_block(content, "```json")
        .or_else(|| fenced_block(content, "```"))
        .unwrap_or(content)
        .trim();

    serde_json::from_str(candidate).map_err(|e| {
        GenerationError::parsing("Failed to parse JSON from response").with_details(json!({
            "error": e.to_string(),
            "raw_content": excerpt(content),
        }))
    })
}

/// Text between `opener` and the next closing fence, if both are present.
fn fenced_block<'a>(content: &'a str, opener: &str) -> Option<&'a str> {
    let start = content.find(opener)? + opener.len();
    let rest = &content[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

fn excerpt(text: &str) -> String {
    text.chars().take(RAW_EXCERPT_CHARS).collect()
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

/// Accepts either a bare array or an object wrapping the array in `data`.
pub(crate) fn parse_models(body: &str) -> Result<Vec<ModelInfo>, GenerationError> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        GenerationError::parsing("Invalid models response")
            .with_details(json!({ "error": e.to_string() }))
    })?;

    let list = match value {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => match map.remove("data") {
            Some(data @ Value::Array(_)) => data,
            _ => return Err(GenerationError::parsing("Invalid models response format")),
        },
        _ => return Err(GenerationError::parsing("Invalid models response format")),
    };

    serde_json::from_value(list).map_err(|e| {
        GenerationError::parsing("Invalid models response format")
            .with_details(json!({ "error": e.to_string() }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::ErrorKind;

    fn completion(content: &str) -> String {
        json!({
            "model": "test/model",
            "choices": [{ "message": { "role": "assistant", "content": content }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 3, "completion_tokens": 5, "total_tokens": 8 },
        })
        .to_string()
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        assert_eq!(map_http_error(400, None, "{}").kind(), ErrorKind::Validation);
        assert_eq!(map_http_error(429, None, "").kind(), ErrorKind::RateLimit);
        for status in [401, 403, 404, 500, 502, 418] {
            let err = map_http_error(status, None, "oops");
            assert!(matches!(err, GenerationError::Api { status: s, .. } if s == status));
        }
        assert_eq!(map_http_error(418, None, "").to_string(), "API error (418): HTTP error 418");
    }

    #[test]
    fn error_details_fall_back_to_message_wrapper() {
        let err = map_http_error(500, None, "<html>bad gateway</html>");
        assert_eq!(err.details(), Some(&json!({ "message": "<html>bad gateway</html>" })));

        let err = map_http_error(403, None, r#"{"error":{"code":403}}"#);
        assert_eq!(err.details().unwrap()["error"]["code"], 403);
    }

    #[test]
    fn rate_limit_reads_retry_after_seconds() {
        let err = map_http_error(429, Some(" 12 "), "");
        assert_eq!(err.retry_after_seconds(), Some(12));
        let err = map_http_error(429, Some("Wed, 21 Oct 2015 07:28:00 GMT"), "");
        assert_eq!(err.retry_after_seconds(), None);
    }

    #[test]
    fn fenced_json_is_extracted() {
        let content = "Here you go:\n```json\n{\"title\": \"Hop\"}\n```\nEnjoy!";
        let response =
            parse_completion(&completion(content), Some(&ResponseFormat::JsonObject)).unwrap();
        assert_eq!(response.data, json!({ "title": "Hop" }));
        assert_eq!(response.raw_content, content);
        assert_eq!(response.metadata.usage.total_tokens.as_u64(), 8);
        assert_eq!(response.metadata.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn bare_fence_is_extracted() {
        assert_eq!(extract_json("```\n[1, 2]\n```").unwrap(), json!([1, 2]));
    }

    #[test]
    fn json_format_with_prose_is_a_parsing_error() {
        let err = parse_completion(&completion("not json"), Some(&ResponseFormat::JsonObject))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parsing);
        assert_eq!(err.details().unwrap()["raw_content"], "not json");
    }

    #[test]
    fn text_format_is_never_parsed() {
        let response = parse_completion(&completion("{\"a\":1}"), Some(&ResponseFormat::Text)).unwrap();
        assert_eq!(response.data, json!("{\"a\":1}"));
    }

    #[test]
    fn no_format_falls_back_to_raw_string() {
        let response = parse_completion(&completion("hello"), None).unwrap();
        assert_eq!(response.data, json!("hello"));
        let response = parse_completion(&completion("{\"a\":1}"), None).unwrap();
        assert_eq!(response.data, json!({ "a": 1 }));
    }

    #[test]
    fn structurally_unusable_bodies_are_parsing_errors() {
        let bodies = [
            "not json at all".to_owned(),
            json!({ "choices": [], "usage": {} }).to_string(),
            json!({ "choices": [{ "message": {} }], "usage": {} }).to_string(),
            json!({ "choices": [{ "message": { "content": "x" } }] }).to_string(),
        ];
        for body in bodies {
            let err = parse_completion(&body, None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Parsing, "{body}");
        }
    }

    #[test]
    fn models_accept_both_envelopes() {
        let bare = json!([{ "id": "a/b" }]).to_string();
        let wrapped = json!({ "data": [{ "id": "a/b", "context_length": 8192 }] }).to_string();
        assert_eq!(parse_models(&bare).unwrap()[0].id, "a/b");
        assert_eq!(parse_models(&wrapped).unwrap()[0].context_length, Some(8192));
        assert!(parse_models(r#"{"models": []}"#).is_err());
    }
}
