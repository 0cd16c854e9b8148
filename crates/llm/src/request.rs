//! Request validation and wire-body construction.
//!
//! Everything here runs before any network call: a request that fails
//! [`validate_request`] never reaches the transport.

use pipeline::{ChatMessage, CompletionRequest, GenerationError, ModelParameters, ResponseFormat};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::ResolvedConfig;

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(flatten)]
    params: ModelParameters,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

/// Rejects malformed requests with [`GenerationError::Validation`].
pub fn validate_request(request: &CompletionRequest) -> Result<(), GenerationError> {
    if request.messages.is_empty() {
        return Err(GenerationError::validation("Messages array cannot be empty")
            .with_details(json!({ "field": "messages" })));
    }

    for (index, message) in request.messages.iter().enumerate() {
        if message.content.is_empty() {
            return Err(
                GenerationError::validation(format!("Invalid message at index {index}"))
                    .with_details(json!({ "field": "messages", "index": index })),
            );
        }
    }

    if let Some(ResponseFormat::JsonSchema { schema, .. }) = &request.response_format {
        validate_json_schema(schema)?;
    }

    if let Some(params) = &request.params {
        params.validate()?;
    }

    Ok(())
}

/// A usable schema is an object type with properties and a `required` list.
fn validate_json_schema(schema: &Value) -> Result<(), GenerationError> {
    let invalid = |message: &str| {
        Err(GenerationError::validation(message.to_owned())
            .with_details(json!({ "field": "response_format.schema" })))
    };

    let Some(object) = schema.as_object() else {
        return invalid("JSON schema must be an object");
    };
    if object.get("type").and_then(Value::as_str) != Some("object") {
        return invalid("JSON schema must have type \"object\"");
    }
    match object.get("properties").and_then(Value::as_object) {
        Some(properties) if !properties.is_empty() => {}
        _ => return invalid("JSON schema must define at least one property"),
    }
    if !object.get("required").is_some_and(Value::is_array) {
        return invalid("JSON schema must list required properties");
    }

    Ok(())
}

/// Builds the chat-completions body: request model over the default, request
/// parameters merged over the defaults, and the response format mapped to the
/// provider's shape.
pub(crate) fn build_request_body(
    request: &CompletionRequest,
    config: &ResolvedConfig,
) -> Result<Value, GenerationError> {
    let model = request.model.as_ref().unwrap_or(&config.default_model);
    let params = match &request.params {
        Some(overrides) => config.default_params.merged_with(overrides),
        None => config.default_params.clone(),
    };

    let wire = WireRequest {
        model: model.as_str(),
        messages: &request.messages,
        params,
        response_format: request.response_format.as_ref().and_then(wire_response_format),
    };

    serde_json::to_value(&wire).map_err(|e| {
        GenerationError::validation("Request could not be serialised")
            .with_details(json!({ "error": e.to_string() }))
    })
}

fn wire_response_format(format: &ResponseFormat) -> Option<Value> {
    match format {
        ResponseFormat::Text => None,
        ResponseFormat::JsonObject => Some(json!({ "type": "json_object" })),
        ResponseFormat::JsonSchema {
            name,
            strict,
            schema,
        } => Some(json!({
            "type": "json_schema",
            "json_schema": {
                "name": name,
                "strict": strict.unwrap_or(true),
                "schema": schema,
            },
        })),
    }
}
