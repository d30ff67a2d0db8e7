//! Parsing of non-streaming chat completion responses.

use serde::Deserialize;
use uuid::Uuid;

use super::errors::InferenceError;
use super::types::{ModelTurn, ToolCallResponse};

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<CompletionToolCall>>,
}

#[derive(Deserialize)]
struct CompletionToolCall {
    #[serde(default)]
    id: Option<String>,
    function: CompletionFunction,
}

#[derive(Deserialize)]
struct CompletionFunction {
    name: String,
    /// Usually a JSON string; some runtimes send an object instead.
    #[serde(default)]
    arguments: serde_json::Value,
}

/// Parse a `/chat/completions` response body into a [`ModelTurn`].
///
/// Tool-call arguments are normalized to a string but never validated here.
/// Calls without an id get a generated `call_<uuid>` id.
pub fn parse_completion_response(body: &str) -> Result<ModelTurn, InferenceError> {
    let resp: CompletionResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::InvalidResponse {
            reason: format!("failed to parse completion response: {e}"),
        })?;

    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| InferenceError::InvalidResponse {
            reason: "empty choices array".into(),
        })?;

    let content = choice.message.content.filter(|c| !c.is_empty());

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            let id = tc
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("call_{}", Uuid::new_v4()));
            let arguments = match tc.function.arguments {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            ToolCallResponse::function(id, tc.function.name, arguments)
        })
        .collect();

    Ok(ModelTurn {
        content,
        tool_calls,
        finish_reason: choice.finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_answer() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"All done."},"finish_reason":"stop"}]}"#;
        let turn = parse_completion_response(body).unwrap();
        assert_eq!(turn.content.as_deref(), Some("All done."));
        assert!(turn.tool_calls.is_empty());
        assert_eq!(turn.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_parse_tool_calls_keeps_raw_arguments() {
        let body = r#"{"choices":[{"message":{"content":null,"tool_calls":[
            {"id":"call_a","type":"function","function":{"name":"get_customer_balance","arguments":"{\"customer_id\":\"C001\"}"}},
            {"id":"call_b","type":"function","function":{"name":"send_collection_email","arguments":"{not json"}}
        ]},"finish_reason":"tool_calls"}]}"#;
        let turn = parse_completion_response(body).unwrap();
        assert!(turn.content.is_none());
        assert_eq!(turn.tool_calls.len(), 2);
        assert_eq!(turn.tool_calls[0].function.arguments, r#"{"customer_id":"C001"}"#);
        assert_eq!(turn.tool_calls[1].function.arguments, "{not json");
    }

    #[test]
    fn test_parse_generates_missing_ids() {
        let body = r#"{"choices":[{"message":{"tool_calls":[{"function":{"name":"list_customers_with_balance","arguments":"{}"}}]}}]}"#;
        let turn = parse_completion_response(body).unwrap();
        assert!(turn.tool_calls[0].id.starts_with("call_"));
    }

    #[test]
    fn test_parse_object_arguments_are_stringified() {
        let body = r#"{"choices":[{"message":{"tool_calls":[{"id":"c","function":{"name":"t","arguments":{"a":1}}}]}}]}"#;
        let turn = parse_completion_response(body).unwrap();
        assert_eq!(turn.tool_calls[0].function.arguments, r#"{"a":1}"#);
    }

    #[test]
    fn test_parse_empty_choices_is_error() {
        let err = parse_completion_response(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, InferenceError::InvalidResponse { .. }));
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(parse_completion_response("<html>").is_err());
    }
}
