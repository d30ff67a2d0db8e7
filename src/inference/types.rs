//! Shared types for the inference client.
//!
//! These mirror the OpenAI Chat Completions API types, used for both
//! request building and response parsing.

use serde::{Deserialize, Serialize};

// ─── Request Types ───────────────────────────────────────────────────────────

/// A single message in the conversation.
///
/// Serialization notes for OpenAI-compatible endpoints:
/// - `content` is sent as `""` (not `null`) for assistant messages with tool
///   calls. Several local runtimes reject `null` content.
/// - `tool_call_id` and `tool_calls` are skipped when `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(serialize_with = "serialize_content")]
    pub content: Option<String>,
    /// Tool results are sent back as `tool` role messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Assistant messages may contain tool calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallResponse>>,
}

impl ChatMessage {
    /// A system prompt.
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    /// An assistant message with text only.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// An assistant message carrying tool calls, with optional text.
    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCallResponse>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_call_id: None,
            tool_calls: Some(calls),
        }
    }

    /// A tool result linked to the call that produced it.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }
}

/// Custom serializer for `content`: emit `""` instead of `null` when `None`.
fn serialize_content<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(s) => serializer.serialize_str(s),
        None => serializer.serialize_str(""),
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Request body for `POST /chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    /// Tool definitions in function-calling format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<&'a [serde_json::Value]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<&'a str>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

// ─── Response Types ──────────────────────────────────────────────────────────

/// Tool call as carried in an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResponse {
    pub id: String,
    pub r#type: String,
    pub function: FunctionCallResponse,
}

impl ToolCallResponse {
    /// A `function` tool call.
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            r#type: "function".to_string(),
            function: FunctionCallResponse {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Function call details. `arguments` is the raw JSON string the model emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallResponse {
    pub name: String,
    pub arguments: String,
}

/// One model response: optional text plus zero or more tool calls.
///
/// Tool-call arguments are left as the raw strings the model produced; the
/// agent loop decides what to do with arguments that are not valid JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelTurn {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallResponse>,
    /// Why the model stopped: `"stop"`, `"tool_calls"`, `"length"`, ...
    pub finish_reason: Option<String>,
}

impl ModelTurn {
    /// A final text answer.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            finish_reason: Some("stop".to_string()),
        }
    }

    /// A turn requesting the given tool calls.
    pub fn calls(tool_calls: Vec<ToolCallResponse>) -> Self {
        Self {
            content: None,
            tool_calls,
            finish_reason: Some("tool_calls".to_string()),
        }
    }

    /// No text and no tool calls.
    pub fn is_empty(&self) -> bool {
        self.tool_calls.is_empty() && self.content.as_deref().map_or(true, |c| c.trim().is_empty())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_tool_call_content_is_empty_string() {
        let msg = ChatMessage::assistant_tool_calls(
            None,
            vec![ToolCallResponse::function("call_1", "list_customers_with_balance", "{}")],
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"], "");
        assert_eq!(json["tool_calls"][0]["type"], "function");
        assert!(json.get("tool_call_id").is_none());
    }

    #[test]
    fn test_tool_result_message() {
        let msg = ChatMessage::tool_result("call_1", "[\"C001\"]");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");
        assert!(json.get("tool_calls").is_none());
    }

    #[test]
    fn test_request_omits_tools_when_none() {
        let messages = vec![ChatMessage::user("hi")];
        let req = ChatCompletionRequest {
            model: "m",
            messages: &messages,
            tools: None,
            tool_choice: None,
            temperature: 0.1,
            max_tokens: 512,
            stream: false,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("tools"));
        assert!(json.contains("\"stream\":false"));
    }

    #[test]
    fn test_model_turn_is_empty() {
        assert!(ModelTurn::default().is_empty());
        assert!(ModelTurn { content: Some("  ".into()), ..Default::default() }.is_empty());
        assert!(!ModelTurn::text("done").is_empty());
        assert!(!ModelTurn::calls(vec![ToolCallResponse::function("c", "t", "{}")]).is_empty());
    }
}
