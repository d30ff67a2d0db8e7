//! ToolRouter: turns model tool calls into provider calls and results.
//!
//! Responsibilities:
//! - Translate raw model tool calls into validated [`ToolCallIntent`]s
//! - Dispatch intents through a [`ToolInvoker`] (the stdio client in production)
//! - Classify every outcome and render the text the model will see
//! - Cap result size before it enters the transcript

use async_trait::async_trait;
use uuid::Uuid;

use crate::inference::types::ToolCallResponse;
use crate::mcp_client::{McpClient, McpError, McpToolDefinition};

use super::tokens::truncate_utf8;
use super::types::ToolCallIntent;

// ─── ToolInvoker ────────────────────────────────────────────────────────────

/// Something that can list and run tools.
#[async_trait]
pub trait ToolInvoker: Send {
    /// Fetch the tool catalog.
    async fn list_tools(&mut self) -> Result<Vec<McpToolDefinition>, McpError>;

    /// Run one tool and return its payload.
    async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, McpError>;
}

#[async_trait]
impl ToolInvoker for McpClient {
    async fn list_tools(&mut self) -> Result<Vec<McpToolDefinition>, McpError> {
        McpClient::list_tools(self).await
    }

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, McpError> {
        McpClient::call_tool(self, name, arguments).await
    }
}

// ─── ToolExecutionOutcome ───────────────────────────────────────────────────

/// What happened to one tool intent.
#[derive(Debug)]
pub enum ToolExecutionOutcome {
    /// The tool ran and returned a payload.
    Success { text: String },

    /// The provider reported a failure. Recoverable.
    ToolError { text: String },

    /// The model's arguments could not be used; nothing was sent.
    InvalidArguments { text: String },

    /// An identical side-effecting call already succeeded this turn.
    Duplicate { text: String },

    /// The tool session broke. The turn must stop.
    SessionFailed { text: String, error: McpError },
}

impl ToolExecutionOutcome {
    /// The text to feed back to the model as the tool result message.
    pub fn model_text(&self) -> &str {
        match self {
            Self::Success { text }
            | Self::ToolError { text }
            | Self::InvalidArguments { text }
            | Self::Duplicate { text }
            | Self::SessionFailed { text, .. } => text,
        }
    }

    /// Whether this outcome represents an error (any variant except Success).
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Success { .. })
    }
}

// ─── Intent Translation ─────────────────────────────────────────────────────

/// Validate a raw model tool call.
///
/// Arguments must be a JSON object; an empty string means `{}`. On failure
/// the error text is meant for the model and says the tool was not called.
pub fn translate_tool_call(call: &ToolCallResponse) -> Result<ToolCallIntent, String> {
    let name = call.function.name.trim();
    let raw = call.function.arguments.trim();

    let arguments = if raw.is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_str::<serde_json::Value>(raw).map_err(|e| {
            format!(
                "Error: the arguments for '{name}' are not valid JSON ({e}). \
                 The tool was NOT called. Retry with a JSON object."
            )
        })?
    };

    if !arguments.is_object() {
        return Err(format!(
            "Error: the arguments for '{name}' must be a JSON object. The tool was NOT called."
        ));
    }

    if name.is_empty() {
        return Err("Error: tool call without a tool name. Nothing was called.".to_string());
    }

    let id = if call.id.is_empty() {
        format!("call_{}", Uuid::new_v4())
    } else {
        call.id.clone()
    };

    Ok(ToolCallIntent {
        id,
        name: name.to_string(),
        arguments,
    })
}

// ─── Execution ──────────────────────────────────────────────────────────────

/// Run one intent and classify the outcome.
pub async fn execute_intent<T: ToolInvoker + ?Sized>(
    tools: &mut T,
    intent: &ToolCallIntent,
    side_effecting: bool,
    max_result_chars: usize,
) -> ToolExecutionOutcome {
    match tools.call_tool(&intent.name, intent.arguments.clone()).await {
        Ok(value) => {
            let raw = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            ToolExecutionOutcome::Success {
                text: truncate_tool_result(&raw, &intent.name, max_result_chars),
            }
        }
        Err(e) if e.is_session_fatal() => {
            let text = if side_effecting {
                format!(
                    "Error: the tool service failed while running '{}' ({e}). \
                     It is unknown whether this action took effect.",
                    intent.name
                )
            } else {
                format!("Error: the tool service failed while running '{}' ({e}).", intent.name)
            };
            ToolExecutionOutcome::SessionFailed { text, error: e }
        }
        Err(e) => {
            let message = match &e {
                McpError::ToolExecutionError { message, .. } => message.clone(),
                other => other.to_string(),
            };
            let message = truncate_tool_result(&message, &intent.name, max_result_chars);
            let text = if side_effecting {
                format!(
                    "Error from '{}': {message}\nThis action did NOT happen.",
                    intent.name
                )
            } else {
                format!("Error from '{}': {message}", intent.name)
            };
            ToolExecutionOutcome::ToolError { text }
        }
    }
}

/// Truncate a tool result that exceeds `max_chars` bytes.
///
/// Keeps the beginning of the result and appends a notice with the original size.
pub fn truncate_tool_result(result: &str, tool_name: &str, max_chars: usize) -> String {
    if result.len() <= max_chars {
        return result.to_string();
    }

    let truncated = truncate_utf8(result, max_chars);
    tracing::warn!(
        tool = %tool_name,
        original_len = result.len(),
        truncated_to = truncated.len(),
        "tool result truncated"
    );
    format!(
        "{truncated}\n\n[... truncated: showing first {} of {} chars]",
        truncated.len(),
        result.len()
    )
}

// ─── Tests ──────────────────────────────────────────────────────────────────
