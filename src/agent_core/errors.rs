//! Agent Core error types.

use thiserror::Error;

use crate::inference::InferenceError;
use crate::mcp_client::McpError;

/// Errors that abort a user turn.
///
/// Recoverable tool failures never show up here; they are fed back to the
/// model as tool results.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model call failed.
    #[error("model call failed: {0}")]
    Inference(#[from] InferenceError),

    /// The tool catalog could not be fetched.
    #[error("failed to load tool catalog: {source}")]
    Catalog { source: McpError },

    /// The tool session broke while executing a call.
    #[error("tool session failed during '{tool}': {source}")]
    ToolSession { tool: String, source: McpError },
}
