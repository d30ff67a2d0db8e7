//! Tool client error types.

use thiserror::Error;

/// Errors that can occur during tool client operations.
///
/// `TransportError`, `ProtocolError`, `Timeout` and `InitFailed` are
/// session-fatal: the session that produced them is torn down.
/// `ToolExecutionError` is a normal, recoverable outcome of a tool call.
#[derive(Debug, Error)]
pub enum McpError {
    /// The provider process failed to start.
    #[error("failed to spawn provider '{name}': {reason}")]
    SpawnFailed { name: String, reason: String },

    /// The initialization handshake failed.
    #[error("provider '{name}' initialization failed: {reason}")]
    InitFailed { name: String, reason: String },

    /// The byte stream to the provider closed or could not be read/written.
    #[error("transport error for provider '{server}': {reason}")]
    TransportError { server: String, reason: String },

    /// The provider sent something that is not a valid, correlated response.
    #[error("protocol error for provider '{server}': {reason}")]
    ProtocolError { server: String, reason: String },

    /// The provider answered with a JSON-RPC error object.
    #[error("provider error [{code}]: {message}")]
    ServerError {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// The tool ran and reported a failure (handler error or domain error).
    #[error("tool '{tool}' failed: {message}")]
    ToolExecutionError { tool: String, message: String },

    /// A call did not complete in time.
    #[error("tool call '{tool}' timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },

    /// The tool result could not be converted into the caller's type.
    #[error("could not decode result of '{tool}': {reason}")]
    DecodeError { tool: String, reason: String },

    /// The client was closed; no further calls are accepted.
    #[error("tool client is closed")]
    Closed,
}

impl McpError {
    /// Whether this error means the session can no longer be used.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            McpError::TransportError { .. }
                | McpError::ProtocolError { .. }
                | McpError::Timeout { .. }
                | McpError::InitFailed { .. }
                | McpError::SpawnFailed { .. }
                | McpError::Closed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_execution_error_is_recoverable() {
        let err = McpError::ToolExecutionError {
            tool: "send_collection_email".into(),
            message: "smtp down".into(),
        };
        assert!(!err.is_session_fatal());
        assert!(err.to_string().contains("smtp down"));
    }

    #[test]
    fn test_transport_and_protocol_errors_are_fatal() {
        assert!(McpError::TransportError {
            server: "p".into(),
            reason: "eof".into()
        }
        .is_session_fatal());
        assert!(McpError::ProtocolError {
            server: "p".into(),
            reason: "bad json".into()
        }
        .is_session_fatal());
        assert!(McpError::Closed.is_session_fatal());
    }
}
