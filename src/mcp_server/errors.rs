//! Provider-side error types.

use thiserror::Error;

/// Errors a tool handler can report.
///
/// Every variant is converted into an `isError` tool result at the dispatch
/// boundary; none of them ever ends the provider process.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments failed schema validation.
    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// A referenced business entity does not exist.
    #[error("{what} not found")]
    NotFound { what: String },

    /// The handler ran but could not complete the operation.
    #[error("{reason}")]
    Failed { reason: String },

    /// The backing store could not be read or written.
    #[error("backend error: {reason}")]
    Backend { reason: String },
}

impl From<std::io::Error> for ToolError {
    fn from(e: std::io::Error) -> Self {
        ToolError::Backend {
            reason: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        ToolError::Backend {
            reason: format!("serialization error: {e}"),
        }
    }
}

/// Errors raised while starting the provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The ledger file could not be loaded.
    #[error("failed to load ledger {path}: {reason}")]
    LedgerLoad { path: String, reason: String },

    /// Two tools were registered under the same name.
    #[error("duplicate tool name: '{name}'")]
    DuplicateTool { name: String },
}
