//! Tool client: JSON-RPC over stdio to a sandboxed provider process.
//!
//! This module handles:
//! - Spawning and tearing down the provider child process
//! - JSON-RPC 2.0 communication over process stdio
//! - Request/response correlation and session-fatal error handling
//! - Tool catalog retrieval and tool invocation
//!
//! The agent loop (`agent_core`) dispatches every model tool call through
//! `McpClient`.

pub mod catalog;
pub mod client;
pub mod errors;
pub mod lifecycle;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use catalog::ToolCatalog;
pub use client::McpClient;
pub use errors::McpError;
pub use types::{CallToolResult, McpToolDefinition, ServerConfig};
