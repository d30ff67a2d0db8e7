//! Agent Core: the bounded agentic loop.
//!
//! Submodules:
//! - `orchestrator`: Runs one user turn: model call, tool execution, repeat
//! - `tool_router`: Translates model tool calls and dispatches them to the provider
//! - `conversation`: Caller-owned transcript with exchange-level retention
//! - `tokens`: UTF-8 safe truncation and rough token estimates
//! - `types`: Shared types across the agent core
//! - `errors`: Agent-level error types

pub mod conversation;
pub mod errors;
pub mod orchestrator;
pub mod tokens;
pub mod tool_router;
pub mod types;

// Re-exports for convenience
pub use conversation::Conversation;
pub use errors::AgentError;
pub use orchestrator::{Agent, DEFAULT_SYSTEM_PROMPT};
pub use tool_router::ToolInvoker;
pub use types::{ExecutedAction, LoopState, ToolCallIntent, TurnOutcome};
