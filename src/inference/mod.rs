//! Inference client: OpenAI-compatible API client for the planning model.
//!
//! This module handles all communication with the model endpoint:
//! - Non-streaming chat completions with function-calling tools
//! - Response parsing into text and raw tool calls
//!
//! The client speaks the OpenAI Chat Completions API, making the model
//! interchangeable via config.

pub mod client;
pub mod errors;
pub mod response;
pub mod types;

// Re-exports for convenience
pub use client::{InferenceClient, ModelBackend};
pub use errors::InferenceError;
pub use types::{ChatMessage, ModelTurn, Role, ToolCallResponse};
