//! Collections agent: a bounded tool-calling loop over a process-isolated
//! JSON-RPC tool provider.
//!
//! - `mcp_client`: spawns the provider and speaks JSON-RPC over its stdio
//! - `mcp_server`: the provider side (registry, server loop, collections tools)
//! - `agent_core`: the agent loop, conversation and tool routing
//! - `inference`: OpenAI-compatible model client
//! - `config` / `logging`: ambient setup shared by both binaries

pub mod agent_core;
pub mod config;
pub mod inference;
pub mod logging;
pub mod mcp_client;
pub mod mcp_server;
