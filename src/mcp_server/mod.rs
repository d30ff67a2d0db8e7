//! Tool provider: the sandboxed side of the stdio protocol.
//!
//! This module handles:
//! - The tool registry: catalog, argument validation, failure-proof dispatch
//! - The JSON-RPC server loop over stdin/stdout
//! - The collections tool set and its ledger-file backend
//!
//! It runs inside the `collections-tools` binary, which the agent process
//! spawns through `mcp_client`.

pub mod errors;
pub mod ledger;
pub mod registry;
pub mod server;
pub mod tools;

pub use errors::{ProviderError, ToolError};
pub use ledger::{CollectionsBackend, LedgerBackend};
pub use registry::{ToolDescriptor, ToolRegistry};
pub use server::ToolServer;
pub use tools::collections_registry;
