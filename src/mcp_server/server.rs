//! Tool server: the provider end of the stdio protocol.
//!
//! Reads newline-delimited JSON-RPC requests from its input and writes one
//! response line per request to its output. Requests are handled strictly in
//! arrival order. Diagnostics go through `tracing`, which the provider binary
//! routes to stderr so stdout carries protocol traffic only.
//!
//! ```text
//! McpClient (agent process)
//!   │ stdin/stdout (newline-delimited JSON-RPC)
//!   ▼
//! ToolServer
//!   └── ToolRegistry ──▶ handlers ──▶ CollectionsBackend
//! ```

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use super::registry::ToolRegistry;
use crate::mcp_client::types::{
    error_codes, JsonRpcResponse, ServerInfo, ToolCallParams, PROTOCOL_VERSION,
};

/// Provider state for one connection.
pub struct ToolServer {
    registry: ToolRegistry,
    info: ServerInfo,
    initialized: bool,
}

impl ToolServer {
    /// Create a server exposing `registry`.
    pub fn new(name: &str, registry: ToolRegistry) -> Self {
        Self {
            registry,
            info: ServerInfo {
                name: name.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            initialized: false,
        }
    }

    /// Whether the client has sent `notifications/initialized`.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Serve requests until the input reaches EOF.
    pub async fn serve<R, W>(&mut self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = BufReader::new(input);
        let mut buf = Vec::new();

        tracing::info!(
            server = %self.info.name,
            tools = self.registry.len(),
            "tool server ready"
        );

        loop {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf).await?;
            if n == 0 {
                tracing::info!("client disconnected (EOF)");
                break;
            }

            let response = match std::str::from_utf8(&buf) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => self.handle_line(line.trim()).await,
                Err(e) => {
                    tracing::warn!(error = %e, "request line is not valid UTF-8");
                    Some(parse_error(format!("Parse error: request is not valid UTF-8 ({e})")))
                }
            };

            if let Some(response) = response {
                let mut payload = match serde_json::to_string(&response) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize response");
                        continue;
                    }
                };
                payload.push('\n');
                output.write_all(payload.as_bytes()).await?;
                output.flush().await?;
            }
        }

        Ok(())
    }

    /// Handle one raw input line. Returns `None` for notifications.
    pub async fn handle_line(&mut self, line: &str) -> Option<JsonRpcResponse> {
        let message: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable request line");
                return Some(parse_error(format!("Parse error: {e}")));
            }
        };

        let id = message.get("id").cloned().filter(|id| !id.is_null());
        let method = message.get("method").and_then(|m| m.as_str());

        match (id, method) {
            (Some(id), Some(method)) => {
                let params = message.get("params").cloned().unwrap_or(Value::Null);
                Some(self.handle_request(id, method, params).await)
            }
            (None, Some(method)) => {
                self.handle_notification(method);
                None
            }
            (id, None) => Some(JsonRpcResponse::failure(
                id.unwrap_or(Value::Null),
                error_codes::INVALID_REQUEST,
                "Invalid request: missing method",
            )),
        }
    }

    async fn handle_request(&mut self, id: Value, method: &str, params: Value) -> JsonRpcResponse {
        tracing::debug!(method, id = %id, "request");
        match method {
            "initialize" => self.handle_initialize(id),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, params).await,
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            _ => JsonRpcResponse::failure(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {method}"),
            ),
        }
    }

    fn handle_notification(&mut self, method: &str) {
        match method {
            "notifications/initialized" => {
                self.initialized = true;
                tracing::info!("client initialized");
            }
            other => tracing::debug!(method = other, "ignoring notification"),
        }
    }

    fn handle_initialize(&self, id: Value) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": { "listChanged": false }
                },
                "serverInfo": {
                    "name": self.info.name,
                    "version": self.info.version,
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        JsonRpcResponse::success(id, serde_json::json!({ "tools": self.registry.definitions() }))
    }

    async fn handle_tools_call(&self, id: Value, params: Value) -> JsonRpcResponse {
        let call: ToolCallParams = match serde_json::from_value(params) {
            Ok(call) => call,
            Err(e) => {
                return JsonRpcResponse::failure(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("Invalid tools/call params: {e}"),
                )
            }
        };

        let result = self.registry.dispatch(&call.name, call.arguments).await;
        match serde_json::to_value(&result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::failure(
                id,
                error_codes::INTERNAL_ERROR,
                format!("failed to encode tool result: {e}"),
            ),
        }
    }
}

/// Parse failures have no usable id, so they are answered with `id: null`.
fn parse_error(message: String) -> JsonRpcResponse {
    JsonRpcResponse::failure(Value::Null, error_codes::PARSE_ERROR, message)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
