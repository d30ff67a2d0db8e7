//! JSON-RPC over stdio transport.
//!
//! Handles low-level communication with the provider child process:
//! - Writing JSON-RPC requests to its stdin
//! - Reading JSON-RPC responses from its stdout
//! - Line-delimited JSON protocol (one JSON object per line)
//!
//! A transport belongs to exactly one session. Request ids come from a
//! per-transport counter. Any framing or correlation failure poisons the
//! transport: every later request fails immediately instead of trying to
//! resynchronize on a stream whose position is unknown.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use super::errors::McpError;
use super::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

// ─── Transport ───────────────────────────────────────────────────────────────

/// Bi-directional JSON-RPC transport over a child process's stdio.
pub struct StdioTransport {
    server_name: String,
    writer: Option<BoxedWriter>,
    reader: BufReader<BoxedReader>,
    next_id: u64,
    /// Set once a session-fatal error has been observed.
    failure: Option<String>,
}

impl StdioTransport {
    /// Create a new transport from a writable and a readable half.
    ///
    /// In production these are the child's stdin and stdout; tests pass
    /// in-memory duplex streams.
    pub fn new<W, R>(server_name: &str, writer: W, reader: R) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            server_name: server_name.to_string(),
            writer: Some(Box::new(writer)),
            reader: BufReader::new(Box::new(reader)),
            next_id: 1,
            failure: None,
        }
    }

    /// Whether a session-fatal error has already occurred on this transport.
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// The id the next request will carry.
    #[cfg(test)]
    pub(crate) fn peek_next_id(&self) -> u64 {
        self.next_id
    }

    /// Send a JSON-RPC request and wait for the correlated response.
    ///
    /// Exactly one line is expected back per request. Server notifications
    /// (messages with a `method` and no `id`) are tolerated and skipped;
    /// anything else that is not the matching response is a protocol error.
    pub async fn request(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse, McpError> {
        if let Some(reason) = &self.failure {
            return Err(McpError::TransportError {
                server: self.server_name.clone(),
                reason: format!("transport unusable after earlier failure: {reason}"),
            });
        }

        let id = self.next_id;
        self.next_id += 1;
        let req = JsonRpcRequest::new(id, method, params);

        let json = serde_json::to_string(&req).map_err(|e| McpError::ProtocolError {
            server: self.server_name.clone(),
            reason: format!("failed to serialize request: {e}"),
        })?;

        tracing::debug!(server = %self.server_name, id, method, "sending request");
        self.write_line(json).await?;

        let mut line_buf = Vec::new();
        loop {
            line_buf.clear();
            let bytes_read = match self.reader.read_until(b'\n', &mut line_buf).await {
                Ok(n) => n,
                Err(e) => {
                    return Err(self.fail_transport(format!("failed to read from stdout: {e}")))
                }
            };

            if bytes_read == 0 {
                return Err(
                    self.fail_transport("provider stdout closed (process may have exited)".into())
                );
            }

            let line = match std::str::from_utf8(&line_buf) {
                Ok(line) => line,
                Err(e) => {
                    return Err(self.fail_protocol(format!("message is not valid UTF-8: {e}")));
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let raw: serde_json::Value = match serde_json::from_str(trimmed) {
                Ok(v) => v,
                Err(e) => {
                    return Err(self.fail_protocol(format!("unparseable message: {e}")));
                }
            };

            let has_id = raw.get("id").is_some_and(|v| !v.is_null());
            if raw.get("method").is_some() && !has_id {
                tracing::debug!(
                    server = %self.server_name,
                    method = raw["method"].as_str().unwrap_or(""),
                    "skipping provider notification"
                );
                continue;
            }

            let resp: JsonRpcResponse = match serde_json::from_value(raw) {
                Ok(r) => r,
                Err(e) => {
                    return Err(self.fail_protocol(format!("not a JSON-RPC response: {e}")));
                }
            };

            if resp.id.as_u64() != Some(id) {
                return Err(self.fail_protocol(format!(
                    "response id {} does not match outstanding request {id}",
                    resp.id
                )));
            }

            if resp.result.is_some() == resp.error.is_some() {
                return Err(self.fail_protocol(format!(
                    "response {id} must carry exactly one of result or error"
                )));
            }

            return Ok(resp);
        }
    }

    /// Send a JSON-RPC notification (no response expected).
    pub async fn notify(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        let notification = JsonRpcNotification::new(method, params);
        let json = serde_json::to_string(&notification).map_err(|e| McpError::ProtocolError {
            server: self.server_name.clone(),
            reason: format!("failed to serialize notification: {e}"),
        })?;
        self.write_line(json).await
    }

    /// Close the write half, signalling end-of-input to the provider.
    pub async fn close_writer(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
    }

    async fn write_line(&mut self, mut json: String) -> Result<(), McpError> {
        json.push('\n');

        let Some(writer) = self.writer.as_mut() else {
            return Err(self.fail_transport("stdin already closed".into()));
        };

        if let Err(e) = writer.write_all(json.as_bytes()).await {
            return Err(self.fail_transport(format!("failed to write to stdin: {e}")));
        }
        if let Err(e) = writer.flush().await {
            return Err(self.fail_transport(format!("failed to flush stdin: {e}")));
        }
        Ok(())
    }

    fn fail_transport(&mut self, reason: String) -> McpError {
        tracing::warn!(server = %self.server_name, reason = %reason, "transport failed");
        self.failure = Some(reason.clone());
        McpError::TransportError {
            server: self.server_name.clone(),
            reason,
        }
    }

    fn fail_protocol(&mut self, reason: String) -> McpError {
        tracing::warn!(server = %self.server_name, reason = %reason, "protocol violation");
        self.failure = Some(reason.clone());
        McpError::ProtocolError {
            server: self.server_name.clone(),
            reason,
        }
    }
}

// ─── Response Helpers ────────────────────────────────────────────────────────

/// Extract the result from a JSON-RPC response, converting errors to `McpError`.
pub fn extract_result(response: JsonRpcResponse) -> Result<serde_json::Value, McpError> {
    if let Some(err) = response.error {
        return Err(McpError::ServerError {
            code: err.code,
            message: err.message,
            data: err.data,
        });
    }

    response.result.ok_or(McpError::ServerError {
        code: -32603,
        message: "response missing both result and error".into(),
        data: None,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
