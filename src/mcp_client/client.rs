//! Tool client: the single entry point for invoking provider tools.
//!
//! Hides the provider process and transport behind `call_tool`. The session
//! is an explicit state machine:
//!
//! ```text
//! Uninitialized ──first call──▶ Connected ──close()──▶ Closed
//!       ▲                           │
//!       └──── session-fatal error ──┘
//! ```
//!
//! A session-fatal error tears the broken session down; the next call starts
//! a fresh one. Nothing is accepted after `close()`.

use std::process::ExitStatus;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;

use super::errors::McpError;
use super::lifecycle::{self, ManagedServer};
use super::transport::extract_result;
use super::types::{CallToolResult, McpToolDefinition, ServerConfig, ToolsListResult};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Default timeout for a single request (ms).
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 30_000;

// ─── Session State ───────────────────────────────────────────────────────────

enum SessionState {
    Uninitialized,
    Connected(ManagedServer),
    Closed,
}

// ─── McpClient ───────────────────────────────────────────────────────────────

/// Client owning at most one live provider session.
pub struct McpClient {
    name: String,
    config: ServerConfig,
    state: SessionState,
    call_timeout_ms: u64,
    sessions_started: u32,
}

impl McpClient {
    /// Create a client. No process is started until the first call.
    pub fn new(name: &str, config: ServerConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
            state: SessionState::Uninitialized,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            sessions_started: 0,
        }
    }

    /// Set the per-request timeout in milliseconds.
    pub fn set_call_timeout(&mut self, timeout_ms: u64) {
        self.call_timeout_ms = timeout_ms;
    }

    /// Whether a live session exists.
    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected(_))
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Closed)
    }

    /// OS process id of the live provider, if any.
    pub fn process_id(&self) -> Option<u32> {
        match &self.state {
            SessionState::Connected(server) => server.process_id(),
            _ => None,
        }
    }

    /// How many sessions this client has started so far.
    pub fn sessions_started(&self) -> u32 {
        self.sessions_started
    }

    // ─── Tool Operations ─────────────────────────────────────────────────

    /// Fetch the provider's tool catalog (`tools/list`).
    pub async fn list_tools(&mut self) -> Result<Vec<McpToolDefinition>, McpError> {
        let result = self
            .request("tools/list", Some(serde_json::json!({})), "tools/list")
            .await?;

        match serde_json::from_value::<ToolsListResult>(result) {
            Ok(list) => Ok(list.tools),
            Err(e) => Err(self
                .protocol_violation(format!("malformed tools/list result: {e}"))
                .await),
        }
    }

    /// Invoke a tool and return the raw `tools/call` result.
    ///
    /// `is_error` results are returned as data, not as `Err`.
    pub async fn call_tool_raw(
        &mut self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<CallToolResult, McpError> {
        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments,
        });

        let start = Instant::now();
        let result = self.request("tools/call", Some(params), tool_name).await?;

        let parsed = match serde_json::from_value::<CallToolResult>(result) {
            Ok(parsed) => parsed,
            Err(e) => {
                return Err(self
                    .protocol_violation(format!("malformed tools/call result: {e}"))
                    .await)
            }
        };

        tracing::debug!(
            tool = tool_name,
            is_error = parsed.is_error,
            execution_time_ms = start.elapsed().as_millis() as u64,
            "tool call returned"
        );

        Ok(parsed)
    }

    /// Invoke a tool and return its parsed payload.
    ///
    /// A reported failure (`isError`), or a payload that is itself an object
    /// with an `error` field, becomes `McpError::ToolExecutionError`.
    pub async fn call_tool(
        &mut self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, McpError> {
        let result = self.call_tool_raw(tool_name, arguments).await?;
        interpret_tool_result(tool_name, result)
    }

    /// Invoke a tool and deserialize its payload into `T`.
    pub async fn call_tool_as<T: DeserializeOwned>(
        &mut self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<T, McpError> {
        let value = self.call_tool(tool_name, arguments).await?;
        serde_json::from_value(value).map_err(|e| McpError::DecodeError {
            tool: tool_name.to_string(),
            reason: e.to_string(),
        })
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Terminate the provider and release the transport.
    ///
    /// Safe to call at any time and any number of times; only the first call
    /// does anything. Returns the provider's exit status when a live process
    /// was shut down.
    pub async fn close(&mut self) -> Option<ExitStatus> {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Connected(mut server) => {
                tracing::info!(server = %self.name, "closing tool session");
                server.shutdown().await
            }
            SessionState::Uninitialized => {
                tracing::debug!(server = %self.name, "closing tool client that never connected");
                None
            }
            SessionState::Closed => None,
        }
    }

    /// Return the live session, starting one if needed.
    async fn ensure_session(&mut self) -> Result<&mut ManagedServer, McpError> {
        if matches!(self.state, SessionState::Closed) {
            return Err(McpError::Closed);
        }

        if matches!(self.state, SessionState::Uninitialized) {
            let server = lifecycle::spawn_server(&self.name, &self.config).await?;
            self.sessions_started += 1;
            let provider = server.server_info.server_info.as_ref();
            tracing::info!(
                server = %self.name,
                session = self.sessions_started,
                provider = provider.map(|i| i.name.as_str()).unwrap_or("unknown"),
                provider_version = provider.map(|i| i.version.as_str()).unwrap_or("unknown"),
                protocol_version = %server.server_info.protocol_version,
                "tool session started"
            );
            self.state = SessionState::Connected(server);
        }

        match &mut self.state {
            SessionState::Connected(server) => Ok(server),
            _ => Err(McpError::Closed),
        }
    }

    /// Send one request on the live session, discarding the session on any
    /// session-fatal failure.
    async fn request(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
        label: &str,
    ) -> Result<serde_json::Value, McpError> {
        let timeout_ms = self.call_timeout_ms;
        let server = self.ensure_session().await?;

        let outcome = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            server.transport.request(method, params),
        )
        .await;

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                self.discard_session(&e).await;
                return Err(e);
            }
            Err(_) => {
                let e = McpError::Timeout {
                    tool: label.to_string(),
                    timeout_ms,
                };
                self.discard_session(&e).await;
                return Err(e);
            }
        };

        extract_result(response)
    }

    async fn protocol_violation(&mut self, reason: String) -> McpError {
        let e = McpError::ProtocolError {
            server: self.name.clone(),
            reason,
        };
        self.discard_session(&e).await;
        e
    }

    /// Tear down a session that can no longer be trusted.
    async fn discard_session(&mut self, cause: &McpError) {
        if let SessionState::Connected(mut server) =
            std::mem::replace(&mut self.state, SessionState::Uninitialized)
        {
            tracing::warn!(
                server = %self.name,
                error = %cause,
                "discarding tool session after fatal error"
            );
            server.kill().await;
        }
    }
}

/// Turn a `tools/call` result into the caller's payload or a tool error.
pub fn interpret_tool_result(
    tool_name: &str,
    result: CallToolResult,
) -> Result<serde_json::Value, McpError> {
    let text = result.joined_text();

    if result.is_error {
        return Err(McpError::ToolExecutionError {
            tool: tool_name.to_string(),
            message: text,
        });
    }

    if result.content.is_empty() {
        return Ok(serde_json::Value::Null);
    }

    let value = serde_json::from_str::<serde_json::Value>(&text)
        .unwrap_or(serde_json::Value::String(text));

    if let Some(err) = value.get("error").filter(|e| !e.is_null()) {
        let message = match err {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(McpError::ToolExecutionError {
            tool: tool_name.to_string(),
            message,
        });
    }

    Ok(value)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn missing_provider() -> ServerConfig {
        ServerConfig::new("/nonexistent/collections-tools", vec![])
    }

    #[test]
    fn test_new_client_is_uninitialized() {
        let client = McpClient::new("ledger", missing_provider());
        assert!(!client.is_connected());
        assert!(!client.is_closed());
        assert_eq!(client.process_id(), None);
        assert_eq!(client.sessions_started(), 0);
    }

    #[test]
    fn test_set_call_timeout() {
        let mut client = McpClient::new("ledger", missing_provider());
        client.set_call_timeout(5000);
        assert_eq!(client.call_timeout_ms, 5000);
    }

    #[tokio::test]
    async fn test_close_without_calls_is_idempotent() {
        let mut client = McpClient::new("ledger", missing_provider());
        assert!(client.close().await.is_none());
        assert!(client.is_closed());
        assert!(client.close().await.is_none());
        assert!(client.is_closed());
    }

    #[tokio::test]
    async fn test_call_after_close_fails_immediately() {
        let mut client = McpClient::new("ledger", missing_provider());
        client.close().await;
        let err = client
            .call_tool("list_customers_with_balance", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::Closed));
    }

    #[tokio::test]
    async fn test_spawn_failure_leaves_client_retryable() {
        let mut client = McpClient::new("ledger", missing_provider());
        let err = client.list_tools().await.unwrap_err();
        assert!(matches!(err, McpError::SpawnFailed { .. }));
        assert!(!client.is_connected());
        assert!(!client.is_closed());
    }

    #[test]
    fn test_interpret_success_parses_json() {
        let value =
            interpret_tool_result("t", CallToolResult::text(r#"["C1","C2"]"#)).unwrap();
        assert_eq!(value, serde_json::json!(["C1", "C2"]));
    }

    #[test]
    fn test_interpret_plain_text_payload() {
        let value = interpret_tool_result("t", CallToolResult::text("done")).unwrap();
        assert_eq!(value, serde_json::json!("done"));
    }

    #[test]
    fn test_interpret_is_error() {
        let err = interpret_tool_result("t", CallToolResult::error("Unknown tool: 'x'")).unwrap_err();
        match err {
            McpError::ToolExecutionError { tool, message } => {
                assert_eq!(tool, "t");
                assert!(message.contains("'x'"));
            }
            other => panic!("expected ToolExecutionError, got {other:?}"),
        }
    }

    #[test]
    fn test_interpret_domain_error_object() {
        let err = interpret_tool_result(
            "get_customer_balance",
            CallToolResult::text(r#"{"error":"customer not found"}"#),
        )
        .unwrap_err();
        assert!(matches!(err, McpError::ToolExecutionError { ref message, .. } if message == "customer not found"));
    }

    #[test]
    fn test_interpret_null_error_field_is_success() {
        let value =
            interpret_tool_result("t", CallToolResult::text(r#"{"error":null,"ok":true}"#)).unwrap();
        assert_eq!(value["ok"], true);
    }
}
