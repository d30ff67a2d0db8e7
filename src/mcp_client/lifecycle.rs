//! Provider process lifecycle management.
//!
//! Spawns the provider as a child process, performs the initialization
//! handshake over its stdio, forwards its stderr into our logs, and shuts it
//! down. The child talks to us only through its two pipes.

use std::process::ExitStatus;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};

use super::errors::McpError;
use super::transport::{extract_result, StdioTransport};
use super::types::{InitializeResult, ServerConfig, PROTOCOL_VERSION};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Timeout for the initialize handshake.
const INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for graceful shutdown before force-killing.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ─── ManagedServer ───────────────────────────────────────────────────────────

/// A running provider process with its transport.
pub struct ManagedServer {
    /// Human-readable provider name (used in logs and errors).
    pub name: String,
    /// The child process handle.
    process: Child,
    /// JSON-RPC transport (stdin/stdout).
    pub transport: StdioTransport,
    /// What the provider reported during the handshake.
    pub server_info: InitializeResult,
}

impl ManagedServer {
    /// OS process id of the child, if it is still known.
    pub fn process_id(&self) -> Option<u32> {
        self.process.id()
    }

    /// Shut the provider down and reap it.
    ///
    /// Closes stdin so a well-behaved provider exits on EOF; force-kills it if
    /// it has not exited within `SHUTDOWN_TIMEOUT`.
    pub async fn shutdown(&mut self) -> Option<ExitStatus> {
        self.transport.close_writer().await;

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.process.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(server = %self.name, %status, "provider exited");
                Some(status)
            }
            _ => {
                tracing::warn!(server = %self.name, "provider did not exit in time, killing");
                let _ = self.process.kill().await;
                self.process.try_wait().ok().flatten()
            }
        }
    }

    /// Kill the provider immediately (used after session-fatal errors).
    pub async fn kill(&mut self) {
        let _ = self.process.kill().await;
    }
}

// ─── Spawning ────────────────────────────────────────────────────────────────

/// Spawn the provider process and perform the initialization handshake.
pub async fn spawn_server(name: &str, config: &ServerConfig) -> Result<ManagedServer, McpError> {
    let mut cmd = Command::new(&config.command);
    cmd.args(&config.args);

    // Inherited environment plus overrides
    for (key, value) in &config.env {
        cmd.env(key, value);
    }

    if let Some(dir) = config.cwd.as_deref() {
        cmd.current_dir(dir);
    }

    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
        name: name.to_string(),
        reason: format!("{}: {e}", config.command),
    })?;

    let stdin = child.stdin.take().ok_or(McpError::SpawnFailed {
        name: name.to_string(),
        reason: "failed to capture stdin".into(),
    })?;

    let stdout = child.stdout.take().ok_or(McpError::SpawnFailed {
        name: name.to_string(),
        reason: "failed to capture stdout".into(),
    })?;

    if let Some(stderr) = child.stderr.take() {
        forward_stderr(name.to_string(), stderr);
    }

    tracing::info!(
        server = name,
        command = %config.command,
        pid = child.id().unwrap_or_default(),
        "provider process spawned"
    );

    let mut transport = StdioTransport::new(name, stdin, stdout);

    let server_info = match tokio::time::timeout(INIT_TIMEOUT, initialize(&mut transport, name)).await
    {
        Ok(Ok(info)) => info,
        Ok(Err(e)) => {
            let _ = child.kill().await;
            return Err(McpError::InitFailed {
                name: name.to_string(),
                reason: e.to_string(),
            });
        }
        Err(_) => {
            let _ = child.kill().await;
            return Err(McpError::InitFailed {
                name: name.to_string(),
                reason: format!("initialization timed out after {}s", INIT_TIMEOUT.as_secs()),
            });
        }
    };

    Ok(ManagedServer {
        name: name.to_string(),
        process: child,
        transport,
        server_info,
    })
}

/// Relay the provider's stderr into our tracing output, line by line.
fn forward_stderr(server: String, stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(server = %server, "provider stderr: {line}");
        }
    });
}

/// Perform the initialization handshake.
async fn initialize(
    transport: &mut StdioTransport,
    server_name: &str,
) -> Result<InitializeResult, McpError> {
    let params = serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
    });
    let response = transport.request("initialize", Some(params)).await?;
    let result = extract_result(response)?;

    let init_result: InitializeResult =
        serde_json::from_value(result).map_err(|e| McpError::InitFailed {
            name: server_name.to_string(),
            reason: format!("failed to parse initialize response: {e}"),
        })?;

    transport.notify("notifications/initialized", None).await?;

    tracing::info!(
        server = server_name,
        protocol_version = %init_result.protocol_version,
        "provider initialized"
    );

    Ok(init_result)
}
