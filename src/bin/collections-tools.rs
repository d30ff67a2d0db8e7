//! `collections-tools`: the sandboxed tool provider.
//!
//! Serves the collections tools as newline-delimited JSON-RPC on stdin/stdout.
//! Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use collections_agent::config::ProviderConfig;
use collections_agent::logging::{self, LogTarget};
use collections_agent::mcp_server::{collections_registry, LedgerBackend, ToolServer};

#[derive(Debug, Parser)]
#[command(name = "collections-tools", version, about = "Collections tool provider (JSON-RPC over stdio)")]
struct Args {
    /// Provider config file (ledger, outbox and notes paths).
    #[arg(short, long)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_tracing(LogTarget::Stderr)?;

    let config = ProviderConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let backend = LedgerBackend::load(
        &config.ledger_path,
        config.outbox_path.clone(),
        config.notes_path.clone(),
    )?;
    let registry = collections_registry(Arc::new(backend))?;

    let mut server = ToolServer::new("collections-tools", registry);
    server
        .serve(tokio::io::stdin(), tokio::io::stdout())
        .await
        .context("tool server I/O failed")?;

    tracing::info!("tool server exiting");
    Ok(())
}
