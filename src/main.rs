//! `collections-agent`: runs collections requests through the agent loop.
//!
//! Takes a single prompt as an argument, or reads one request per line from
//! stdin. Each answer is printed to stdout.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use collections_agent::agent_core::{Agent, Conversation, TurnOutcome};
use collections_agent::config::AgentConfig;
use collections_agent::inference::InferenceClient;
use collections_agent::logging::{self, LogTarget};
use collections_agent::mcp_client::McpClient;

#[derive(Debug, Parser)]
#[command(name = "collections-agent", version, about = "Collections agent over a sandboxed tool provider")]
struct Args {
    /// Agent config file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log to stderr instead of the rotated log file.
    #[arg(long)]
    log_stderr: bool,

    /// Request to run. Reads one request per line from stdin when omitted.
    prompt: Option<String>,
}

type CollectionsAgent = Agent<InferenceClient, McpClient>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = AgentConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let target = if args.log_stderr || config.logging.stderr {
        LogTarget::Stderr
    } else {
        LogTarget::File {
            dir: config
                .logging
                .dir
                .as_deref()
                .map(PathBuf::from)
                .unwrap_or_else(logging::data_dir),
            keep: config.logging.keep_files,
        }
    };
    logging::init_tracing(target).context("initializing logging")?;

    let model = InferenceClient::new(config.model.clone())?;
    let mut client = McpClient::new("collections", config.provider.clone());
    client.set_call_timeout(config.agent.call_timeout_ms);

    let mut agent = Agent::new(model, client, config.agent.clone());
    let mut conversation = agent.new_conversation();

    let result = match args.prompt {
        Some(prompt) => run_turn(&mut agent, &mut conversation, &prompt).await,
        None => run_stdin(&mut agent, &mut conversation).await,
    };

    if let Some(status) = agent.tools_mut().close().await {
        tracing::info!(%status, "tool provider exited");
    }

    result
}

async fn run_stdin(
    agent: &mut CollectionsAgent,
    conversation: &mut Conversation,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Err(e) = run_turn(agent, conversation, line).await {
            // The conversation stays usable; a broken tool session restarts on the next call.
            eprintln!("error: {e:#}");
        }
    }
    Ok(())
}

async fn run_turn(
    agent: &mut CollectionsAgent,
    conversation: &mut Conversation,
    prompt: &str,
) -> anyhow::Result<()> {
    let outcome: TurnOutcome = agent.run_turn(conversation, prompt).await?;

    tracing::info!(
        iterations = outcome.iterations,
        tool_calls = outcome.tool_calls,
        actions = outcome.executed_actions.len(),
        exhausted = outcome.exhausted,
        "turn complete"
    );

    println!("{}", outcome.answer);
    Ok(())
}
