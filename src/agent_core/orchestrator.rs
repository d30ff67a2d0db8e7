//! Agent loop: the bounded model/tool cycle for one user turn.
//!
//! ```text
//! user input
//!   │
//!   ▼
//! AwaitingModel ──(tool calls)──▶ ExecutingTools ──(all results appended)──┐
//!   │   ▲                                                                   │
//!   │   └───────────────────────────────────────────────────────────────────┘
//!   └──(text, no tool calls)──▶ Done
//! ```
//!
//! At most `max_iterations` model calls are made per turn. When the ceiling is
//! reached the turn ends with a synthesized message instead of another model
//! call. Tool calls within a turn run one at a time in the order the model
//! issued them, and each is attempted at most once.

use std::collections::HashSet;

use crate::config::LoopConfig;
use crate::inference::types::ChatMessage;
use crate::inference::ModelBackend;
use crate::mcp_client::ToolCatalog;

use super::conversation::Conversation;
use super::errors::AgentError;
use super::tool_router::{execute_intent, translate_tool_call, ToolExecutionOutcome, ToolInvoker};
use super::types::{ExecutedAction, LoopState, TurnOutcome};

/// Default system prompt for the collections workflow.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an accounts-receivable collections assistant. \
Use the provided tools to look up customers with outstanding balances, inspect their open \
invoices, send payment reminder emails and record collection notes. Only call \
send_collection_email once per customer per request. If a tool reports an error, tell the \
user exactly which actions did not happen. When you are finished, answer with a short summary \
of what was done.";

/// Text used in place of a result for intents skipped after a session failure.
const SKIPPED_AFTER_FAILURE: &str =
    "Not executed: the tool service failed before this call could run. Nothing was done.";

// ─── Agent ──────────────────────────────────────────────────────────────────

/// Runs user turns against a model and a tool provider.
pub struct Agent<M, T> {
    model: M,
    tools: T,
    settings: LoopConfig,
    catalog: Option<ToolCatalog>,
    openai_tools: Vec<serde_json::Value>,
    turns: u64,
}

impl<M: ModelBackend, T: ToolInvoker> Agent<M, T> {
    /// Create an agent. The tool catalog is fetched on the first turn.
    pub fn new(model: M, tools: T, settings: LoopConfig) -> Self {
        Self {
            model,
            tools,
            settings,
            catalog: None,
            openai_tools: Vec::new(),
            turns: 0,
        }
    }

    /// Start a conversation using the configured or default system prompt.
    pub fn new_conversation(&self) -> Conversation {
        let prompt = self
            .settings
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        Conversation::new(Some(prompt), self.settings.max_history_messages)
    }

    /// The tool backend, e.g. to close the session.
    pub fn tools_mut(&mut self) -> &mut T {
        &mut self.tools
    }

    /// The model backend.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The cached catalog, if one has been fetched.
    pub fn catalog(&self) -> Option<&ToolCatalog> {
        self.catalog.as_ref()
    }

    /// Fetch the tool catalog if it has not been fetched yet.
    pub async fn ensure_catalog(&mut self) -> Result<&ToolCatalog, AgentError> {
        if self.catalog.is_none() {
            let tools = self
                .tools
                .list_tools()
                .await
                .map_err(|source| AgentError::Catalog { source })?;
            let catalog = ToolCatalog::new(tools);
            tracing::info!(
                tool_count = catalog.len(),
                tools = ?catalog.tool_names(),
                "tool catalog loaded"
            );
            self.openai_tools = catalog.to_openai_tools();
            self.catalog = Some(catalog);
        }

        self.catalog.as_ref().ok_or_else(|| AgentError::Catalog {
            source: crate::mcp_client::McpError::Closed,
        })
    }

    /// Run one user turn to completion.
    ///
    /// Returns the answer, or a synthesized message when the iteration
    /// ceiling is reached. Model failures and tool-session failures abort the
    /// turn with an error; in the latter case the transcript still holds a
    /// result for every tool call the model issued.
    pub async fn run_turn(
        &mut self,
        conversation: &mut Conversation,
        user_input: &str,
    ) -> Result<TurnOutcome, AgentError> {
        self.turns += 1;
        let turn = self.turns;
        let max_iterations = self.settings.max_iterations;

        let catalog = self.ensure_catalog().await?.clone();

        conversation.push_user(user_input);
        log_transition(turn, LoopState::AwaitingUserInput, LoopState::AwaitingModel);

        let mut executed_actions: Vec<ExecutedAction> = Vec::new();
        let mut completed_side_effects: HashSet<String> = HashSet::new();
        let mut tool_calls = 0usize;

        for iteration in 1..=max_iterations {
            tracing::info!(
                turn,
                iteration,
                message_count = conversation.len(),
                estimated_tokens = conversation.estimated_tokens(),
                "calling model"
            );

            let model_turn = self
                .model
                .complete(conversation.messages(), &self.openai_tools)
                .await?;

            tracing::info!(
                turn,
                iteration,
                text_len = model_turn.content.as_deref().map_or(0, str::len),
                tool_calls_count = model_turn.tool_calls.len(),
                tool_names = ?model_turn.tool_calls.iter().map(|tc| tc.function.name.as_str()).collect::<Vec<_>>(),
                "model responded"
            );

            if model_turn.is_empty() {
                tracing::warn!(turn, iteration, "model returned an empty turn");
                continue;
            }

            if model_turn.tool_calls.is_empty() {
                let answer = model_turn.content.unwrap_or_default();
                conversation.push(ChatMessage::assistant(answer.clone()));
                log_transition(turn, LoopState::AwaitingModel, LoopState::Done);
                return Ok(TurnOutcome {
                    answer,
                    exhausted: false,
                    iterations: iteration,
                    tool_calls,
                    executed_actions,
                });
            }

            let calls = model_turn.tool_calls;
            conversation.push(ChatMessage::assistant_tool_calls(
                model_turn.content,
                calls.clone(),
            ));
            log_transition(turn, LoopState::AwaitingModel, LoopState::ExecutingTools);

            for (index, call) in calls.iter().enumerate() {
                let intent = match translate_tool_call(call) {
                    Ok(intent) => intent,
                    Err(text) => {
                        tracing::warn!(
                            turn,
                            tool = %call.function.name,
                            "rejected tool call with unusable arguments"
                        );
                        conversation.push(ChatMessage::tool_result(call.id.clone(), text));
                        continue;
                    }
                };

                let side_effecting = catalog.is_side_effecting(&intent.name);
                let signature = intent.signature();

                let outcome = if side_effecting && completed_side_effects.contains(&signature) {
                    tracing::warn!(turn, tool = %intent.name, "skipping repeated side-effecting call");
                    ToolExecutionOutcome::Duplicate {
                        text: format!(
                            "Skipped: '{}' was already performed with these exact arguments \
                             earlier in this request. It was NOT repeated.",
                            intent.name
                        ),
                    }
                } else {
                    tool_calls += 1;
                    let start = std::time::Instant::now();
                    let outcome = execute_intent(
                        &mut self.tools,
                        &intent,
                        side_effecting,
                        self.settings.max_tool_result_chars,
                    )
                    .await;
                    tracing::info!(
                        turn,
                        iteration,
                        tool = %intent.name,
                        call_id = %intent.id,
                        side_effecting,
                        is_error = outcome.is_error(),
                        execution_time_ms = start.elapsed().as_millis() as u64,
                        "tool executed"
                    );
                    outcome
                };

                // The transcript uses the model's id so the result pairs with its call.
                conversation.push(ChatMessage::tool_result(
                    call.id.clone(),
                    outcome.model_text(),
                ));

                match outcome {
                    ToolExecutionOutcome::Success { .. } if side_effecting => {
                        completed_side_effects.insert(signature);
                        executed_actions.push(ExecutedAction {
                            tool_name: intent.name.clone(),
                            arguments: intent.arguments.clone(),
                        });
                    }
                    ToolExecutionOutcome::SessionFailed { error, .. } => {
                        for skipped in &calls[index + 1..] {
                            conversation.push(ChatMessage::tool_result(
                                skipped.id.clone(),
                                SKIPPED_AFTER_FAILURE,
                            ));
                        }
                        tracing::error!(
                            turn,
                            tool = %intent.name,
                            error = %error,
                            skipped = calls.len() - index - 1,
                            "tool session failed; aborting turn"
                        );
                        return Err(AgentError::ToolSession {
                            tool: intent.name,
                            source: error,
                        });
                    }
                    _ => {}
                }
            }

            log_transition(turn, LoopState::ExecutingTools, LoopState::AwaitingModel);
        }

        tracing::warn!(
            turn,
            max_iterations,
            tool_calls,
            executed_actions = executed_actions.len(),
            "iteration limit reached without a final answer"
        );

        let answer = exhaustion_message(max_iterations, &executed_actions);
        conversation.push(ChatMessage::assistant(answer.clone()));
        log_transition(turn, LoopState::AwaitingModel, LoopState::Done);

        Ok(TurnOutcome {
            answer,
            exhausted: true,
            iterations: max_iterations,
            tool_calls,
            executed_actions,
        })
    }
}

fn log_transition(turn: u64, from: LoopState, to: LoopState) {
    tracing::debug!(turn, from = %from, to = %to, "loop state transition");
}

/// The answer given when the iteration ceiling is reached.
pub fn exhaustion_message(max_iterations: usize, executed: &[ExecutedAction]) -> String {
    let mut message = format!(
        "I could not complete this request within {max_iterations} steps, so I stopped."
    );

    if executed.is_empty() {
        message.push_str(" No emails were sent and no notes were recorded.");
    } else {
        message.push_str(" These actions were already carried out and were not undone:");
        for action in executed {
            message.push_str("\n- ");
            message.push_str(&action.describe());
        }
    }

    message
}

// ─── Tests ──────────────────────────────────────────────────────────────────
