//! Shared types across the agent core.

use serde::Serialize;

// ─── Loop State ─────────────────────────────────────────────────────────────

/// Where a user turn currently is.
///
/// ```text
/// AwaitingUserInput ─▶ AwaitingModel ─▶ ExecutingTools ─┐
///                           ▲    │                      │
///                           │    └──────▶ Done          │
///                           └───────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    AwaitingUserInput,
    AwaitingModel,
    ExecutingTools,
    Done,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LoopState::AwaitingUserInput => "awaiting_user_input",
            LoopState::AwaitingModel => "awaiting_model",
            LoopState::ExecutingTools => "executing_tools",
            LoopState::Done => "done",
        };
        f.write_str(s)
    }
}

// ─── Tool Intents ───────────────────────────────────────────────────────────

/// A validated request from the model to run one tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallIntent {
    /// Links the eventual tool result back to this intent.
    pub id: String,
    pub name: String,
    /// Always a JSON object.
    pub arguments: serde_json::Value,
}

impl ToolCallIntent {
    /// Stable key for recognising a repeated call within a turn.
    pub fn signature(&self) -> String {
        format!("{}:{}", self.name, self.arguments)
    }
}

/// A side-effecting tool call that completed during a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedAction {
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

impl ExecutedAction {
    /// One-line human description, e.g. `send_collection_email(customer_id=C001)`.
    pub fn describe(&self) -> String {
        let args = match self.arguments.as_object() {
            Some(map) => map
                .iter()
                .filter_map(|(k, v)| {
                    let v = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                    (k.ends_with("_id")).then(|| format!("{k}={v}"))
                })
                .collect::<Vec<_>>()
                .join(", "),
            None => String::new(),
        };
        format!("{}({args})", self.tool_name)
    }
}

// ─── Turn Outcome ───────────────────────────────────────────────────────────

/// Result of one user turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    /// User-facing answer text. Never empty.
    pub answer: String,
    /// The iteration ceiling was reached before the model produced an answer.
    pub exhausted: bool,
    /// Model calls made during the turn.
    pub iterations: usize,
    /// Tool intents dispatched to the provider (including failed ones).
    pub tool_calls: usize,
    /// Side-effecting calls that completed successfully.
    pub executed_actions: Vec<ExecutedAction>,
}
