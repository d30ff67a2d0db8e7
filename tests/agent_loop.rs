//! The agent loop driving the real provider process with a scripted model.

mod common;

use std::collections::VecDeque;

use async_trait::async_trait;

use collections_agent::agent_core::Agent;
use collections_agent::config::LoopConfig;
use collections_agent::inference::types::{ChatMessage, ModelTurn, Role, ToolCallResponse};
use collections_agent::inference::{InferenceError, ModelBackend};
use collections_agent::mcp_client::McpClient;

use common::Fixture;

struct ScriptedModel {
    script: VecDeque<ModelTurn>,
    calls: usize,
}

impl ScriptedModel {
    fn new(turns: Vec<ModelTurn>) -> Self {
        Self {
            script: turns.into(),
            calls: 0,
        }
    }
}

#[async_trait]
impl ModelBackend for ScriptedModel {
    async fn complete(
        &mut self,
        _messages: &[ChatMessage],
        tools: &[serde_json::Value],
    ) -> Result<ModelTurn, InferenceError> {
        self.calls += 1;
        assert_eq!(tools.len(), 4, "catalog should be offered on every call");
        Ok(self.script.pop_front().unwrap_or_else(|| {
            ModelTurn::calls(vec![ToolCallResponse::function(
                format!("again_{}", self.calls),
                "list_customers_with_balance",
                "{}",
            )])
        }))
    }
}

fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCallResponse {
    ToolCallResponse::function(id, name, args.to_string())
}

#[tokio::test]
async fn test_collections_run_end_to_end() {
    let fixture = Fixture::new();
    let client = McpClient::new("collections", fixture.server_config());

    let model = ScriptedModel::new(vec![
        ModelTurn::calls(vec![call("c1", "list_customers_with_balance", serde_json::json!({}))]),
        ModelTurn::calls(vec![
            call("c2", "get_customer_balance", serde_json::json!({"customer_id": "C001"})),
            call("c3", "get_customer_balance", serde_json::json!({"customer_id": "C002"})),
        ]),
        ModelTurn::calls(vec![
            call(
                "c4",
                "send_collection_email",
                serde_json::json!({"customer_id": "C001", "subject": "Overdue invoices", "body": "Please pay INV-101 and INV-102."}),
            ),
            call(
                "c5",
                "send_collection_email",
                serde_json::json!({"customer_id": "C002", "subject": "Overdue invoice", "body": "Please pay INV-103."}),
            ),
            call(
                "c6",
                "record_collection_note",
                serde_json::json!({"customer_id": "C002", "note": "No email on file; call instead."}),
            ),
        ]),
        ModelTurn::text("Emailed C001. C002 has no email address; noted for a phone call."),
    ]);

    let mut agent = Agent::new(model, client, LoopConfig::default());
    let mut conversation = agent.new_conversation();

    let outcome = agent
        .run_turn(&mut conversation, "Chase every customer with an open balance.")
        .await
        .unwrap();

    assert!(!outcome.exhausted);
    assert_eq!(outcome.iterations, 4);
    assert_eq!(outcome.tool_calls, 6);
    let actions: Vec<String> = outcome.executed_actions.iter().map(|a| a.describe()).collect();
    assert_eq!(
        actions,
        vec![
            "send_collection_email(customer_id=C001)",
            "record_collection_note(customer_id=C002)"
        ]
    );
    assert_eq!(fixture.outbox_lines(), 1);
    assert!(conversation.is_well_paired());

    let failed_email = conversation
        .messages()
        .iter()
        .find(|m| m.role == Role::Tool && m.tool_call_id.as_deref() == Some("c5"))
        .unwrap();
    assert!(failed_email.content.as_deref().unwrap().contains("did NOT happen"));

    agent.tools_mut().close().await;
}

#[tokio::test]
async fn test_runaway_model_stops_at_iteration_limit() {
    let fixture = Fixture::new();
    let client = McpClient::new("collections", fixture.server_config());
    let model = ScriptedModel::new(Vec::new());

    let settings = LoopConfig {
        max_iterations: 5,
        ..LoopConfig::default()
    };
    let mut agent = Agent::new(model, client, settings);
    let mut conversation = agent.new_conversation();

    let outcome = agent.run_turn(&mut conversation, "loop forever").await.unwrap();
    assert!(outcome.exhausted);
    assert_eq!(agent.model().calls, 5);
    assert_eq!(outcome.iterations, 5);
    assert!(outcome.answer.contains("within 5 steps"));
    assert!(conversation.is_well_paired());
    assert_eq!(fixture.outbox_lines(), 0);

    agent.tools_mut().close().await;
}
