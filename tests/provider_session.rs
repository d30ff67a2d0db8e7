//! Session-level behaviour against the real provider process.

mod common;

use collections_agent::mcp_client::types::PROTOCOL_VERSION;
use collections_agent::mcp_client::{lifecycle, McpClient, McpError};
use serde::Deserialize;

use common::Fixture;

#[derive(Debug, Deserialize)]
struct BalanceView {
    customer_id: String,
    total_outstanding_cents: i64,
}

#[tokio::test]
async fn test_lists_exactly_the_four_collections_tools() {
    let fixture = Fixture::new();
    let mut client = McpClient::new("collections", fixture.server_config());

    let tools = client.list_tools().await.unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "list_customers_with_balance",
            "get_customer_balance",
            "send_collection_email",
            "record_collection_note"
        ]
    );
    assert!(!tools[0].is_side_effecting());
    assert!(tools[2].is_side_effecting());

    client.close().await;
}

#[tokio::test]
async fn test_handshake_reports_provider_identity() {
    let fixture = Fixture::new();
    let mut server = lifecycle::spawn_server("collections", &fixture.server_config())
        .await
        .unwrap();

    let info = server.server_info.server_info.as_ref().unwrap();
    assert_eq!(info.name, "collections-tools");
    assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(server.server_info.protocol_version, PROTOCOL_VERSION);

    assert!(server.shutdown().await.is_some());
}

#[tokio::test]
async fn test_listing_twice_is_identical() {
    let fixture = Fixture::new();
    let mut client = McpClient::new("collections", fixture.server_config());

    let first = client.list_tools().await.unwrap();
    let second = client.list_tools().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(client.sessions_started(), 1);

    client.close().await;
}

#[tokio::test]
async fn test_balance_listing_is_deduplicated() {
    let fixture = Fixture::new();
    let mut client = McpClient::new("collections", fixture.server_config());

    let ids: Vec<String> = client
        .call_tool_as("list_customers_with_balance", serde_json::json!({}))
        .await
        .unwrap();
    // C001 has two open invoices; C004 is paid up
    assert_eq!(ids, vec!["C001", "C002", "C003"]);

    client.close().await;
}

#[tokio::test]
async fn test_malformed_tool_name_keeps_session_usable() {
    let fixture = Fixture::new();
    let mut client = McpClient::new("collections", fixture.server_config());
    client.list_tools().await.unwrap();
    let pid = client.process_id();

    let result = client
        .call_tool_raw("get customer balance!!", serde_json::json!({}))
        .await
        .unwrap();
    assert!(result.is_error);
    assert!(result.joined_text().contains("get customer balance!!"));

    let balance: BalanceView = client
        .call_tool_as("get_customer_balance", serde_json::json!({"customer_id": "C001"}))
        .await
        .unwrap();
    assert_eq!(balance.total_outstanding_cents, 125_500);
    assert_eq!(client.process_id(), pid);
    assert_eq!(client.sessions_started(), 1);

    client.close().await;
}

#[tokio::test]
async fn test_every_response_matches_its_request() {
    let fixture = Fixture::new();
    let mut client = McpClient::new("collections", fixture.server_config());

    let ids = ["C001", "C002", "C003"];
    for i in 0..30 {
        let id = ids[i % ids.len()];
        let balance: BalanceView = client
            .call_tool_as("get_customer_balance", serde_json::json!({"customer_id": id}))
            .await
            .unwrap();
        assert_eq!(balance.customer_id, id);
    }
    assert_eq!(client.sessions_started(), 1);

    client.close().await;
}

#[tokio::test]
async fn test_failing_side_effect_is_reported_and_session_survives() {
    let fixture = Fixture::new();
    let mut client = McpClient::new("collections", fixture.server_config());

    let err = client
        .call_tool(
            "send_collection_email",
            serde_json::json!({"customer_id": "C002", "subject": "Overdue", "body": "Please pay"}),
        )
        .await
        .unwrap_err();
    match err {
        McpError::ToolExecutionError { tool, message } => {
            assert_eq!(tool, "send_collection_email");
            assert!(message.contains("NOT sent"));
        }
        other => panic!("expected ToolExecutionError, got {other:?}"),
    }
    assert!(client.is_connected());
    assert_eq!(fixture.outbox_lines(), 0);

    let sent = client
        .call_tool(
            "send_collection_email",
            serde_json::json!({"customer_id": "C001", "subject": "Overdue", "body": "Please pay"}),
        )
        .await
        .unwrap();
    assert_eq!(sent["status"], "sent");
    assert_eq!(fixture.outbox_lines(), 1);

    client.close().await;
}

#[tokio::test]
async fn test_unknown_customer_is_tool_error() {
    let fixture = Fixture::new();
    let mut client = McpClient::new("collections", fixture.server_config());

    let err = client
        .call_tool("get_customer_balance", serde_json::json!({"customer_id": "C999"}))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::ToolExecutionError { ref message, .. } if message.contains("C999")));
    assert!(client.is_connected());

    client.close().await;
}

#[tokio::test]
async fn test_close_terminates_provider() {
    let fixture = Fixture::new();
    let mut client = McpClient::new("collections", fixture.server_config());
    client.list_tools().await.unwrap();
    let pid = client.process_id().unwrap();
    assert!(common::process_exists(pid));

    let status = client.close().await;
    assert!(status.is_some());
    assert!(client.is_closed());
    if cfg!(target_os = "linux") {
        assert!(!common::process_exists(pid));
    }

    assert!(client.close().await.is_none());
    let err = client.list_tools().await.unwrap_err();
    assert!(matches!(err, McpError::Closed));
}

#[cfg(unix)]
#[tokio::test]
async fn test_killed_provider_is_fatal_then_restarted() {
    let fixture = Fixture::new();
    let mut client = McpClient::new("collections", fixture.server_config());
    client.list_tools().await.unwrap();
    let pid = client.process_id().unwrap();

    let status = std::process::Command::new("kill")
        .args(["-9", &pid.to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let err = client.list_tools().await.unwrap_err();
    assert!(err.is_session_fatal(), "unexpected error: {err:?}");
    assert!(!client.is_connected());

    // Next call starts a fresh session
    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 4);
    assert_eq!(client.sessions_started(), 2);
    assert_ne!(client.process_id(), Some(pid));

    client.close().await;
}
