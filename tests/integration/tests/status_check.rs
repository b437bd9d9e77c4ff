//! The `status-check` client against a live bridge.

use remnote_bridge_cli::commands::status_check::McpClient;
use remnote_bridge_integration_tests::TestBridge;
use serde_json::{json, Value};
use std::time::Duration;

#[tokio::test]
async fn test_status_check_reports_plugin() {
    let bridge = TestBridge::start().await;
    let plugin = bridge.connect_plugin().await;
    let version = bridge.server.gateway().server_version().to_string();
    let responder = plugin.serve(move |action, _| match action {
        "get_status" => json!({"pluginVersion": version, "remCount": 3}),
        _ => json!(null),
    });

    let mut client = McpClient::new(bridge.mcp_url(), Duration::from_secs(5)).unwrap();
    client.initialize().await.unwrap();
    assert!(client.session_id().is_some());
    assert_eq!(bridge.server.sessions().active_session_count(), 1);

    let output = client.call_tool("remnote_status", json!({})).await.unwrap();
    assert!(!output.is_error);
    let status: Value = serde_json::from_str(output.text()).unwrap();
    assert_eq!(status["connected"], true);
    assert_eq!(status["remCount"], 3);
    assert!(status.get("version_warning").is_none());

    client.close().await.unwrap();
    assert_eq!(bridge.server.sessions().active_session_count(), 0);

    bridge.stop().await;
    let _ = responder.await;
}

#[tokio::test]
async fn test_status_check_flags_version_mismatch() {
    let bridge = TestBridge::start().await;
    let plugin = bridge.connect_plugin().await;
    let responder = plugin.serve(|_, _| json!({"pluginVersion": "99.0.0"}));

    let mut client = McpClient::new(bridge.mcp_url(), Duration::from_secs(5)).unwrap();
    client.initialize().await.unwrap();
    let output = client.call_tool("remnote_status", json!({})).await.unwrap();
    let status: Value = serde_json::from_str(output.text()).unwrap();
    assert!(status["version_warning"]
        .as_str()
        .unwrap()
        .contains("Version mismatch"));

    client.close().await.unwrap();
    bridge.stop().await;
    let _ = responder.await;
}

#[tokio::test]
async fn test_status_check_against_stopped_bridge() {
    let bridge = TestBridge::start().await;
    let url = bridge.mcp_url();
    bridge.stop().await;

    let mut client = McpClient::new(url, Duration::from_millis(500)).unwrap();
    assert!(client.initialize().await.is_err());
}
