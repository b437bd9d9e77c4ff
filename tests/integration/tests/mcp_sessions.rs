//! MCP front end: session lifecycle, routing, error structure, and pushes.

use futures::StreamExt;
use remnote_bridge_gateway::SESSION_HEADER;
use remnote_bridge_integration_tests::{tool_text, TestBridge};
use serde_json::{json, Value};
use std::time::Duration;

#[tokio::test]
async fn test_initialize_returns_session_and_capabilities() {
    let bridge = TestBridge::start().await;
    let mcp = bridge.mcp();

    let response = mcp
        .post(
            None,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"protocolVersion": "2024-11-05"}}),
        )
        .await;
    assert_eq!(response.status(), 200);
    assert!(response.headers().get(SESSION_HEADER).is_some());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["id"], 1);
    assert_eq!(body["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(body["result"]["serverInfo"]["name"], "remnote-bridge");
    assert_eq!(bridge.server.sessions().active_session_count(), 1);

    bridge.stop().await;
}

#[tokio::test]
async fn test_non_initialize_without_session_is_bad_request() {
    let bridge = TestBridge::start().await;
    let mcp = bridge.mcp();

    let response = mcp
        .post(None, json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(bridge.server.sessions().active_session_count(), 0);

    bridge.stop().await;
}

#[tokio::test]
async fn test_unknown_session_requires_reinitialize() {
    let bridge = TestBridge::start().await;
    let mcp = bridge.mcp();
    mcp.initialize().await;

    let response = mcp
        .post(
            Some("never-issued"),
            json!({"jsonrpc": "2.0", "id": 5, "method": "tools/list"}),
        )
        .await;
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["id"], 5);
    assert_eq!(body["error"]["code"], -32600);
    let data = &body["error"]["data"];
    assert_eq!(data["reason"], "session_invalidated");
    assert_eq!(data["requiresReinitialize"], true);
    assert_eq!(data["retryable"], true);
    assert_eq!(
        data["serverInstanceId"],
        bridge.server.sessions().server_instance_id()
    );

    bridge.stop().await;
}

#[tokio::test]
async fn test_parse_error() {
    let bridge = TestBridge::start().await;
    let response = bridge
        .mcp()
        .http
        .post(bridge.mcp_url())
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32700);

    bridge.stop().await;
}

#[tokio::test]
async fn test_tools_list_and_unknown_method() {
    let bridge = TestBridge::start().await;
    let mcp = bridge.mcp();
    let session = mcp.initialize().await;

    let body = mcp.rpc(&session, 2, "tools/list", json!({})).await;
    let names: Vec<&str> = body["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"remnote_create_note"));
    assert!(names.contains(&"remnote_append_journal"));
    assert_eq!(names.len(), 6);

    let body = mcp.rpc(&session, 3, "prompts/list", json!({})).await;
    assert_eq!(body["error"]["code"], -32601);

    let body = mcp.rpc(&session, 4, "ping", json!({})).await;
    assert_eq!(body["result"], json!({}));

    bridge.stop().await;
}

#[tokio::test]
async fn test_status_tool_without_plugin() {
    let bridge = TestBridge::start().await;
    let mcp = bridge.mcp();
    let session = mcp.initialize().await;

    let result = mcp.call_tool(&session, "remnote_status", json!({})).await;
    assert!(result.get("isError").is_none());
    let status: Value = serde_json::from_str(tool_text(&result)).unwrap();
    assert_eq!(status["connected"], false);
    assert_eq!(status["message"], "RemNote plugin not connected");

    bridge.stop().await;
}

#[tokio::test]
async fn test_two_sessions_are_independent() {
    let bridge = TestBridge::start().await;
    let plugin = bridge.connect_plugin().await;
    let responder = plugin.serve(|action, payload| json!({"action": action, "echo": payload}));

    let mcp = bridge.mcp();
    let a = mcp.initialize().await;
    let b = mcp.initialize().await;
    assert_ne!(a, b);
    assert_eq!(bridge.server.sessions().active_session_count(), 2);

    let from_a = mcp
        .call_tool(&a, "remnote_search", json!({"query": "from a"}))
        .await;
    let from_b = mcp
        .call_tool(&b, "remnote_create_note", json!({"title": "from b"}))
        .await;

    let a_out: Value = serde_json::from_str(tool_text(&from_a)).unwrap();
    let b_out: Value = serde_json::from_str(tool_text(&from_b)).unwrap();
    assert_eq!(a_out["action"], "search");
    assert_eq!(a_out["echo"]["query"], "from a");
    assert_eq!(b_out["action"], "create_note");
    assert_eq!(b_out["echo"]["title"], "from b");

    let response = mcp.delete(Some(&a)).await;
    assert_eq!(response.status(), 200);
    assert_eq!(bridge.server.sessions().active_session_count(), 1);

    let body = mcp.rpc(&a, 9, "ping", json!({})).await;
    assert_eq!(body["error"]["data"]["requiresReinitialize"], true);
    let body = mcp.rpc(&b, 9, "ping", json!({})).await;
    assert_eq!(body["result"], json!({}));

    bridge.stop().await;
    let _ = responder.await;
}

#[tokio::test]
async fn test_deleting_one_session_spares_anothers_call_in_flight() {
    let bridge = TestBridge::start().await;
    let mut plugin = bridge.connect_plugin().await;

    let mcp = bridge.mcp();
    let a = mcp.initialize().await;
    let b = mcp.initialize().await;

    let a_call = {
        let (mcp, a) = (bridge.mcp(), a.clone());
        tokio::spawn(async move {
            mcp.post(
                Some(&a),
                json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
                       "params": {"name": "remnote_search", "arguments": {"query": "from a"}}}),
            )
            .await
        })
    };
    let pending_a = plugin.next_call().await;
    assert_eq!(pending_a.payload["query"], "from a");

    let b_call = {
        let (mcp, b) = (bridge.mcp(), b.clone());
        tokio::spawn(async move {
            mcp.call_tool(&b, "remnote_create_note", json!({"title": "from b"}))
                .await
        })
    };
    let pending_b = plugin.next_call().await;
    assert_eq!(pending_b.action, "create_note");

    // Both calls are now waiting on the plugin.
    assert_eq!(bridge.server.gateway().pending_count(), 2);

    assert_eq!(mcp.delete(Some(&a)).await.status(), 200);
    assert_eq!(bridge.server.sessions().active_session_count(), 1);
    assert_eq!(a_call.await.unwrap().status(), 404);

    plugin.reply(&pending_b.id, json!({"remId": "new-rem"})).await;
    let from_b = b_call.await.unwrap();
    assert!(from_b.get("isError").is_none());
    let created: Value = serde_json::from_str(tool_text(&from_b)).unwrap();
    assert_eq!(created["remId"], "new-rem");

    // The late answer for the terminated session's call is dropped.
    plugin.reply(&pending_a.id, json!({"results": []})).await;
    let body = mcp.rpc(&b, 2, "ping", json!({})).await;
    assert_eq!(body["result"], json!({}));
    assert_eq!(bridge.server.gateway().pending_count(), 0);
    assert_eq!(bridge.server.sessions().active_session_count(), 1);

    bridge.stop().await;
}

#[tokio::test]
async fn test_delete_and_get_status_codes() {
    let bridge = TestBridge::start().await;
    let mcp = bridge.mcp();
    let session = mcp.initialize().await;

    assert_eq!(mcp.delete(None).await.status(), 400);
    assert_eq!(mcp.delete(Some("unknown")).await.status(), 404);
    assert_eq!(mcp.get(None).await.status(), 400);
    assert_eq!(mcp.get(Some("unknown")).await.status(), 404);

    assert_eq!(mcp.delete(Some(&session)).await.status(), 200);
    assert_eq!(mcp.delete(Some(&session)).await.status(), 404);

    bridge.stop().await;
}

#[tokio::test]
async fn test_event_stream_announces_plugin() {
    let bridge = TestBridge::start().await;
    let mcp = bridge.mcp();
    let session = mcp.initialize().await;

    let response = mcp.get(Some(&session)).await;
    assert_eq!(response.status(), 200);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let _plugin = bridge.connect_plugin().await;

    let mut stream = response.bytes_stream();
    let mut seen = String::new();
    let found = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(chunk) = stream.next().await {
            seen.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            if seen.contains("plugin_connected") {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    assert!(found, "stream never announced the plugin: {}", seen);
    assert!(seen.contains("notifications/message"));

    bridge.stop().await;
}

#[tokio::test]
async fn test_health() {
    let bridge = TestBridge::start().await;
    let mcp = bridge.mcp();
    mcp.initialize().await;
    let _plugin = bridge.connect_plugin().await;

    let health: Value = mcp
        .http
        .get(bridge.health_url())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(health["status"], "ok");
    assert_eq!(health["peerConnected"], true);
    assert_eq!(health["activeSessions"], 1);
    assert_eq!(
        health["serverInstanceId"],
        bridge.server.sessions().server_instance_id()
    );

    bridge.stop().await;
}

#[tokio::test]
async fn test_stop_closes_all_sessions() {
    let bridge = TestBridge::start().await;
    let mcp = bridge.mcp();
    mcp.initialize().await;
    mcp.initialize().await;

    bridge.server.stop().await;
    assert_eq!(bridge.server.sessions().active_session_count(), 0);
    bridge.server.stop().await;
}
