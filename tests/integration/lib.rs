//! Shared harness for the bridge integration tests.
//!
//! Starts a real [`BridgeServer`] on ephemeral ports and drives it from both
//! sides: a fake RemNote plugin over WebSocket and an MCP client over HTTP.

use futures::{SinkExt, StreamExt};
use remnote_bridge_core::BridgeConfig;
use remnote_bridge_gateway::{BoundAddrs, BridgeServer, CallEnvelope, SESSION_HEADER};
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type PluginSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A running bridge bound to ephemeral ports.
pub struct TestBridge {
    pub server: BridgeServer,
    pub addrs: BoundAddrs,
}

impl TestBridge {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Start with a tweaked configuration.
    pub async fn start_with(tweak: impl FnOnce(&mut BridgeConfig)) -> Self {
        let mut config = BridgeConfig {
            ws_port: 0,
            http_port: 0,
            ..BridgeConfig::default()
        };
        tweak(&mut config);

        let server = BridgeServer::new(config).await.expect("build bridge");
        let addrs = server.start().await.expect("start bridge");
        Self { server, addrs }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/", self.addrs.ws)
    }

    pub fn mcp_url(&self) -> String {
        format!("http://{}/mcp", self.addrs.http)
    }

    pub fn health_url(&self) -> String {
        format!("http://{}/health", self.addrs.http)
    }

    /// Connect a plugin and wait until the gateway has claimed it.
    pub async fn connect_plugin(&self) -> FakePlugin {
        let plugin = FakePlugin::connect(&self.ws_url()).await;
        let gateway = self.server.gateway().clone();
        wait_until(move || {
            let gateway = gateway.clone();
            async move { gateway.is_connected() }
        })
        .await;
        plugin
    }

    pub fn mcp(&self) -> McpHttp {
        McpHttp::new(self.mcp_url())
    }

    pub async fn stop(self) {
        self.server.stop().await;
    }
}

/// Poll `check` until it holds, failing after two seconds.
pub async fn wait_until<F, Fut>(check: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}

/// The plugin side of the WebSocket.
pub struct FakePlugin {
    socket: PluginSocket,
}

impl FakePlugin {
    pub async fn connect(url: &str) -> Self {
        let (socket, _) = tokio_tungstenite::connect_async(url)
            .await
            .expect("plugin connect");
        Self { socket }
    }

    pub async fn send_json(&mut self, value: Value) {
        self.send_text(value.to_string()).await;
    }

    pub async fn send_text(&mut self, text: impl Into<String>) {
        self.socket
            .send(Message::Text(text.into()))
            .await
            .expect("plugin send");
    }

    /// Next text frame as JSON, skipping transport-level pings.
    pub async fn next_json(&mut self) -> Value {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(5), self.socket.next())
                .await
                .expect("frame within 5s")
                .expect("socket open")
                .expect("frame ok");
            match message {
                Message::Text(text) => return serde_json::from_str(&text).expect("json frame"),
                Message::Ping(_) | Message::Pong(_) => continue,
                other => panic!("Unexpected frame: {:?}", other),
            }
        }
    }

    pub async fn next_call(&mut self) -> CallEnvelope {
        serde_json::from_value(self.next_json().await).expect("call envelope")
    }

    pub async fn reply(&mut self, id: &str, result: Value) {
        self.send_json(json!({"id": id, "result": result})).await;
    }

    pub async fn reply_error(&mut self, id: &str, error: &str) {
        self.send_json(json!({"id": id, "error": error})).await;
    }

    /// Wait for the server's close frame.
    pub async fn expect_close(&mut self) -> Option<CloseFrame<'static>> {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(5), self.socket.next())
                .await
                .expect("close within 5s");
            match message {
                Some(Ok(Message::Close(frame))) => return frame,
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(other)) => panic!("Expected close, got {:?}", other),
                Some(Err(_)) | None => return None,
            }
        }
    }

    /// Answer every call with `respond(action, payload)` until the socket closes.
    pub fn serve<F>(mut self, respond: F) -> tokio::task::JoinHandle<()>
    where
        F: Fn(&str, &Value) -> Value + Send + 'static,
    {
        tokio::spawn(async move {
            while let Some(Ok(message)) = self.socket.next().await {
                let Message::Text(text) = message else {
                    continue;
                };
                let Ok(call) = serde_json::from_str::<CallEnvelope>(&text) else {
                    continue;
                };
                let result = respond(&call.action, &call.payload);
                if self
                    .socket
                    .send(Message::Text(
                        json!({"id": call.id, "result": result}).to_string(),
                    ))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        })
    }

    pub async fn close(mut self) {
        let _ = self.socket.close(None).await;
    }
}

/// MCP Streamable HTTP client with raw access to status codes.
pub struct McpHttp {
    pub http: reqwest::Client,
    pub url: String,
}

impl McpHttp {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }

    pub async fn post(&self, session_id: Option<&str>, body: Value) -> reqwest::Response {
        let mut request = self
            .http
            .post(&self.url)
            .header("accept", "application/json, text/event-stream")
            .json(&body);
        if let Some(id) = session_id {
            request = request.header(SESSION_HEADER, id);
        }
        request.send().await.expect("POST /mcp")
    }

    /// Initialize a session and return its id.
    pub async fn initialize(&self) -> String {
        let response = self
            .post(
                None,
                json!({
                    "jsonrpc": "2.0",
                    "id": 0,
                    "method": "initialize",
                    "params": {"protocolVersion": "2025-03-26", "capabilities": {}, "clientInfo": {"name": "it", "version": "0"}}
                }),
            )
            .await;
        assert_eq!(response.status(), 200);
        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .expect("session header")
            .to_str()
            .expect("ascii session id")
            .to_string();

        let ack = self
            .post(
                Some(&session_id),
                json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            )
            .await;
        assert_eq!(ack.status(), 202);
        session_id
    }

    /// Call `method` on a session and return the JSON-RPC response body.
    pub async fn rpc(&self, session_id: &str, id: u64, method: &str, params: Value) -> Value {
        self.post(
            Some(session_id),
            json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}),
        )
        .await
        .json()
        .await
        .expect("json body")
    }

    /// Call a tool and return `result` of the JSON-RPC response.
    pub async fn call_tool(&self, session_id: &str, name: &str, arguments: Value) -> Value {
        let body = self
            .rpc(
                session_id,
                1,
                "tools/call",
                json!({"name": name, "arguments": arguments}),
            )
            .await;
        body["result"].clone()
    }

    pub async fn delete(&self, session_id: Option<&str>) -> reqwest::Response {
        let mut request = self.http.delete(&self.url);
        if let Some(id) = session_id {
            request = request.header(SESSION_HEADER, id);
        }
        request.send().await.expect("DELETE /mcp")
    }

    pub async fn get(&self, session_id: Option<&str>) -> reqwest::Response {
        let mut request = self.http.get(&self.url).header("accept", "text/event-stream");
        if let Some(id) = session_id {
            request = request.header(SESSION_HEADER, id);
        }
        request.send().await.expect("GET /mcp")
    }
}

/// Text of the first content block of a tool result.
pub fn tool_text(result: &Value) -> &str {
    result["content"][0]["text"].as_str().expect("text content")
}
