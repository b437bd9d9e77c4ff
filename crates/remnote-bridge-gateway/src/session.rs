//! MCP session management.
//!
//! Each MCP client that sends `initialize` gets its own [`McpSession`],
//! keyed by a server-generated id. All sessions share one method registry
//! and, through it, the single plugin connection.

use crate::error::GatewayError;
use crate::methods::MethodRegistry;
use crate::rpc::{JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Protocol version answered when the client does not ask for one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-03-26";

/// Name reported in `serverInfo`.
pub const SERVER_NAME: &str = "remnote-bridge";

const PUSH_CAPACITY: usize = 64;

/// One MCP client conversation.
pub struct McpSession {
    /// Session ID.
    id: String,

    /// Created timestamp.
    created_at: chrono::DateTime<chrono::Utc>,

    methods: Arc<MethodRegistry>,
    push: broadcast::Sender<JsonRpcNotification>,
    closed: CancellationToken,
}

impl McpSession {
    fn new(id: String, methods: Arc<MethodRegistry>) -> Self {
        let (push, _) = broadcast::channel(PUSH_CAPACITY);
        Self {
            id,
            created_at: chrono::Utc::now(),
            methods,
            push,
            closed: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }

    /// Handle one request. Notifications produce no response.
    ///
    /// Fails with [`GatewayError::SessionClosed`] if the session is closed
    /// before the response is ready.
    pub async fn handle(&self, request: JsonRpcRequest) -> Result<Option<JsonRpcResponse>> {
        if self.closed.is_cancelled() {
            return Err(GatewayError::SessionClosed(self.id.clone()));
        }

        if request.is_notification() {
            debug!(session_id = %self.id, method = %request.method, "Notification received");
            return Ok(None);
        }

        if request.method == "initialize" {
            return Ok(Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::invalid_request("Session already initialized"),
            )));
        }

        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        let outcome = tokio::select! {
            biased;
            _ = self.closed.cancelled() => {
                return Err(GatewayError::SessionClosed(self.id.clone()));
            }
            outcome = self.methods.call(&method, params) => outcome,
        };

        if self.closed.is_cancelled() {
            return Err(GatewayError::SessionClosed(self.id.clone()));
        }

        Ok(Some(match outcome {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => {
                debug!(session_id = %self.id, method = %method, error = %e, "Method failed");
                JsonRpcResponse::error(id, JsonRpcError::from(&e))
            }
        }))
    }

    /// Push a notification to this session's stream, if one is open.
    pub fn notify(&self, notification: JsonRpcNotification) {
        let _ = self.push.send(notification);
    }

    /// Receive notifications pushed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JsonRpcNotification> {
        self.push.subscribe()
    }

    /// Close the session. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        if self.closed.is_cancelled() {
            return false;
        }
        self.closed.cancel();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the session is closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }
}

/// Registry of live MCP sessions.
pub struct SessionRegistry {
    /// Active sessions.
    sessions: Arc<RwLock<HashMap<String, Arc<McpSession>>>>,

    methods: Arc<MethodRegistry>,
    server_instance_id: String,
    server_version: String,
}

impl SessionRegistry {
    /// Create a registry whose sessions are served by `methods`.
    pub fn new(methods: Arc<MethodRegistry>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            methods,
            server_instance_id: uuid::Uuid::new_v4().to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Identifies this server process. Changes on every restart.
    pub fn server_instance_id(&self) -> &str {
        &self.server_instance_id
    }

    /// Start a session from an `initialize` request.
    ///
    /// The session is removed from the registry as soon as it closes.
    pub fn begin_session(
        &self,
        request: &JsonRpcRequest,
    ) -> Result<(Arc<McpSession>, JsonRpcResponse)> {
        if !request.is_initialize() {
            return Err(GatewayError::InvalidRequest(
                "No valid session ID provided".to_string(),
            ));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(McpSession::new(id.clone(), self.methods.clone()));
        self.sessions.write().insert(id.clone(), session.clone());

        let sessions = self.sessions.clone();
        let watched = session.clone();
        tokio::spawn(async move {
            watched.closed().await;
            if sessions.write().remove(watched.id()).is_some() {
                debug!(session_id = %watched.id(), "Closed session unregistered");
            }
        });

        info!(session_id = %id, "MCP session initialized");
        let response = JsonRpcResponse::success(request.id.clone(), self.initialize_result(request));
        Ok((session, response))
    }

    /// Route a request to the session it names.
    pub async fn route_request(
        &self,
        session_id: &str,
        request: JsonRpcRequest,
    ) -> Result<Option<JsonRpcResponse>> {
        let session = self
            .get(session_id)
            .ok_or_else(|| GatewayError::InvalidSession(session_id.to_string()))?;
        session.handle(request).await
    }

    /// Get a session by ID.
    pub fn get(&self, session_id: &str) -> Option<Arc<McpSession>> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Remove and close a session.
    pub fn terminate_session(&self, session_id: &str) -> Result<()> {
        let session = self
            .sessions
            .write()
            .remove(session_id)
            .ok_or_else(|| GatewayError::SessionNotFound(session_id.to_string()))?;
        session.close();
        info!(session_id, "MCP session terminated");
        Ok(())
    }

    /// Close every session and empty the registry.
    pub fn stop_all(&self) -> usize {
        let drained: Vec<Arc<McpSession>> =
            self.sessions.write().drain().map(|(_, s)| s).collect();
        let count = drained.len();
        for session in drained {
            if !session.close() {
                debug!(session_id = %session.id(), "Session was already closed");
            }
        }
        if count > 0 {
            info!(count, "Closed all MCP sessions");
        }
        count
    }

    /// Number of live sessions.
    pub fn active_session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Push a notification to every session.
    pub fn broadcast(&self, notification: JsonRpcNotification) {
        let sessions: Vec<Arc<McpSession>> = self.sessions.read().values().cloned().collect();
        for session in sessions {
            session.notify(notification.clone());
        }
    }

    fn initialize_result(&self, request: &JsonRpcRequest) -> serde_json::Value {
        let protocol_version = request
            .params
            .as_ref()
            .and_then(|p| p.get("protocolVersion"))
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);

        serde_json::json!({
            "protocolVersion": protocol_version,
            "capabilities": {
                "tools": {},
                "logging": {},
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": self.server_version,
            },
        })
    }
}
