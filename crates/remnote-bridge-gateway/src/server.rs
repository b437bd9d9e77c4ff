//! HTTP and WebSocket servers.
//!
//! The plugin connects to the WebSocket listener (always loopback) at `/`.
//! MCP clients use the Streamable HTTP endpoint `/mcp` on the HTTP listener.

use crate::error::GatewayError;
use crate::gateway::{serve_peer, Gateway};
use crate::methods::MethodRegistry;
use crate::rpc::{JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::session::SessionRegistry;
use crate::tools::ToolRouter;
use crate::Result;
use axum::{
    extract::{State, WebSocketUpgrade},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use parking_lot::Mutex;
use remnote_bridge_core::BridgeConfig;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Header carrying the MCP session id.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// How long `stop` waits for each listener to drain.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Origins allowed to call the HTTP endpoint from a browser.
const LOCAL_ORIGINS: &[&str] = &[
    "http://localhost",
    "http://127.0.0.1",
    "https://localhost",
    "https://127.0.0.1",
];

/// Addresses the listeners actually bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundAddrs {
    pub ws: SocketAddr,
    pub http: SocketAddr,
}

struct Running {
    addrs: BoundAddrs,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

#[derive(Clone)]
struct HttpState {
    sessions: Arc<SessionRegistry>,
    gateway: Arc<Gateway>,
}

/// The bridge: plugin gateway plus MCP front end.
pub struct BridgeServer {
    config: BridgeConfig,
    gateway: Arc<Gateway>,
    sessions: Arc<SessionRegistry>,
    running: tokio::sync::Mutex<Option<Running>>,
    addrs: Mutex<Option<BoundAddrs>>,
}

impl BridgeServer {
    /// Build the bridge from configuration. Nothing is bound yet.
    pub async fn new(config: BridgeConfig) -> Result<Self> {
        let gateway = Arc::new(Gateway::from_config(&config)?);
        let router = Arc::new(ToolRouter::new(gateway.clone()));
        let methods = Arc::new(MethodRegistry::with_tools(router).await);
        let sessions = Arc::new(SessionRegistry::new(methods));

        announce_peer_events(&gateway, &sessions);

        Ok(Self {
            config,
            gateway,
            sessions,
            running: tokio::sync::Mutex::new(None),
            addrs: Mutex::new(None),
        })
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Bound addresses while running.
    pub fn addrs(&self) -> Option<BoundAddrs> {
        *self.addrs.lock()
    }

    /// Bind both listeners and start serving.
    ///
    /// Calling `start` on a running server returns the current addresses.
    pub async fn start(&self) -> Result<BoundAddrs> {
        let mut running = self.running.lock().await;
        if let Some(running) = running.as_ref() {
            return Ok(running.addrs);
        }

        let ws_listener = bind(&self.config.ws_bind_address()).await?;
        let http_listener = bind(&self.config.http_bind_address()).await?;
        let addrs = BoundAddrs {
            ws: ws_listener.local_addr()?,
            http: http_listener.local_addr()?,
        };

        let shutdown = CancellationToken::new();
        let tasks = vec![
            spawn_server("websocket", ws_listener, self.ws_router(), shutdown.clone()),
            spawn_server("http", http_listener, self.http_router(), shutdown.clone()),
        ];

        info!(addr = %addrs.ws, "Plugin WebSocket listening");
        info!(
            addr = %addrs.http,
            server_instance_id = %self.sessions.server_instance_id(),
            "MCP HTTP endpoint listening on /mcp"
        );

        *running = Some(Running {
            addrs,
            shutdown,
            tasks,
        });
        *self.addrs.lock() = Some(addrs);
        Ok(addrs)
    }

    /// Close every session and the plugin connection, then stop listening.
    /// Does nothing if the server is not running.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        *self.addrs.lock() = None;

        self.sessions.stop_all();
        self.gateway.shutdown();
        running.shutdown.cancel();

        for mut task in running.tasks {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                warn!("Listener did not drain in time; aborting");
                task.abort();
            }
        }
        self.gateway.flush_wire_logs().await;
        info!("Bridge stopped");
    }

    fn ws_router(&self) -> Router {
        Router::new()
            .route("/", get(ws_handler))
            .with_state(self.gateway.clone())
    }

    fn http_router(&self) -> Router {
        let state = HttpState {
            sessions: self.sessions.clone(),
            gateway: self.gateway.clone(),
        };

        Router::new()
            .route(
                "/mcp",
                get(stream_session).post(post_message).delete(delete_session),
            )
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(cors_layer())
            .layer(TraceLayer::new_for_http())
    }
}

async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr).await.map_err(|e| {
        error!(addr, error = %e, "Failed to bind");
        GatewayError::Io(e)
    })
}

fn spawn_server(
    name: &'static str,
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
        match result {
            Ok(()) => debug!(server = name, "Listener stopped"),
            Err(e) => error!(server = name, error = %e, "Listener failed"),
        }
    })
}

/// Push plugin connect/disconnect to every MCP session.
fn announce_peer_events(gateway: &Gateway, sessions: &Arc<SessionRegistry>) {
    let registry: Weak<SessionRegistry> = Arc::downgrade(sessions);
    gateway.on_connect(move || {
        if let Some(registry) = registry.upgrade() {
            registry.broadcast(JsonRpcNotification::log_message(
                "info",
                json!({"event": "plugin_connected", "message": "RemNote plugin connected"}),
            ));
        }
        Ok(())
    });

    let registry: Weak<SessionRegistry> = Arc::downgrade(sessions);
    gateway.on_disconnect(move || {
        if let Some(registry) = registry.upgrade() {
            registry.broadcast(JsonRpcNotification::log_message(
                "warning",
                json!({"event": "plugin_disconnected", "message": "RemNote plugin disconnected"}),
            ));
        }
        Ok(())
    });
}

fn cors_layer() -> CorsLayer {
    let session_header = HeaderName::from_static(SESSION_HEADER);
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
            origin
                .to_str()
                .map(|o| LOCAL_ORIGINS.iter().any(|allowed| o.starts_with(allowed)))
                .unwrap_or(false)
        }))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, session_header.clone()])
        .expose_headers([session_header])
        .max_age(Duration::from_secs(3600))
}

/// Plugin WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(gateway): State<Arc<Gateway>>) -> Response {
    ws.on_upgrade(move |socket| serve_peer(gateway, socket))
}

fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn rpc_error(status: StatusCode, id: Option<serde_json::Value>, error: JsonRpcError) -> Response {
    (status, Json(JsonRpcResponse::error(id, error))).into_response()
}

fn with_session_header(mut response: Response, session_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(session_id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

fn missing_session_header() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": "Missing mcp-session-id header"})),
    )
        .into_response()
}

fn session_not_found(session_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": GatewayError::SessionNotFound(session_id.to_string()).to_string()})),
    )
        .into_response()
}

/// `POST /mcp`: initialize a session or route a request to one.
async fn post_message(State(state): State<HttpState>, headers: HeaderMap, body: String) -> Response {
    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Unparsable MCP request");
            return rpc_error(
                StatusCode::BAD_REQUEST,
                None,
                JsonRpcError::parse_error(format!("Parse error: {}", e)),
            );
        }
    };

    let Some(session_id) = session_id(&headers) else {
        return match state.sessions.begin_session(&request) {
            Ok((session, response)) => {
                with_session_header(Json(response).into_response(), session.id())
            }
            Err(_) => rpc_error(
                StatusCode::BAD_REQUEST,
                request.id,
                JsonRpcError::invalid_request(
                    "Missing mcp-session-id header for non-initialize request",
                ),
            ),
        };
    };

    debug!(session_id = %session_id, method = %request.method, "MCP request");
    let request_id = request.id.clone();
    match state.sessions.route_request(&session_id, request).await {
        Ok(Some(response)) => with_session_header(Json(response).into_response(), &session_id),
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(e) if e.requires_reinitialize() => {
            warn!(
                session_id = %session_id,
                server_instance_id = %state.sessions.server_instance_id(),
                "Invalid MCP session id; client must reinitialize"
            );
            rpc_error(
                StatusCode::BAD_REQUEST,
                request_id,
                JsonRpcError::session_invalidated(&session_id, state.sessions.server_instance_id()),
            )
        }
        Err(e @ GatewayError::SessionClosed(_)) => {
            rpc_error(StatusCode::NOT_FOUND, request_id, JsonRpcError::from(&e))
        }
        Err(e) => rpc_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            request_id,
            JsonRpcError::from(&e),
        ),
    }
}

/// `GET /mcp`: server-sent notifications for one session.
async fn stream_session(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    let Some(session_id) = session_id(&headers) else {
        return missing_session_header();
    };
    let Some(session) = state.sessions.get(&session_id) else {
        return session_not_found(&session_id);
    };

    debug!(session_id = %session_id, "SSE stream opened");
    let receiver = session.subscribe();
    let stream = futures::stream::unfold((receiver, session), |(mut receiver, session)| async move {
        loop {
            let next = tokio::select! {
                _ = session.closed() => None,
                message = receiver.recv() => Some(message),
            };
            match next {
                None | Some(Err(RecvError::Closed)) => return None,
                Some(Ok(notification)) => {
                    let event = Event::default().event("message").json_data(&notification);
                    return Some((event, (receiver, session)));
                }
                Some(Err(RecvError::Lagged(skipped))) => {
                    warn!(session_id = %session.id(), skipped, "SSE stream lagged");
                }
            }
        }
    });

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// `DELETE /mcp`: terminate a session.
async fn delete_session(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    let Some(session_id) = session_id(&headers) else {
        return missing_session_header();
    };
    match state.sessions.terminate_session(&session_id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(_) => session_not_found(&session_id),
    }
}

/// Health check handler.
async fn health_handler(State(state): State<HttpState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": state.gateway.server_version(),
        "serverInstanceId": state.sessions.server_instance_id(),
        "peerConnected": state.gateway.is_connected(),
        "activeSessions": state.sessions.active_session_count(),
    }))
}
