//! Gateway error types.

use thiserror::Error;

/// Errors that can occur in the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No plugin is connected; nothing was sent.
    #[error("RemNote plugin not connected. Please ensure the plugin is installed and running.")]
    NotConnected,

    /// The plugin disconnected before answering.
    #[error("Connection lost")]
    ConnectionLost,

    /// A second plugin tried to connect while the slot was taken.
    #[error("Only one client allowed")]
    PeerSlotOccupied,

    /// The plugin did not answer before the call deadline.
    #[error("Request timeout: {action}")]
    Timeout { action: String },

    /// The plugin answered with an error string.
    #[error("{0}")]
    Peer(String),

    /// The outbound frame could not be handed to the socket.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Session id unknown or expired; the client must start a new session.
    #[error("Invalid session ID: {0}. Session may have expired or server was restarted. Reinitialize MCP session (initialize + notifications/initialized).")]
    InvalidSession(String),

    /// Session id unknown to a terminate/stream request.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The session was terminated while the request was in flight.
    #[error("Session terminated: {0}")]
    SessionClosed(String),

    /// Malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Method not found.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Invalid parameters.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Get the JSON-RPC error code.
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidRequest(_) | Self::InvalidSession(_) => -32600,
            Self::MethodNotFound(_) => -32601,
            Self::InvalidParams(_) => -32602,
            Self::Json(_) => -32700,
            Self::SessionNotFound(_) | Self::SessionClosed(_) => -32001,
            _ => -32603,
        }
    }

    /// Whether a client can recover by opening a new session.
    pub fn requires_reinitialize(&self) -> bool {
        matches!(self, Self::InvalidSession(_))
    }
}
