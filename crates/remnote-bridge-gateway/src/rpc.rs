//! JSON-RPC 2.0 framing for the MCP endpoint.
//!
//! Only the pieces the bridge speaks are here: requests and notifications
//! from clients, responses back, and the server-pushed log notification.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Protocol version carried in every frame.
pub const JSONRPC_VERSION: &str = "2.0";

/// Logger name on pushed `notifications/message`.
const LOGGER: &str = "remnote-bridge";

fn version() -> String {
    JSONRPC_VERSION.to_string()
}

/// A request, or a notification when `id` is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "version")]
    pub jsonrpc: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    pub method: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// A request expecting a response under `id`.
    pub fn call(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: version(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    /// A fire-and-forget notification.
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: version(),
            id: None,
            method: method.into(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// The MCP handshake. A notification named `initialize` does not count.
    pub fn is_initialize(&self) -> bool {
        self.method == "initialize" && !self.is_notification()
    }
}

/// Response to a [`JsonRpcRequest`]. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: version(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: version(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Error object of a failed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Body that is not JSON-RPC at all (-32700).
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(-32700, message)
    }

    /// Well-formed but not acceptable here (-32600).
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(-32600, message)
    }

    /// Unknown or expired session. Tells the client to start a new one.
    pub fn session_invalidated(session_id: &str, server_instance_id: &str) -> Self {
        let err = GatewayError::InvalidSession(session_id.to_string());
        Self::new(err.code(), err.to_string()).with_data(json!({
            "reason": "session_invalidated",
            "requiresReinitialize": true,
            "retryable": true,
            "serverInstanceId": server_instance_id,
        }))
    }
}

impl From<&GatewayError> for JsonRpcError {
    fn from(err: &GatewayError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// Server-pushed notification, delivered over a session's event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// MCP `notifications/message` at `level`.
    pub fn log_message(level: &str, data: Value) -> Self {
        Self {
            jsonrpc: version(),
            method: "notifications/message".to_string(),
            params: Some(json!({
                "level": level,
                "logger": LOGGER,
                "data": data,
            })),
        }
    }
}
