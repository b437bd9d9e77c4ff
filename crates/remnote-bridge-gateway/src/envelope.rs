//! Envelopes exchanged with the plugin over the WebSocket.
//!
//! Every frame is one JSON object. Outbound calls carry `{id, action, payload}`;
//! the plugin answers with `{id, result?, error?}`. Heartbeats and the hello
//! announcement are tagged by `type` and never correlated.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A call sent to the plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope {
    /// Correlation id, unique among pending calls.
    pub id: String,

    /// Operation the plugin should run.
    pub action: String,

    /// Operation arguments.
    pub payload: Value,
}

impl CallEnvelope {
    /// Create a call with a fresh random id.
    pub fn new(action: impl Into<String>, payload: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action: action.into(),
            payload,
        }
    }
}

/// The plugin's answer to a [`CallEnvelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// Id of the call being answered.
    pub id: String,

    /// Result (on success).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error message (on failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultEnvelope {
    /// Convert into the outcome delivered to the caller.
    ///
    /// A non-empty `error` wins over `result`.
    pub fn into_outcome(self) -> Result<Value, GatewayError> {
        match self.error {
            Some(error) if !error.is_empty() => Err(GatewayError::Peer(error)),
            _ => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Uncorrelated control frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlEnvelope {
    /// Liveness check; answered with `Pong`.
    Ping,
    /// Liveness answer.
    Pong,
    /// Sent once by the plugin after connecting.
    Hello { version: String },
}

/// Any frame the plugin may send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InboundEnvelope {
    Control(ControlEnvelope),
    Response(ResultEnvelope),
}

impl InboundEnvelope {
    /// Decode a text frame. Anything that is not a known shape is an error.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
