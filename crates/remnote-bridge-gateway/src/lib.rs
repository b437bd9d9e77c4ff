//! Bridge between the RemNote plugin and MCP clients.
//!
//! This crate provides:
//! - A single-plugin WebSocket gateway with correlated, time-limited calls
//! - MCP Streamable HTTP sessions over JSON-RPC 2.0
//! - The RemNote tool catalogue relayed to the plugin
//! - Optional JSON Lines logs of plugin traffic

pub mod correlation;
pub mod envelope;
pub mod error;
pub mod events;
pub mod gateway;
pub mod methods;
pub mod rpc;
pub mod server;
pub mod session;
pub mod tools;
pub mod wire_log;

pub use correlation::CorrelationTable;
pub use envelope::{CallEnvelope, ControlEnvelope, InboundEnvelope, ResultEnvelope};
pub use error::GatewayError;
pub use events::{PeerEvent, PeerEvents};
pub use gateway::{Gateway, OutboundFrame, PeerLink, PEER_SLOT_OCCUPIED_CODE};
pub use methods::{MethodHandler, MethodRegistry};
pub use rpc::{JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
pub use server::{BoundAddrs, BridgeServer, SESSION_HEADER};
pub use session::{McpSession, SessionRegistry};
pub use tools::{ToolOutput, ToolRouter};
pub use wire_log::WireLog;

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
