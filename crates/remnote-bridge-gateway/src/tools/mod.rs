//! RemNote tools exposed to MCP clients.
//!
//! Each tool validates its arguments and relays them to the plugin as one
//! gateway call. Failures never surface as JSON-RPC errors; they are
//! reported inside the tool result with `isError` set.

mod schemas;

pub use schemas::*;

use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::Result;
use remnote_bridge_core::check_version_compatibility;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

/// One block of tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

/// Result of `tools/call`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    pub content: Vec<ToolContent>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolOutput {
    /// Successful output rendering `value` as pretty JSON.
    pub fn json(value: &Value) -> Self {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self {
            content: vec![ToolContent::Text { text }],
            is_error: false,
        }
    }

    /// Failed output.
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: format!("Error: {}", message),
            }],
            is_error: true,
        }
    }

    /// Text of the first content block.
    pub fn text(&self) -> &str {
        match self.content.first() {
            Some(ToolContent::Text { text }) => text,
            None => "",
        }
    }
}

/// Routes tool calls to the plugin.
pub struct ToolRouter {
    gateway: Arc<Gateway>,
}

impl ToolRouter {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        catalogue()
    }

    /// Run tool `name`. Errors are folded into the output.
    pub async fn call(&self, name: &str, arguments: Option<Value>) -> ToolOutput {
        debug!(tool = name, "Tool call");
        match self.dispatch(name, arguments).await {
            Ok(value) => ToolOutput::json(&value),
            Err(e) => {
                debug!(tool = name, error = %e, "Tool call failed");
                ToolOutput::error(e)
            }
        }
    }

    async fn dispatch(&self, name: &str, arguments: Option<Value>) -> Result<Value> {
        match name {
            CREATE_NOTE => self.relay::<CreateNoteArgs>("create_note", arguments).await,
            SEARCH => self.relay::<SearchArgs>("search", arguments).await,
            READ_NOTE => self.relay::<ReadNoteArgs>("read_note", arguments).await,
            UPDATE_NOTE => self.relay::<UpdateNoteArgs>("update_note", arguments).await,
            APPEND_JOURNAL => {
                self.relay::<AppendJournalArgs>("append_journal", arguments)
                    .await
            }
            STATUS => self.status().await,
            other => Err(GatewayError::InvalidParams(format!("Unknown tool: {}", other))),
        }
    }

    async fn relay<T: ToolArgs>(&self, action: &str, arguments: Option<Value>) -> Result<Value> {
        let payload = normalize::<T>(arguments).map_err(GatewayError::InvalidParams)?;
        self.gateway.call(action, payload).await
    }

    async fn status(&self) -> Result<Value> {
        let server_version = self.gateway.server_version().to_string();
        if !self.gateway.is_connected() {
            return Ok(json!({
                "connected": false,
                "serverVersion": server_version,
                "message": "RemNote plugin not connected",
            }));
        }

        let result = self.gateway.call("get_status", json!({})).await?;

        let mut status = Map::new();
        status.insert("connected".to_string(), Value::Bool(true));
        status.insert(
            "serverVersion".to_string(),
            Value::String(server_version.clone()),
        );
        if let Value::Object(fields) = &result {
            status.extend(fields.clone());
        }

        let plugin_version = self.gateway.peer_version().or_else(|| {
            result
                .get("pluginVersion")
                .and_then(Value::as_str)
                .map(str::to_string)
        });
        if let Some(version) = plugin_version {
            if let Some(warning) = check_version_compatibility(&server_version, &version) {
                status.insert("version_warning".to_string(), Value::String(warning));
            }
        }

        Ok(Value::Object(status))
    }
}
