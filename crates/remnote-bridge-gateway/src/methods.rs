//! MCP method registry and handlers.

use crate::error::GatewayError;
use crate::tools::ToolRouter;
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Trait for MCP method handlers.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Handle the method call.
    async fn call(&self, params: Option<serde_json::Value>) -> Result<serde_json::Value>;
}

/// Registry for MCP methods. Shared by every session.
pub struct MethodRegistry {
    /// Registered methods.
    methods: RwLock<HashMap<String, Arc<dyn MethodHandler>>>,
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MethodRegistry {
    /// Create an empty method registry.
    pub fn new() -> Self {
        Self {
            methods: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry serving `ping` and the tools of `router`.
    pub async fn with_tools(router: Arc<ToolRouter>) -> Self {
        let registry = Self::new();
        register_builtin(&registry, router).await;
        registry
    }

    /// Register a method handler.
    pub async fn register(&self, name: impl Into<String>, handler: Arc<dyn MethodHandler>) {
        let mut methods = self.methods.write().await;
        methods.insert(name.into(), handler);
    }

    /// Call a method.
    pub async fn call(
        &self,
        name: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let handler = {
            let methods = self.methods.read().await;
            methods
                .get(name)
                .cloned()
                .ok_or_else(|| GatewayError::MethodNotFound(name.to_string()))?
        };

        debug!(method = name, "Calling method");
        handler.call(params).await
    }
}

/// `ping`: liveness check for MCP clients.
pub struct PingHandler;

#[async_trait]
impl MethodHandler for PingHandler {
    async fn call(&self, _params: Option<serde_json::Value>) -> Result<serde_json::Value> {
        Ok(serde_json::json!({}))
    }
}

/// `tools/list`.
pub struct ToolsListHandler {
    router: Arc<ToolRouter>,
}

impl ToolsListHandler {
    pub fn new(router: Arc<ToolRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl MethodHandler for ToolsListHandler {
    async fn call(&self, _params: Option<serde_json::Value>) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "tools": self.router.definitions(),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<serde_json::Value>,
}

/// `tools/call`.
pub struct ToolsCallHandler {
    router: Arc<ToolRouter>,
}

impl ToolsCallHandler {
    pub fn new(router: Arc<ToolRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl MethodHandler for ToolsCallHandler {
    async fn call(&self, params: Option<serde_json::Value>) -> Result<serde_json::Value> {
        let params: ToolCallParams = params
            .ok_or_else(|| GatewayError::InvalidParams("missing tool name".to_string()))
            .and_then(|p| {
                serde_json::from_value(p).map_err(|e| GatewayError::InvalidParams(e.to_string()))
            })?;

        let output = self.router.call(&params.name, params.arguments).await;
        Ok(serde_json::to_value(output)?)
    }
}

/// Register built-in methods.
pub async fn register_builtin(registry: &MethodRegistry, router: Arc<ToolRouter>) {
    registry.register("ping", Arc::new(PingHandler)).await;
    registry
        .register("tools/list", Arc::new(ToolsListHandler::new(router.clone())))
        .await;
    registry
        .register("tools/call", Arc::new(ToolsCallHandler::new(router)))
        .await;
}
