//! Status check: ask a running bridge for `remnote_status` over MCP.

use crate::logging;
use anyhow::{bail, Context};
use clap::Args;
use console::style;
use remnote_bridge_core::LogLevel;
use remnote_bridge_gateway::{JsonRpcRequest, JsonRpcResponse, ToolOutput, SESSION_HEADER};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Status check arguments.
#[derive(Args, Debug)]
pub struct StatusCheckArgs {
    /// MCP endpoint of the bridge
    #[arg(long, env = "MCP_URL", default_value = "http://127.0.0.1:3001/mcp")]
    pub url: String,

    /// HTTP timeout in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub timeout_ms: u64,
}

/// Minimal MCP Streamable HTTP client.
pub struct McpClient {
    http: reqwest::Client,
    url: String,
    session_id: Option<String>,
    next_id: u64,
}

impl McpClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
            session_id: None,
            next_id: 1,
        })
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Open a session and acknowledge it.
    pub async fn initialize(&mut self) -> anyhow::Result<Value> {
        let params = json!({
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": {"name": "remnote-bridge-status-check", "version": env!("CARGO_PKG_VERSION")},
        });
        let result = self.request("initialize", Some(params)).await?;
        if self.session_id.is_none() {
            bail!("Server did not return an {} header", SESSION_HEADER);
        }
        self.notify("notifications/initialized").await?;
        Ok(result)
    }

    /// Call a tool and return its output.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> anyhow::Result<ToolOutput> {
        let result = self
            .request("tools/call", Some(json!({"name": name, "arguments": arguments})))
            .await?;
        serde_json::from_value(result).context("Malformed tool result")
    }

    /// Terminate the session, if one is open.
    pub async fn close(&mut self) -> anyhow::Result<()> {
        let Some(session_id) = self.session_id.take() else {
            return Ok(());
        };
        let response = self
            .http
            .delete(&self.url)
            .header(SESSION_HEADER, &session_id)
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("Session termination failed: HTTP {}", response.status());
        }
        Ok(())
    }

    async fn request(&mut self, method: &str, params: Option<Value>) -> anyhow::Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let request = JsonRpcRequest::call(id, method, params);

        let response = self.post(&request).send().await?;
        if let Some(session_id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.session_id = Some(session_id.to_string());
        }

        let status = response.status();
        let body: JsonRpcResponse = response
            .json()
            .await
            .with_context(|| format!("Unexpected response to {} (HTTP {})", method, status))?;

        if let Some(error) = body.error {
            bail!("{} failed ({}): {}", method, error.code, error.message);
        }
        Ok(body.result.unwrap_or(Value::Null))
    }

    async fn notify(&mut self, method: &str) -> anyhow::Result<()> {
        let request = JsonRpcRequest::notification(method, None);
        let response = self.post(&request).send().await?;
        if !response.status().is_success() {
            bail!("{} rejected: HTTP {}", method, response.status());
        }
        Ok(())
    }

    fn post(&self, request: &JsonRpcRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .post(&self.url)
            .header(reqwest::header::ACCEPT, "application/json, text/event-stream")
            .json(request);
        if let Some(session_id) = &self.session_id {
            builder = builder.header(SESSION_HEADER, session_id);
        }
        builder
    }
}

/// Run the status check.
pub async fn run(args: StatusCheckArgs) -> anyhow::Result<()> {
    logging::init_console(LogLevel::Warn)?;

    let mut client = McpClient::new(&args.url, Duration::from_millis(args.timeout_ms))?;
    client
        .initialize()
        .await
        .with_context(|| format!("Cannot reach MCP endpoint {}", args.url))?;

    let output = client.call_tool("remnote_status", json!({})).await;
    if let Err(e) = client.close().await {
        debug!(error = %e, "Failed to close status-check session");
    }
    let output = output?;

    println!("{}", output.text());
    if output.is_error {
        eprintln!("{} remnote_status reported an error", style("✗").red());
        bail!("Status check failed");
    }
    eprintln!("{} Bridge reachable at {}", style("✓").green(), args.url);
    Ok(())
}
