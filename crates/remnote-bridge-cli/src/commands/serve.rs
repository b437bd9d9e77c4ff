//! Serve command: run the bridge until interrupted.

use crate::logging;
use clap::Args;
use remnote_bridge_core::{env::vars, BridgeConfig, ConfigOverrides, LogLevel};
use remnote_bridge_gateway::BridgeServer;
use std::path::PathBuf;
use tracing::info;

/// Server arguments.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// WebSocket port for the RemNote plugin [default: 3002]
    #[arg(long, value_name = "PORT")]
    pub ws_port: Option<u16>,

    /// HTTP port for MCP clients [default: 3001]
    #[arg(long, value_name = "PORT")]
    pub http_port: Option<u16>,

    /// HTTP bind address for MCP clients [default: 127.0.0.1]
    #[arg(long, value_name = "HOST")]
    pub http_host: Option<String>,

    /// Console log level (debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Log file level; defaults to the console level
    #[arg(long, value_name = "LEVEL")]
    pub log_level_file: Option<LogLevel>,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Append every call sent to the plugin to this JSON Lines file
    #[arg(long, value_name = "PATH")]
    pub request_log: Option<PathBuf>,

    /// Append every response from the plugin to this JSON Lines file
    #[arg(long, value_name = "PATH")]
    pub response_log: Option<PathBuf>,

    /// Timeout for each call relayed to the plugin [default: 5000]
    #[arg(long, value_name = "MS")]
    pub request_timeout_ms: Option<u64>,

    /// JSON5 config file
    #[arg(short, long, env = vars::CONFIG, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl ServeArgs {
    /// Values given on the command line.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            ws_port: self.ws_port,
            http_port: self.http_port,
            http_host: self.http_host.clone(),
            request_timeout_ms: self.request_timeout_ms,
            log_level: self.log_level,
            log_level_file: self.log_level_file,
            verbose: self.verbose,
            log_file: self.log_file.clone(),
            request_log: self.request_log.clone(),
            response_log: self.response_log.clone(),
        }
    }

    /// Layer the command line and environment over the config file or defaults.
    pub fn resolve_config(&self) -> anyhow::Result<BridgeConfig> {
        let base = match &self.config {
            Some(path) => BridgeConfig::load(path)?,
            None => BridgeConfig::default(),
        };
        Ok(BridgeConfig::resolve(&self.overrides(), base)?)
    }
}

/// Run the bridge until ctrl-c or SIGTERM.
pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let config = args.resolve_config()?;
    logging::init(&config)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting RemNote bridge");
    let server = BridgeServer::new(config).await?;
    let addrs = server.start().await?;
    info!(
        ws = %addrs.ws,
        http = %addrs.http,
        "Bridge ready; waiting for the RemNote plugin"
    );

    shutdown_signal().await;
    info!("Shutting down");
    server.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
