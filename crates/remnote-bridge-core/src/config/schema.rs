//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default WebSocket port for the plugin connection.
pub const DEFAULT_WS_PORT: u16 = 3002;

/// Default HTTP port for MCP clients.
pub const DEFAULT_HTTP_PORT: u16 = 3001;

/// Loopback address. The plugin socket is never exposed beyond it.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Default per-call timeout.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Main bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    /// WebSocket port the plugin connects to.
    pub ws_port: u16,

    /// WebSocket bind address. Always loopback.
    #[serde(skip_deserializing)]
    pub ws_host: String,

    /// HTTP port MCP clients connect to.
    pub http_port: u16,

    /// HTTP bind address.
    pub http_host: String,

    /// Timeout applied to every relayed call, in milliseconds.
    pub request_timeout_ms: u64,

    /// Console log level.
    pub log_level: LogLevel,

    /// File log level (only meaningful with `log_file`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level_file: Option<LogLevel>,

    /// Log file path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// JSON Lines log of every call sent to the plugin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_log: Option<PathBuf>,

    /// JSON Lines log of every response received from the plugin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_log: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ws_port: DEFAULT_WS_PORT,
            ws_host: LOOPBACK_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            http_host: LOOPBACK_HOST.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            log_level: LogLevel::default(),
            log_level_file: None,
            log_file: None,
            request_log: None,
            response_log: None,
        }
    }
}

impl BridgeConfig {
    /// Per-call timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// `host:port` for the plugin WebSocket listener.
    pub fn ws_bind_address(&self) -> String {
        format!("{}:{}", self.ws_host, self.ws_port)
    }

    /// `host:port` for the MCP HTTP listener.
    pub fn http_bind_address(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

/// Log verbosity accepted on the command line and in config files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// All accepted level names.
    pub const NAMES: [&'static str; 4] = ["debug", "info", "warn", "error"];

    /// Lowercase name, usable as a tracing filter directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!(
                "Invalid log level: {}. Valid levels: {}",
                s,
                Self::NAMES.join(", ")
            )),
        }
    }
}

/// Values supplied on the command line. `None` means "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub ws_port: Option<u16>,
    pub http_port: Option<u16>,
    pub http_host: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub log_level: Option<LogLevel>,
    pub log_level_file: Option<LogLevel>,
    pub verbose: bool,
    pub log_file: Option<PathBuf>,
    pub request_log: Option<PathBuf>,
    pub response_log: Option<PathBuf>,
}
