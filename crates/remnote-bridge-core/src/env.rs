//! Environment variable handling.

use std::env;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Environment variable names read by the bridge.
pub mod vars {
    /// WebSocket port for the plugin connection.
    pub const WS_PORT: &str = "REMNOTE_WS_PORT";

    /// HTTP port for MCP clients.
    pub const HTTP_PORT: &str = "REMNOTE_HTTP_PORT";

    /// HTTP bind address for MCP clients.
    pub const HTTP_HOST: &str = "REMNOTE_HTTP_HOST";

    /// Per-call timeout in milliseconds.
    pub const REQUEST_TIMEOUT_MS: &str = "REMNOTE_REQUEST_TIMEOUT_MS";

    /// Console log level.
    pub const LOG_LEVEL: &str = "REMNOTE_LOG_LEVEL";

    /// Config file override.
    pub const CONFIG: &str = "REMNOTE_BRIDGE_CONFIG";
}
