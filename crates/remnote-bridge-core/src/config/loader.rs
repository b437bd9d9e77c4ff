//! Configuration loading, layering, and validation.
//!
//! Precedence, highest first: command line, environment, config file, defaults.

use super::{BridgeConfig, ConfigOverrides, LogLevel, LOOPBACK_HOST};
use crate::env::{self, vars};
use crate::error::ConfigError;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::debug;

impl BridgeConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))?;
        config.ws_host = LOOPBACK_HOST.to_string();
        Ok(config)
    }

    /// Merge command-line overrides and the process environment over `base`.
    pub fn resolve(overrides: &ConfigOverrides, base: Self) -> Result<Self, ConfigError> {
        Self::resolve_with(overrides, base, env::get_var)
    }

    /// Like [`resolve`](Self::resolve) with an explicit environment lookup.
    pub fn resolve_with<F>(
        overrides: &ConfigOverrides,
        base: Self,
        lookup: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = base;
        let mut errors = Vec::new();

        // Environment layer
        if let Some(port) = env_number::<u16>(&lookup, vars::WS_PORT, "WebSocket port", &mut errors) {
            config.ws_port = port;
        }
        if let Some(port) = env_number::<u16>(&lookup, vars::HTTP_PORT, "HTTP port", &mut errors) {
            config.http_port = port;
        }
        if let Some(host) = lookup(vars::HTTP_HOST) {
            config.http_host = host;
        }
        if let Some(ms) =
            env_number::<u64>(&lookup, vars::REQUEST_TIMEOUT_MS, "request timeout", &mut errors)
        {
            config.request_timeout_ms = ms;
        }
        if let Some(raw) = lookup(vars::LOG_LEVEL) {
            match raw.parse::<LogLevel>() {
                Ok(level) => config.log_level = level,
                Err(e) => errors.push(e),
            }
        }

        // Command-line layer
        if let Some(port) = overrides.ws_port {
            config.ws_port = port;
        }
        if let Some(port) = overrides.http_port {
            config.http_port = port;
        }
        if let Some(host) = &overrides.http_host {
            config.http_host = host.clone();
        }
        if let Some(ms) = overrides.request_timeout_ms {
            config.request_timeout_ms = ms;
        }
        if let Some(level) = overrides.log_level {
            config.log_level = level;
        }
        if overrides.verbose {
            config.log_level = LogLevel::Debug;
        }
        if let Some(level) = overrides.log_level_file {
            config.log_level_file = Some(level);
        }
        if overrides.log_file.is_some() {
            config.log_file = overrides.log_file.clone();
        }
        if overrides.request_log.is_some() {
            config.request_log = overrides.request_log.clone();
        }
        if overrides.response_log.is_some() {
            config.response_log = overrides.response_log.clone();
        }

        // The plugin socket is loopback-only no matter what was configured.
        config.ws_host = LOOPBACK_HOST.to_string();

        if config.log_file.is_some() && config.log_level_file.is_none() {
            config.log_level_file = Some(config.log_level);
        }
        if config.log_file.is_none() {
            config.log_level_file = None;
        }

        errors.extend(config.problems());
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        debug!(
            ws_port = config.ws_port,
            http_port = config.http_port,
            http_host = %config.http_host,
            "Configuration resolved"
        );
        Ok(config)
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let errors = self.problems();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn problems(&self) -> Vec<String> {
        let mut errors = Vec::new();

        // 1. Port ranges
        if self.ws_port == 0 {
            errors.push("Invalid WebSocket port: 0. Must be between 1 and 65535.".to_string());
        }
        if self.http_port == 0 {
            errors.push("Invalid HTTP port: 0. Must be between 1 and 65535.".to_string());
        }

        // 2. Port conflict
        if self.ws_port == self.http_port {
            errors.push(format!(
                "WebSocket port and HTTP port cannot be the same (both set to {})",
                self.ws_port
            ));
        }

        // 3. HTTP host
        if let Err(e) = validate_host(&self.http_host) {
            errors.push(e);
        }

        // 4. Timeout
        if self.request_timeout_ms == 0 {
            errors.push("Request timeout must be greater than 0 ms".to_string());
        }

        errors
    }
}

/// Validate an HTTP bind host: `localhost` or a dotted IPv4 address.
pub fn validate_host(host: &str) -> Result<(), String> {
    if host == "localhost" || host.parse::<Ipv4Addr>().is_ok() {
        return Ok(());
    }
    Err(format!(
        "Invalid host: {}. Must be localhost, 127.0.0.1, 0.0.0.0, or a valid IPv4 address",
        host
    ))
}

fn env_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    label: &str,
    errors: &mut Vec<String>,
) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            errors.push(format!("Invalid {} in {}: {}", label, name, raw));
            None
        }
    }
}
