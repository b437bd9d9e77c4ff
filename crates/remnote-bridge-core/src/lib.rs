//! # remnote-bridge-core
//!
//! Shared functionality for the RemNote bridge crates:
//!
//! - **Configuration**: defaults, environment overrides, config files, and validation
//! - **Errors**: configuration error types
//! - **Versions**: server/plugin version compatibility checks

pub mod config;
pub mod env;
pub mod error;
pub mod version;

// Re-exports for convenience
pub use config::{BridgeConfig, ConfigOverrides, LogLevel};
pub use error::{ConfigError, Result};
pub use version::check_version_compatibility;
