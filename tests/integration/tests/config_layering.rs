//! Config file loading and layering integration tests.

use remnote_bridge_core::{BridgeConfig, ConfigError, ConfigOverrides, LogLevel};
use std::collections::HashMap;
use tempfile::TempDir;

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn test_file_then_env_then_cli() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bridge.json5");
    std::fs::write(
        &path,
        r#"{
            // comments are allowed
            wsPort: 5002,
            httpPort: 5001,
            logLevel: "warn",
            requestTimeoutMs: 1500,
        }"#,
    )
    .unwrap();

    let base = BridgeConfig::load(&path).unwrap();
    assert_eq!(base.ws_port, 5002);
    assert_eq!(base.log_level, LogLevel::Warn);

    let env: HashMap<&str, &str> = [("REMNOTE_HTTP_PORT", "6001"), ("REMNOTE_LOG_LEVEL", "ERROR")]
        .into_iter()
        .collect();
    let overrides = ConfigOverrides {
        http_port: Some(7001),
        ..Default::default()
    };

    let config =
        BridgeConfig::resolve_with(&overrides, base, |name| env.get(name).map(|v| v.to_string()))
            .unwrap();

    assert_eq!(config.ws_port, 5002);
    assert_eq!(config.http_port, 7001);
    assert_eq!(config.log_level, LogLevel::Error);
    assert_eq!(config.request_timeout_ms, 1500);
}

#[test]
fn test_ws_host_in_file_is_ignored() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bridge.json5");
    std::fs::write(&path, r#"{ wsHost: "0.0.0.0" }"#).unwrap();

    let config = BridgeConfig::load(&path).unwrap();
    assert_eq!(config.ws_host, "127.0.0.1");
}

#[test]
fn test_log_file_level_follows_console() {
    let dir = TempDir::new().unwrap();
    let overrides = ConfigOverrides {
        verbose: true,
        log_file: Some(dir.path().join("bridge.log")),
        ..Default::default()
    };

    let config = BridgeConfig::resolve_with(&overrides, BridgeConfig::default(), no_env).unwrap();
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.log_level_file, Some(LogLevel::Debug));
}

#[test]
fn test_every_problem_reported() {
    let overrides = ConfigOverrides {
        ws_port: Some(4000),
        http_port: Some(4000),
        http_host: Some("not a host".to_string()),
        request_timeout_ms: Some(0),
        ..Default::default()
    };

    match BridgeConfig::resolve_with(&overrides, BridgeConfig::default(), no_env) {
        Err(ConfigError::Validation(problems)) => assert!(problems.len() >= 3, "{:?}", problems),
        other => panic!("Expected validation error, got {:?}", other),
    }
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = BridgeConfig::load(&dir.path().join("absent.json5"));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}
