//! Tracing subscriber setup.

use remnote_bridge_core::{BridgeConfig, LogLevel};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter directive for `level`, keeping transport crates quiet.
pub fn directive(level: LogLevel) -> String {
    format!("{},hyper=warn,tungstenite=warn", level)
}

/// Console logging only, at `level`.
pub fn init_console(level: LogLevel) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(console_layer(level))
        .try_init()?;
    Ok(())
}

/// Console logging plus the optional log file from `config`.
pub fn init(config: &BridgeConfig) -> anyhow::Result<()> {
    let file_layer = match (&config.log_file, config.log_level_file) {
        (Some(path), Some(level)) => Some(file_layer(path, level)?),
        _ => None,
    };

    tracing_subscriber::registry()
        .with(console_layer(config.log_level))
        .with(file_layer)
        .try_init()?;
    Ok(())
}

/// JSON lines at `level`, appended to `path`.
fn file_layer<S>(path: &Path, level: LogLevel) -> anyhow::Result<impl Layer<S>>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .with_filter(EnvFilter::new(directive(level))))
}

fn console_layer<S>(level: LogLevel) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    // RUST_LOG wins when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive(level)));
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter)
}
