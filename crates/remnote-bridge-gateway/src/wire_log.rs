//! JSON Lines logs of traffic exchanged with the plugin.
//!
//! Records are rendered on the caller's task and handed to a writer thread,
//! so appending never blocks the async call path on file I/O.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

enum Command {
    Line(String),
    Flush(oneshot::Sender<()>),
}

/// Append-only JSON Lines file. Each record gets a `timestamp` field.
pub struct WireLog {
    path: PathBuf,
    writer: mpsc::UnboundedSender<Command>,
}

impl WireLog {
    /// Open `path` for appending, creating it and its parent directory.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let (writer, commands) = mpsc::unbounded_channel();
        let thread_path = path.clone();
        std::thread::Builder::new()
            .name("wire-log".to_string())
            .spawn(move || write_loop(BufWriter::new(file), commands, &thread_path))?;

        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue one record. Failures are logged and swallowed.
    pub fn append<T: Serialize>(&self, record: &T) {
        let line = match Self::render(record) {
            Ok(line) => line,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to encode wire log record");
                return;
            }
        };

        if self.writer.send(Command::Line(line)).is_err() {
            warn!(path = %self.path.display(), "Wire log writer is gone; record dropped");
        }
    }

    /// Wait until every record queued so far has reached the file.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.writer.send(Command::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    fn render<T: Serialize>(record: &T) -> serde_json::Result<String> {
        let mut entry = Map::new();
        entry.insert(
            "timestamp".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
        match serde_json::to_value(record)? {
            Value::Object(fields) => entry.extend(fields),
            other => {
                entry.insert("record".to_string(), other);
            }
        }
        serde_json::to_string(&Value::Object(entry))
    }
}

/// Runs on the writer thread until every [`WireLog`] handle is dropped.
fn write_loop<W: Write>(
    mut out: BufWriter<W>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    path: &Path,
) {
    while let Some(command) = commands.blocking_recv() {
        let mut pending = Some(command);
        let mut acks = Vec::new();
        // Drain whatever is queued, then flush once.
        while let Some(command) = pending.take().or_else(|| commands.try_recv().ok()) {
            match command {
                Command::Line(line) => {
                    if let Err(e) = writeln!(out, "{}", line) {
                        warn!(path = %path.display(), error = %e, "Failed to write wire log");
                    }
                }
                Command::Flush(ack) => acks.push(ack),
            }
        }
        if let Err(e) = out.flush() {
            warn!(path = %path.display(), error = %e, "Failed to flush wire log");
        }
        for ack in acks {
            let _ = ack.send(());
        }
    }
}

impl std::fmt::Debug for WireLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireLog").field("path", &self.path).finish()
    }
}
