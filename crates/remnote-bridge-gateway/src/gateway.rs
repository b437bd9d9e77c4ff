//! Single-plugin WebSocket bridge.
//!
//! The gateway owns at most one plugin connection. Calls are multiplexed over
//! it by correlation id and each one completes exactly once: with the
//! plugin's answer, with a timeout at its deadline, or with
//! [`GatewayError::ConnectionLost`] when the plugin goes away.

use crate::correlation::CorrelationTable;
use crate::envelope::{CallEnvelope, ControlEnvelope, InboundEnvelope, ResultEnvelope};
use crate::error::GatewayError;
use crate::events::{PeerEvent, PeerEvents};
use crate::wire_log::WireLog;
use crate::Result;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use remnote_bridge_core::{check_version_compatibility, BridgeConfig};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Close code sent to a plugin that connects while the slot is taken.
pub const PEER_SLOT_OCCUPIED_CODE: u16 = 1008;

/// Close code sent to the plugin when the bridge stops.
pub const GOING_AWAY_CODE: u16 = 1001;

/// Frame queued for the plugin socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close { code: u16, reason: String },
}

/// Receiving end of an attached plugin connection.
#[derive(Debug)]
pub struct PeerLink {
    /// Identifies this connection in [`Gateway::detach`].
    pub conn_id: u64,

    /// Frames to write to the socket, in order.
    pub outbound: mpsc::UnboundedReceiver<OutboundFrame>,
}

struct PeerSlot {
    conn_id: u64,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
}

/// Removes a call's pending entry if its future is dropped early.
struct PendingGuard<'a> {
    table: &'a CorrelationTable,
    id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.table.remove(self.id).is_some() {
            debug!(call_id = %self.id, "Call abandoned by caller");
        }
    }
}

/// The single-plugin bridge.
pub struct Gateway {
    request_timeout: Duration,
    server_version: String,
    peer: Mutex<Option<PeerSlot>>,
    peer_version: RwLock<Option<String>>,
    pending: CorrelationTable,
    events: PeerEvents,
    next_conn_id: AtomicU64,
    request_log: Option<WireLog>,
    response_log: Option<WireLog>,
}

impl Gateway {
    /// Create a gateway with the given per-call timeout.
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            peer: Mutex::new(None),
            peer_version: RwLock::new(None),
            pending: CorrelationTable::new(),
            events: PeerEvents::new(),
            next_conn_id: AtomicU64::new(1),
            request_log: None,
            response_log: None,
        }
    }

    /// Create a gateway from configuration, opening any wire logs.
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        let mut gateway = Self::new(config.request_timeout());
        if let Some(path) = &config.request_log {
            gateway = gateway.with_request_log(WireLog::open(path)?);
        }
        if let Some(path) = &config.response_log {
            gateway = gateway.with_response_log(WireLog::open(path)?);
        }
        Ok(gateway)
    }

    /// Log every outbound call to `log`.
    pub fn with_request_log(mut self, log: WireLog) -> Self {
        self.request_log = Some(log);
        self
    }

    /// Log every inbound response to `log`.
    pub fn with_response_log(mut self, log: WireLog) -> Self {
        self.response_log = Some(log);
        self
    }

    /// Override the version reported to and compared against the plugin.
    pub fn with_server_version(mut self, version: impl Into<String>) -> Self {
        self.server_version = version.into();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Version announced by the connected plugin, if any.
    pub fn peer_version(&self) -> Option<String> {
        self.peer_version.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.peer.lock().is_some()
    }

    /// Number of calls awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Run `listener` every time a plugin connects.
    pub fn on_connect(&self, listener: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static) {
        self.events.on_connect(listener);
    }

    /// Run `listener` every time the plugin disconnects.
    pub fn on_disconnect(
        &self,
        listener: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    ) {
        self.events.on_disconnect(listener);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PeerEvent> {
        self.events.subscribe()
    }

    /// Claim the plugin slot for a new connection.
    pub fn attach(&self) -> Result<PeerLink> {
        let (conn_id, outbound) = {
            let mut peer = self.peer.lock();
            if peer.is_some() {
                warn!("Rejecting plugin connection: slot already taken");
                return Err(GatewayError::PeerSlotOccupied);
            }

            let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = mpsc::unbounded_channel();
            *peer = Some(PeerSlot {
                conn_id,
                outbound: tx,
            });
            (conn_id, rx)
        };

        info!(conn_id, "RemNote plugin connected");
        self.events.emit(PeerEvent::Connected);
        Ok(PeerLink { conn_id, outbound })
    }

    /// Release the slot held by `conn_id` and fail every pending call.
    ///
    /// Returns `false` when `conn_id` no longer holds the slot.
    pub fn detach(&self, conn_id: u64) -> bool {
        let failed = {
            let mut peer = self.peer.lock();
            match peer.as_ref() {
                Some(slot) if slot.conn_id == conn_id => {}
                _ => return false,
            }
            *peer = None;
            // Swept under the slot lock so no call can slip in between.
            self.pending.fail_all(|| GatewayError::ConnectionLost)
        };

        *self.peer_version.write() = None;
        info!(conn_id, failed_calls = failed, "RemNote plugin disconnected");
        self.events.emit(PeerEvent::Disconnected);
        true
    }

    /// Close the plugin connection, if any. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let conn_id = {
            let peer = self.peer.lock();
            match peer.as_ref() {
                Some(slot) => {
                    let _ = slot.outbound.send(OutboundFrame::Close {
                        code: GOING_AWAY_CODE,
                        reason: "Server shutting down".to_string(),
                    });
                    slot.conn_id
                }
                None => return,
            }
        };
        self.detach(conn_id);
    }

    /// Wait for queued wire log records to reach disk.
    pub async fn flush_wire_logs(&self) {
        for log in [&self.request_log, &self.response_log].into_iter().flatten() {
            log.flush().await;
        }
    }

    /// Dispatch one text frame received from the plugin.
    pub fn handle_frame(&self, text: &str) {
        let frame = match InboundEnvelope::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame from plugin");
                return;
            }
        };

        match frame {
            InboundEnvelope::Control(ControlEnvelope::Ping) => {
                self.send_control(&ControlEnvelope::Pong);
            }
            InboundEnvelope::Control(ControlEnvelope::Pong) => {
                trace!("Pong from plugin");
            }
            InboundEnvelope::Control(ControlEnvelope::Hello { version }) => {
                self.record_peer_version(version);
            }
            InboundEnvelope::Response(response) => self.complete(response),
        }
    }

    /// Send `action` to the plugin and wait for its answer.
    pub async fn call(&self, action: &str, payload: Value) -> Result<Value> {
        let envelope = CallEnvelope::new(action, payload);
        let text = serde_json::to_string(&envelope)?;
        let deadline = Instant::now() + self.request_timeout;

        let mut completion = {
            let peer = self.peer.lock();
            let slot = peer.as_ref().ok_or(GatewayError::NotConnected)?;
            let completion = self.pending.insert(envelope.id.as_str(), action, deadline)?;
            if slot.outbound.send(OutboundFrame::Text(text)).is_err() {
                self.pending.remove(&envelope.id);
                return Err(GatewayError::Transport(
                    "plugin connection is closing".to_string(),
                ));
            }
            completion
        };

        debug!(call_id = %envelope.id, action, "Call sent to plugin");
        if let Some(log) = &self.request_log {
            log.append(&envelope);
        }

        let _guard = PendingGuard {
            table: &self.pending,
            id: &envelope.id,
        };

        match tokio::time::timeout_at(deadline, &mut completion).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(GatewayError::ConnectionLost),
            Err(_) => {
                if self.pending.remove(&envelope.id).is_some() {
                    warn!(call_id = %envelope.id, action, "Call timed out");
                    return Err(GatewayError::Timeout {
                        action: action.to_string(),
                    });
                }
                // Lost the race to a resolver that already owns the entry.
                completion.await.unwrap_or(Err(GatewayError::ConnectionLost))
            }
        }
    }

    fn complete(&self, response: ResultEnvelope) {
        if let Some(log) = &self.response_log {
            log.append(&response);
        }

        let id = response.id.clone();
        if !self.pending.resolve(&id, response.into_outcome()) {
            warn!(call_id = %id, "Response for unknown call id");
        }
    }

    fn send_control(&self, frame: &ControlEnvelope) {
        let text = match serde_json::to_string(frame) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to encode control frame");
                return;
            }
        };
        if let Some(slot) = self.peer.lock().as_ref() {
            let _ = slot.outbound.send(OutboundFrame::Text(text));
        }
    }

    fn record_peer_version(&self, version: String) {
        info!(plugin_version = %version, "Plugin announced version");
        if let Some(warning) = check_version_compatibility(&self.server_version, &version) {
            warn!("{}", warning);
        }
        *self.peer_version.write() = Some(version);
    }
}

/// Drive a plugin WebSocket until it closes.
pub async fn serve_peer(gateway: Arc<Gateway>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();

    let mut link = match gateway.attach() {
        Ok(link) => link,
        Err(e) => {
            let _ = sink
                .send(Message::Close(Some(CloseFrame {
                    code: PEER_SLOT_OCCUPIED_CODE,
                    reason: e.to_string().into(),
                })))
                .await;
            return;
        }
    };
    let conn_id = link.conn_id;

    loop {
        tokio::select! {
            frame = link.outbound.recv() => match frame {
                Some(OutboundFrame::Text(text)) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        warn!(conn_id, error = %e, "Failed to write to plugin");
                        break;
                    }
                }
                Some(OutboundFrame::Close { code, reason }) => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
                None => break,
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => gateway.handle_frame(&text),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => gateway.handle_frame(text),
                    Err(_) => warn!(conn_id, "Dropping non-UTF-8 frame from plugin"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(conn_id, error = %e, "Plugin socket error");
                    break;
                }
            },
        }
    }

    gateway.detach(conn_id);
}
