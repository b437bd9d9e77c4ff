//! Peer connection events.
//!
//! Listeners registered with [`PeerEvents::on_connect`] and
//! [`PeerEvents::on_disconnect`] run synchronously in registration order.
//! A listener that returns an error is logged and the rest still run.
//! Async consumers can [`subscribe`](PeerEvents::subscribe) to a broadcast
//! channel instead.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Peer state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEvent {
    Connected,
    Disconnected,
}

impl PeerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

type Listener = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

const EVENT_CAPACITY: usize = 16;

/// Fan-out of peer events to listeners and subscribers.
pub struct PeerEvents {
    sender: broadcast::Sender<PeerEvent>,
    on_connect: RwLock<Vec<Listener>>,
    on_disconnect: RwLock<Vec<Listener>>,
}

impl Default for PeerEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sender,
            on_connect: RwLock::new(Vec::new()),
            on_disconnect: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener for peer connections.
    pub fn on_connect(&self, listener: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static) {
        self.on_connect.write().push(Arc::new(listener));
    }

    /// Register a listener for peer disconnections.
    pub fn on_disconnect(
        &self,
        listener: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    ) {
        self.on_disconnect.write().push(Arc::new(listener));
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PeerEvent> {
        self.sender.subscribe()
    }

    /// Run the listeners for `event`, then broadcast it.
    pub fn emit(&self, event: PeerEvent) {
        let listeners: Vec<Listener> = match event {
            PeerEvent::Connected => self.on_connect.read().clone(),
            PeerEvent::Disconnected => self.on_disconnect.read().clone(),
        };

        for (index, listener) in listeners.iter().enumerate() {
            if let Err(e) = listener() {
                warn!(
                    event = event.as_str(),
                    listener = index,
                    error = %e,
                    "Peer event listener failed"
                );
            }
        }

        // No subscribers is fine.
        let _ = self.sender.send(event);
    }
}
