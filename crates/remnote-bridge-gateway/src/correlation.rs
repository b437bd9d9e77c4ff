//! Pending-call bookkeeping for the plugin connection.

use crate::error::GatewayError;
use crate::Result;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

/// Sink that completes a pending call. Can be written exactly once.
pub type Completion = oneshot::Sender<Result<Value>>;

/// A call awaiting its response.
#[derive(Debug)]
pub struct PendingCall {
    /// Action the call invoked.
    pub action: String,

    /// Absolute time after which the call fails with a timeout.
    pub deadline: Instant,

    completion: Completion,
}

impl PendingCall {
    /// Deliver the outcome. A caller that already went away is ignored.
    fn complete(self, outcome: Result<Value>) {
        let _ = self.completion.send(outcome);
    }
}

/// Map from call id to in-flight call.
///
/// Every entry leaves the table exactly once: through [`resolve`](Self::resolve),
/// [`remove`](Self::remove), or [`fail_all`](Self::fail_all).
#[derive(Debug, Default)]
pub struct CorrelationTable {
    calls: Mutex<HashMap<String, PendingCall>>,
}

impl CorrelationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call and return the receiving half of its completion.
    pub fn insert(
        &self,
        id: impl Into<String>,
        action: impl Into<String>,
        deadline: Instant,
    ) -> Result<oneshot::Receiver<Result<Value>>> {
        let id = id.into();
        let mut calls = self.calls.lock();
        if calls.contains_key(&id) {
            return Err(GatewayError::Internal(format!(
                "Duplicate call id: {}",
                id
            )));
        }

        let (completion, receiver) = oneshot::channel();
        calls.insert(
            id,
            PendingCall {
                action: action.into(),
                deadline,
                completion,
            },
        );
        Ok(receiver)
    }

    /// Complete the call with `id`. Returns `false` when no such call is pending.
    pub fn resolve(&self, id: &str, outcome: Result<Value>) -> bool {
        let call = self.calls.lock().remove(id);
        match call {
            Some(call) => {
                debug!(call_id = %id, action = %call.action, "Call resolved");
                call.complete(outcome);
                true
            }
            None => false,
        }
    }

    /// Remove a call without completing it.
    pub fn remove(&self, id: &str) -> Option<PendingCall> {
        self.calls.lock().remove(id)
    }

    /// Fail every pending call and empty the table in one sweep.
    pub fn fail_all(&self, error: impl Fn() -> GatewayError) -> usize {
        let drained: Vec<(String, PendingCall)> = self.calls.lock().drain().collect();
        let count = drained.len();
        let now = Instant::now();
        for (id, call) in drained {
            debug!(
                call_id = %id,
                action = %call.action,
                remaining_ms = call.deadline.saturating_duration_since(now).as_millis() as u64,
                "Failing pending call"
            );
            call.complete(Err(error()));
        }
        count
    }

    /// Whether a call with `id` is pending.
    pub fn contains(&self, id: &str) -> bool {
        self.calls.lock().contains_key(id)
    }

    /// Number of pending calls.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Whether no call is pending.
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}
