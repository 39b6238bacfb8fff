//! Transfer event payloads and the sink that delivers them

use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Progress and speed reports for a running download
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferEvent {
    Progress { percent: f64 },
    Speed { bytes_per_second: f64 },
    /// The primary chunked path failed and the proxy stream took over.
    ///
    /// Progress restarts after this event: the proxy stream reports its own
    /// percentages from zero, so the next value may be lower than the last
    /// one seen on the chunked path.
    FallbackStarted { reason: String },
}

/// Cloneable event sender that can be closed exactly once.
///
/// Closing drops the sender under the same lock `emit` takes, so once
/// [`EventSink::close`] returns no further event reaches the receiver.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<TransferEvent>>>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransferEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            sender: Arc::new(Mutex::new(Some(tx))),
        };
        (sink, rx)
    }

    /// A sink that drops every event
    pub fn discard() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: TransferEvent) {
        let guard = match self.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(event);
        }
    }

    pub fn close(&self) {
        let mut guard = match self.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take();
    }

    pub fn is_closed(&self) -> bool {
        match self.sender.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}
