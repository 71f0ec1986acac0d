//! In-process ledger signals
//!
//! Dependent views (the integrity display, dashboards) subscribe and refresh
//! when commits land. This is an internal pub/sub notification, not a network
//! contract. Broadcast is lossy on lag; signals are refresh hints, never
//! state transfer.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Buffered signals per subscriber before lag drops the oldest
const SIGNAL_CAPACITY: usize = 64;

/// Signal types emitted by a ledger session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum LedgerSignal {
    /// A successful commit changed some asset's allocation state; integrity
    /// views should recompute
    IntegrityChanged { asset_id: String },

    /// An atomic replace reached the backend
    DistributionsCommitted { asset_id: String, total: u32 },
}

/// Fan-out hub for ledger signals
#[derive(Debug, Clone)]
pub struct SignalHub {
    tx: broadcast::Sender<LedgerSignal>,
}

impl SignalHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerSignal> {
        self.tx.subscribe()
    }

    /// Emit a signal. Having no subscribers is not an error.
    pub fn emit(&self, signal: LedgerSignal) {
        let _ = self.tx.send(signal);
    }
}

impl Default for SignalHub {
    fn default() -> Self {
        Self::new()
    }
}
