//! Connection statistics snapshots

use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde::Serialize;

/// Monotonic counter snapshot for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub messages_in: u64,
    pub bytes_in: u64,
    pub messages_out: u64,
    pub bytes_out: u64,
    pub reconnects: u64,
}

/// Handle to the wrapped client's live counters.
///
/// The counters advance as long as the underlying connection exists, even
/// after the [`Connection`](crate::Connection) owner that produced this
/// handle was consumed; [`snapshot`](Statistics::snapshot) reads a coherent
/// point-in-time view.
#[derive(Debug, Clone)]
pub struct Statistics {
    inner: Arc<async_nats::Statistics>,
}

impl Statistics {
    pub(crate) fn new(inner: Arc<async_nats::Statistics>) -> Self {
        Self { inner }
    }

    /// Read the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_in: self.inner.in_messages.load(Ordering::Relaxed),
            bytes_in: self.inner.in_bytes.load(Ordering::Relaxed),
            messages_out: self.inner.out_messages.load(Ordering::Relaxed),
            bytes_out: self.inner.out_bytes.load(Ordering::Relaxed),
            reconnects: reconnects_from_connects(self.inner.connects.load(Ordering::Relaxed)),
        }
    }
}

/// The client counts every established connection; the first one is not a
/// reconnect.
fn reconnects_from_connects(connects: u64) -> u64 {
    connects.saturating_sub(1)
}
