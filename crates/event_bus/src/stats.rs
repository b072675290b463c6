/// Statistics tracking for event buses
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of a bus's counters for monitoring
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    /// Name of the bus
    pub name: String,
    /// Total number of events published on an open bus
    pub events_published: u64,
    /// Total number of per-subscriber deliveries
    pub deliveries: u64,
    /// Deliveries refused because a subscriber queue was full
    pub saturations: u64,
    /// Subscribers currently attached
    pub subscribers: usize,
}

#[derive(Debug, Default)]
pub(crate) struct BusCounters {
    published: AtomicU64,
    deliveries: AtomicU64,
    saturations: AtomicU64,
}

impl BusCounters {
    pub(crate) fn record(&self, delivered: usize, saturated: usize) {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
        self.saturations.fetch_add(saturated as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, name: &str, subscribers: usize) -> BusStats {
        BusStats {
            name: name.to_string(),
            events_published: self.published.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            saturations: self.saturations.load(Ordering::Relaxed),
            subscribers,
        }
    }
}
