//! Pipeline counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free per-outcome counters, shared by every event task.
#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    skipped: AtomicU64,
    rejected: AtomicU64,
    rate_limited: AtomicU64,
    delivered: AtomicU64,
    undelivered: AtomicU64,
    attributed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub skipped: u64,
    pub rejected: u64,
    pub rate_limited: u64,
    pub delivered: u64,
    pub undelivered: u64,
    pub attributed: u64,
    /// Events refused by a full work queue.
    pub dropped: u64,
}

macro_rules! counter {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            pub fn $name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    counter! {
        record_received => received,
        record_skipped => skipped,
        record_rejected => rejected,
        record_rate_limited => rate_limited,
        record_delivered => delivered,
        record_undelivered => undelivered,
        record_attributed => attributed,
        record_dropped => dropped,
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            undelivered: self.undelivered.load(Ordering::Relaxed),
            attributed: self.attributed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let stats = PipelineStats::new();
        stats.record_received();
        stats.record_received();
        stats.record_rate_limited();
        let snap = stats.snapshot();
        assert_eq!(snap.received, 2);
        assert_eq!(snap.rate_limited, 1);
        assert_eq!(snap.delivered, 0);

        let json = serde_json::to_value(snap).unwrap();
        assert_eq!(json["received"], 2);
    }
}
