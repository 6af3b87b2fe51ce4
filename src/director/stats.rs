//! Director counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) received: AtomicU64,
    pub(crate) distributed: AtomicU64,
    pub(crate) deduped: AtomicU64,
    pub(crate) dropped_backlog: AtomicU64,
    pub(crate) dropped_old: AtomicU64,
    pub(crate) undecodable: AtomicU64,
    pub(crate) unwanted: AtomicU64,
}

impl Counters {
    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of the director's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectorStats {
    /// Messages offered to the director, decodable or not.
    pub received: u64,
    /// Enqueues across all lanes; one message sent to three lanes counts three.
    pub distributed: u64,
    /// Dropped as byte-identical repeats.
    pub deduped: u64,
    /// Enqueues refused because a lane's backlog was full.
    pub dropped_backlog: u64,
    /// Dropped for a timestamp before the drop-before cutoff.
    pub dropped_old: u64,
    /// Lines that failed to decode.
    pub undecodable: u64,
    /// Messages no lane wanted.
    pub unwanted: u64,
    pub lanes: Vec<LaneStats>,
}

/// Per-lane view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LaneStats {
    pub claimed: bool,
    pub backlog: usize,
    pub delivered: u64,
    pub dropped: u64,
    pub searches: usize,
}

impl DirectorStats {
    pub(crate) fn from_counters(counters: &Counters, lanes: Vec<LaneStats>) -> Self {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        Self {
            received: load(&counters.received),
            distributed: load(&counters.distributed),
            deduped: load(&counters.deduped),
            dropped_backlog: load(&counters.dropped_backlog),
            dropped_old: load(&counters.dropped_old),
            undecodable: load(&counters.undecodable),
            unwanted: load(&counters.unwanted),
            lanes,
        }
    }

    /// Messages currently queued across all lanes.
    pub fn total_backlog(&self) -> usize {
        self.lanes.iter().map(|l| l.backlog).sum()
    }
}
