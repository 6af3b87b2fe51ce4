//! Interest tables: which lanes want which messages.
//!
//! Per-lane counts live in copy-on-write arrays behind [`ArcSwap`]. Readers
//! load a snapshot and never block; writers build a new array and
//! compare-and-swap it in, retrying if another writer got there first.
//! The old array is freed when the last reader drops its snapshot.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::{ArcSwap, Guard};
use dashmap::DashMap;
use metric_tags::{MetricMessage, TagSearch, TagSet};
use uuid::Uuid;

use crate::error::{DirectorError, DirectorResult};

/// Interest counts, one slot per lane.
pub(crate) struct LaneCounts {
    counts: ArcSwap<Vec<u32>>,
}

impl LaneCounts {
    pub(crate) fn new(lanes: usize) -> Self {
        Self {
            counts: ArcSwap::from_pointee(vec![0; lanes]),
        }
    }

    /// Add `delta` to `lane`'s count and return the new count.
    ///
    /// Decrements stop at zero. Increments past `u32::MAX` fail without
    /// changing anything.
    pub(crate) fn adjust(&self, lane: usize, delta: i32) -> DirectorResult<u32> {
        let mut current = self.counts.load_full();
        loop {
            let old = current[lane];
            let new = if delta >= 0 {
                old.checked_add(delta.unsigned_abs())
                    .ok_or(DirectorError::InterestOverflow(lane))?
            } else {
                old.saturating_sub(delta.unsigned_abs())
            };
            if new == old {
                return Ok(new);
            }

            let mut next = current.as_ref().clone();
            next[lane] = new;
            let previous = self.counts.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&*previous, &current) {
                return Ok(new);
            }
            current = Guard::into_inner(previous);
        }
    }

    pub(crate) fn get(&self, lane: usize) -> u32 {
        self.counts.load()[lane]
    }

    /// Set `wants[i]` for every lane with a positive count.
    pub(crate) fn mark(&self, wants: &mut [bool]) {
        let counts = self.counts.load();
        for (want, count) in wants.iter_mut().zip(counts.iter()) {
            if *count > 0 {
                *want = true;
            }
        }
    }
}

/// Exact `(check, metric name)` interests.
///
/// The nil UUID stands for "any check".
pub(crate) struct ExactInterest {
    lanes: usize,
    by_check: DashMap<Uuid, DashMap<Box<str>, LaneCounts>>,
}

impl ExactInterest {
    pub(crate) fn new(lanes: usize) -> Self {
        Self {
            lanes,
            by_check: DashMap::new(),
        }
    }

    /// `name` must already be canonical.
    pub(crate) fn adjust(
        &self,
        check: Option<Uuid>,
        name: &str,
        lane: usize,
        delta: i32,
    ) -> DirectorResult<u32> {
        let key = check.unwrap_or(Uuid::nil());
        let names = match self.by_check.get(&key) {
            Some(names) => names,
            None => self.by_check.entry(key).or_default().downgrade(),
        };
        let counts = match names.get(name) {
            Some(counts) => counts,
            None => names
                .entry(name.into())
                .or_insert_with(|| LaneCounts::new(self.lanes))
                .downgrade(),
        };
        counts.adjust(lane, delta)
    }

    pub(crate) fn count(&self, check: Option<Uuid>, name: &str, lane: usize) -> u32 {
        self.by_check
            .get(&check.unwrap_or(Uuid::nil()))
            .and_then(|names| names.get(name).map(|counts| counts.get(lane)))
            .unwrap_or(0)
    }

    /// Mark lanes interested in `name` on `check` or on any check.
    pub(crate) fn mark(&self, check: Uuid, name: &str, wants: &mut [bool]) {
        for key in [check, Uuid::nil()] {
            if let Some(names) = self.by_check.get(&key)
                && let Some(counts) = names.get(name)
            {
                counts.mark(wants);
            }
        }
    }
}

/// Handle for a registered tag search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SearchId(u64);

impl fmt::Display for SearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "search#{}", self.0)
    }
}

/// Restricts a registered search to one account or one check.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchScope {
    /// Only messages from this account.
    pub account_id: Option<u64>,
    /// Only messages from this check.
    pub check_uuid: Option<Uuid>,
}

impl SearchScope {
    /// Every message.
    pub const ANY: Self = Self {
        account_id: None,
        check_uuid: None,
    };

    fn admits(&self, message: &MetricMessage<'_>) -> bool {
        self.account_id.is_none_or(|a| message.id.account_id == Some(a))
            && self.check_uuid.is_none_or(|c| message.id.check_uuid == c)
    }
}

struct RegisteredSearch {
    search: TagSearch,
    scope: SearchScope,
}

/// Tag searches per lane, keyed by an incrementing id.
pub(crate) struct SearchRegistry {
    next_id: AtomicU64,
    per_lane: Box<[DashMap<u64, Arc<RegisteredSearch>>]>,
    owner: DashMap<u64, usize>,
}

impl SearchRegistry {
    pub(crate) fn new(lanes: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            per_lane: (0..lanes).map(|_| DashMap::new()).collect(),
            owner: DashMap::new(),
        }
    }

    pub(crate) fn add(&self, lane: usize, search: TagSearch, scope: SearchScope) -> SearchId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.per_lane[lane].insert(id, Arc::new(RegisteredSearch { search, scope }));
        self.owner.insert(id, lane);
        SearchId(id)
    }

    /// Returns the lane the search was registered on.
    pub(crate) fn remove(&self, id: SearchId) -> Option<usize> {
        let (_, lane) = self.owner.remove(&id.0)?;
        self.per_lane[lane].remove(&id.0);
        Some(lane)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.owner.is_empty()
    }

    pub(crate) fn len(&self, lane: usize) -> usize {
        self.per_lane[lane].len()
    }

    /// True if any search on `lane` admits `message` and matches the union
    /// of `sets`.
    pub(crate) fn lane_matches(
        &self,
        lane: usize,
        message: &MetricMessage<'_>,
        sets: &[&TagSet<'_>],
    ) -> bool {
        self.per_lane[lane].iter().any(|entry| {
            let registered = entry.value();
            registered.scope.admits(message) && registered.search.matches_sets(sets)
        })
    }
}
