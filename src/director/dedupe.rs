//! Duplicate line suppression.
//!
//! Lines are bucketed by the second of their timestamp and remembered by
//! SHA-256 digest. Buckets more than `window` seconds behind the newest one
//! are forgotten, so only duplicates that arrive within the window are
//! caught.

use std::collections::{BTreeMap, HashSet};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

type LineDigest = [u8; 32];

pub(crate) struct DedupeWindow {
    window_secs: u64,
    buckets: Mutex<BTreeMap<u64, HashSet<LineDigest>>>,
}

impl DedupeWindow {
    pub(crate) fn new(window_secs: u64) -> Self {
        Self {
            window_secs: window_secs.max(1),
            buckets: Mutex::new(BTreeMap::new()),
        }
    }

    /// Record `line` and report whether it was already seen in its bucket.
    pub(crate) fn check(&self, timestamp_ms: u64, line: &[u8]) -> bool {
        let second = timestamp_ms / 1000;
        let digest: LineDigest = Sha256::digest(line).into();

        let mut buckets = self.buckets.lock();
        if let Some((&newest, _)) = buckets.last_key_value()
            && second.saturating_add(self.window_secs) <= newest
        {
            // older than anything still tracked
            return false;
        }

        let seen = !buckets.entry(second).or_default().insert(digest);

        if let Some((&newest, _)) = buckets.last_key_value() {
            while let Some(oldest) = buckets.first_entry() {
                if oldest.key().saturating_add(self.window_secs) <= newest {
                    oldest.remove();
                } else {
                    break;
                }
            }
        }
        seen
    }

    #[cfg(test)]
    pub(crate) fn tracked_seconds(&self) -> usize {
        self.buckets.lock().len()
    }
}
