//! The metric director: routes decoded messages to worker lanes.
//!
//! Producers on any thread call [`MetricDirector::process_line`] or
//! [`MetricDirector::distribute`]. Each message goes to the lanes that
//! registered interest in it:
//!
//! - exact interest in a `(check, metric name)` pair, where no check means
//!   any check,
//! - check interest, for `S`, `C` and `D` records,
//! - a tag search registered on the lane, tried only for lanes without an
//!   exact hit,
//! - any [`WantHook`].
//!
//! A message wanted by several lanes is decoded once and shared through an
//! `Arc`. Consumers read their own lane with [`MetricDirector::lane_next`]
//! and friends; the first such call claims a lane for the thread.

mod dedupe;
mod hooks;
mod interest;
mod lane;
mod stats;

pub use hooks::{AccountInterest, SubscribeAll, WantHook};
pub use interest::{SearchId, SearchScope};
pub use lane::SharedMessage;
pub use stats::{DirectorStats, LaneStats};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use metric_tags::{MetricMessage, NoitField, TagSearch, canonicalize, decode_line};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use self::dedupe::DedupeWindow;
use self::interest::{ExactInterest, LaneCounts, SearchRegistry};
use self::lane::{FlushBarrier, Lane};
use self::stats::Counters;
use crate::config::DirectorConfig;
use crate::error::{DirectorError, DirectorResult};

static NEXT_DIRECTOR_ID: AtomicUsize = AtomicUsize::new(0);

/// Routes metric messages to per-thread lanes by interest.
pub struct MetricDirector {
    id: usize,
    lanes: Box<[Lane]>,
    noit_field: NoitField,
    max_backlog: AtomicUsize,
    drop_before_ms: AtomicU64,
    dedupe_enabled: AtomicBool,
    dedupe: DedupeWindow,
    exact: ExactInterest,
    checks: LaneCounts,
    searches: SearchRegistry,
    hooks: ArcSwap<Vec<Arc<dyn WantHook>>>,
    counters: Counters,
}

impl MetricDirector {
    /// Build a director with `config.lanes` lanes (at least one).
    pub fn new(config: &DirectorConfig) -> Self {
        let lanes = config.lanes.max(1);
        debug!(
            lanes,
            max_backlog = config.max_backlog,
            dedupe = config.dedupe,
            "Metric director created"
        );
        Self {
            id: NEXT_DIRECTOR_ID.fetch_add(1, Ordering::Relaxed),
            lanes: (0..lanes).map(|_| Lane::new()).collect(),
            noit_field: config.noit_field,
            max_backlog: AtomicUsize::new(config.max_backlog),
            drop_before_ms: AtomicU64::new(0),
            dedupe_enabled: AtomicBool::new(config.dedupe),
            dedupe: DedupeWindow::new(config.dedupe_window_secs),
            exact: ExactInterest::new(lanes),
            checks: LaneCounts::new(lanes),
            searches: SearchRegistry::new(lanes),
            hooks: ArcSwap::from_pointee(Vec::new()),
            counters: Counters::default(),
        }
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    // ------------------------------------------------------------------
    // Lane ownership
    // ------------------------------------------------------------------

    /// The calling thread's lane, claiming the first free one on first use.
    pub fn my_lane(&self) -> DirectorResult<usize> {
        if let Some(lane) = lane::owned_lane(self.id) {
            return Ok(lane);
        }
        let lane = self
            .lanes
            .iter()
            .position(Lane::try_claim)
            .ok_or(DirectorError::NoFreeLane(self.lanes.len()))?;
        lane::record_owned(self.id, lane);
        debug!(lane, "Lane claimed");
        Ok(lane)
    }

    /// Claim a specific lane for the calling thread.
    ///
    /// Succeeds without change if the thread already owns `lane`.
    pub fn claim_lane(&self, lane: usize) -> DirectorResult<()> {
        self.check_lane(lane)?;
        match lane::owned_lane(self.id) {
            Some(owned) if owned == lane => return Ok(()),
            Some(_) => return Err(DirectorError::LaneTaken(lane)),
            None => {}
        }
        if !self.lanes[lane].try_claim() {
            return Err(DirectorError::LaneTaken(lane));
        }
        lane::record_owned(self.id, lane);
        debug!(lane, "Lane claimed");
        Ok(())
    }

    fn check_lane(&self, lane: usize) -> DirectorResult<()> {
        if lane < self.lanes.len() {
            Ok(())
        } else {
            Err(DirectorError::LaneOutOfRange {
                lane,
                lanes: self.lanes.len(),
            })
        }
    }

    // ------------------------------------------------------------------
    // Interest registration
    // ------------------------------------------------------------------

    /// Adjust the calling thread's interest in `name` on `check` (`None`
    /// for any check). Returns the lane's new count.
    pub fn adjust_metric_interest(
        &self,
        check: Option<Uuid>,
        name: &str,
        delta: i32,
    ) -> DirectorResult<u32> {
        let lane = self.my_lane()?;
        self.adjust_metric_interest_on(lane, check, name, delta)
    }

    /// [`adjust_metric_interest`](Self::adjust_metric_interest) for an
    /// explicit lane. `name` is canonicalized first, so tag order and
    /// encoding do not matter.
    pub fn adjust_metric_interest_on(
        &self,
        lane: usize,
        check: Option<Uuid>,
        name: &str,
        delta: i32,
    ) -> DirectorResult<u32> {
        self.check_lane(lane)?;
        let name = canonicalize(name)?;
        let count = self.exact.adjust(check, &name, lane, delta)?;
        debug!(lane, check = ?check, name = %name, count, "Metric interest adjusted");
        Ok(count)
    }

    /// The current exact-interest count for `lane`.
    pub fn metric_interest(&self, lane: usize, check: Option<Uuid>, name: &str) -> u32 {
        match canonicalize(name) {
            Ok(name) if lane < self.lanes.len() => self.exact.count(check, &name, lane),
            _ => 0,
        }
    }

    /// Adjust the calling thread's interest in check records.
    pub fn adjust_checks_interest(&self, delta: i32) -> DirectorResult<u32> {
        let lane = self.my_lane()?;
        self.adjust_checks_interest_on(lane, delta)
    }

    pub fn adjust_checks_interest_on(&self, lane: usize, delta: i32) -> DirectorResult<u32> {
        self.check_lane(lane)?;
        let count = self.checks.adjust(lane, delta)?;
        debug!(lane, count, "Check interest adjusted");
        Ok(count)
    }

    /// Register a search on the calling thread's lane.
    pub fn register_search(&self, search: TagSearch) -> DirectorResult<SearchId> {
        let lane = self.my_lane()?;
        self.register_search_on(lane, search, SearchScope::ANY)
    }

    /// Register a search on `lane`, limited to messages `scope` admits.
    pub fn register_search_on(
        &self,
        lane: usize,
        search: TagSearch,
        scope: SearchScope,
    ) -> DirectorResult<SearchId> {
        self.check_lane(lane)?;
        debug!(lane, query = %search, "Search registered");
        Ok(self.searches.add(lane, search, scope))
    }

    /// Parse `query` and register it on `lane`.
    pub fn register_query_on(&self, lane: usize, query: &str) -> DirectorResult<SearchId> {
        let search = TagSearch::parse(query)?;
        self.register_search_on(lane, search, SearchScope::ANY)
    }

    /// Remove a registered search. Safe while other threads are matching.
    pub fn deregister_search(&self, id: SearchId) -> bool {
        match self.searches.remove(id) {
            Some(lane) => {
                debug!(lane, %id, "Search deregistered");
                true
            }
            None => false,
        }
    }

    /// Add a hook consulted for every message.
    pub fn add_hook(&self, hook: Arc<dyn WantHook>) {
        self.hooks.rcu(|hooks| {
            let mut hooks = Vec::clone(hooks);
            hooks.push(Arc::clone(&hook));
            hooks
        });
    }

    // ------------------------------------------------------------------
    // Runtime switches
    // ------------------------------------------------------------------

    /// Turn duplicate suppression on or off.
    pub fn set_dedupe(&self, enabled: bool) {
        self.dedupe_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Change the per-lane backlog limit. `0` disables it.
    pub fn set_max_backlog(&self, max_backlog: usize) {
        self.max_backlog.store(max_backlog, Ordering::Relaxed);
    }

    /// Drop messages timestamped before `timestamp_ms`. `0` disables the
    /// cutoff.
    pub fn drop_before(&self, timestamp_ms: u64) {
        self.drop_before_ms.store(timestamp_ms, Ordering::Relaxed);
    }

    // ------------------------------------------------------------------
    // Distribution
    // ------------------------------------------------------------------

    /// Decode one wire line and distribute it. Returns the number of lanes
    /// it was queued on.
    ///
    /// Undecodable lines are counted and returned as an error; nothing is
    /// queued for them.
    pub fn process_line(&self, line: &[u8]) -> DirectorResult<usize> {
        match decode_line(line, self.noit_field) {
            Ok(message) => Ok(self.distribute(message)),
            Err(e) => {
                Counters::bump(&self.counters.received);
                Counters::bump(&self.counters.undecodable);
                debug!(error = %e, code = e.code(), "Dropping undecodable line");
                Err(e.into())
            }
        }
    }

    /// Distribute an already-decoded message. Returns the number of lanes
    /// it was queued on.
    pub fn distribute(&self, message: MetricMessage<'_>) -> usize {
        Counters::bump(&self.counters.received);

        let cutoff = self.drop_before_ms.load(Ordering::Relaxed);
        if message.timestamp_ms < cutoff {
            Counters::bump(&self.counters.dropped_old);
            trace!(timestamp_ms = message.timestamp_ms, cutoff, "Dropping old message");
            return 0;
        }

        if self.dedupe_enabled.load(Ordering::Relaxed)
            && self.dedupe.check(message.timestamp_ms, &message.original)
        {
            Counters::bump(&self.counters.deduped);
            trace!(timestamp_ms = message.timestamp_ms, "Dropping duplicate line");
            return 0;
        }

        let mut wants = vec![false; self.lanes.len()];
        self.select(&message, &mut wants);
        if !wants.contains(&true) {
            Counters::bump(&self.counters.unwanted);
            return 0;
        }

        let message: SharedMessage = Arc::new(message.into_owned());
        let max_backlog = self.max_backlog.load(Ordering::Relaxed);
        let mut queued = 0;
        for (lane, _) in wants.iter().enumerate().filter(|(_, want)| **want) {
            match self.lanes[lane].push(Arc::clone(&message), max_backlog) {
                Ok(()) => {
                    Counters::bump(&self.counters.distributed);
                    queued += 1;
                }
                Err(first_drop) => {
                    Counters::bump(&self.counters.dropped_backlog);
                    if first_drop {
                        warn!(lane, max_backlog, "Lane backlog full, dropping messages");
                    }
                }
            }
        }
        queued
    }

    fn select(&self, message: &MetricMessage<'_>, wants: &mut [bool]) {
        if message.kind.is_check_record() {
            self.checks.mark(wants);
        } else if let Some(name) = &message.id.name {
            self.exact.mark(message.id.check_uuid, name.with_tags(), wants);

            if !self.searches.is_empty() && wants.contains(&false) {
                let implicit = message.implicit_tags();
                let sets = [name.stream(), name.measurement(), &implicit];
                for (lane, want) in wants.iter_mut().enumerate() {
                    if !*want && self.searches.lane_matches(lane, message, &sets) {
                        *want = true;
                    }
                }
            }
        }

        for hook in self.hooks.load().iter() {
            if hook.want(message, wants).is_break() {
                break;
            }
        }
    }

    // ------------------------------------------------------------------
    // Consumption
    // ------------------------------------------------------------------

    /// Next message on the calling thread's lane, if one is queued.
    pub fn lane_next(&self) -> DirectorResult<Option<SharedMessage>> {
        Ok(self.lane_next_backlog()?.map(|(message, _)| message))
    }

    /// Like [`lane_next`](Self::lane_next), also returning how many
    /// messages are still queued behind it.
    pub fn lane_next_backlog(&self) -> DirectorResult<Option<(SharedMessage, usize)>> {
        let lane = self.my_lane()?;
        Ok(self.lanes[lane].try_next())
    }

    /// Wait up to `timeout` for the next message on the calling thread's
    /// lane.
    pub fn lane_recv_timeout(&self, timeout: Duration) -> DirectorResult<Option<SharedMessage>> {
        let lane = self.my_lane()?;
        let deadline = Instant::now() + timeout;
        Ok(self.lanes[lane]
            .next_until(deadline)
            .map(|(message, _)| message))
    }

    /// Send a flush sentinel to every claimed lane. `on_complete` runs on
    /// the thread that drains the last sentinel, or right away when no lane
    /// is claimed. Returns the number of lanes flushed.
    pub fn flush<F>(&self, on_complete: F) -> usize
    where
        F: FnOnce() + Send + 'static,
    {
        let claimed: Vec<&Lane> = self.lanes.iter().filter(|l| l.is_claimed()).collect();
        let barrier = FlushBarrier::new(claimed.len(), Box::new(on_complete));
        for lane in &claimed {
            lane.push_flush(Arc::clone(&barrier));
        }
        debug!(lanes = claimed.len(), "Flush broadcast");
        claimed.len()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> DirectorStats {
        let lanes = self
            .lanes
            .iter()
            .enumerate()
            .map(|(i, lane)| LaneStats {
                claimed: lane.is_claimed(),
                backlog: lane.backlog(),
                delivered: lane.delivered.load(Ordering::Relaxed),
                dropped: lane.dropped.load(Ordering::Relaxed),
                searches: self.searches.len(i),
            })
            .collect();
        DirectorStats::from_counters(&self.counters, lanes)
    }
}
