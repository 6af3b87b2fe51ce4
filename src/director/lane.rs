//! Worker lanes.
//!
//! Each lane is a FIFO owned by exactly one consumer thread. Producers on
//! any thread push into it; only the owning thread pops. A thread owns at
//! most one lane per director and never gives it up.

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use metric_tags::MetricMessage;
use parking_lot::Mutex;

/// A decoded message shared by every lane it was sent to.
pub type SharedMessage = Arc<MetricMessage<'static>>;

pub(crate) enum Entry {
    Message(SharedMessage),
    Flush(Arc<FlushBarrier>),
}

pub(crate) struct Lane {
    tx: Sender<Entry>,
    rx: Receiver<Entry>,
    claimed: AtomicBool,
    backlog: AtomicUsize,
    dropping: AtomicBool,
    pub(crate) delivered: AtomicU64,
    pub(crate) dropped: AtomicU64,
}

impl Lane {
    pub(crate) fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            claimed: AtomicBool::new(false),
            backlog: AtomicUsize::new(0),
            dropping: AtomicBool::new(false),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub(crate) fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    pub(crate) fn backlog(&self) -> usize {
        self.backlog.load(Ordering::Relaxed)
    }

    /// Queue a message unless the backlog has reached `max_backlog`
    /// (`0` disables the limit). Returns `Err(true)` when this drop starts
    /// a new run of drops.
    pub(crate) fn push(&self, message: SharedMessage, max_backlog: usize) -> Result<(), bool> {
        if max_backlog > 0 && self.backlog.load(Ordering::Relaxed) >= max_backlog {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(!self.dropping.swap(true, Ordering::Relaxed));
        }
        self.backlog.fetch_add(1, Ordering::Relaxed);
        // the lane holds its own receiver, so the channel never disconnects
        let _ = self.tx.send(Entry::Message(message));
        self.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Flush sentinels bypass the backlog limit.
    pub(crate) fn push_flush(&self, barrier: Arc<FlushBarrier>) {
        let _ = self.tx.send(Entry::Flush(barrier));
    }

    /// Pop the next message without blocking. Returns it with the backlog
    /// left behind it.
    pub(crate) fn try_next(&self) -> Option<(SharedMessage, usize)> {
        while let Ok(entry) = self.rx.try_recv() {
            if let Some(next) = self.take(entry) {
                return Some(next);
            }
        }
        None
    }

    pub(crate) fn next_until(&self, deadline: Instant) -> Option<(SharedMessage, usize)> {
        loop {
            match self.rx.recv_deadline(deadline) {
                Ok(entry) => {
                    if let Some(next) = self.take(entry) {
                        return Some(next);
                    }
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn take(&self, entry: Entry) -> Option<(SharedMessage, usize)> {
        match entry {
            Entry::Message(message) => {
                let left = self.backlog.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
                self.dropping.store(false, Ordering::Relaxed);
                Some((message, left))
            }
            Entry::Flush(barrier) => {
                barrier.arrive();
                None
            }
        }
    }
}

type Completion = Box<dyn FnOnce() + Send>;

/// Fan-out/fan-in barrier: the completion runs once every lane that was
/// sent the sentinel has reached it.
pub(crate) struct FlushBarrier {
    remaining: AtomicUsize,
    on_complete: Mutex<Option<Completion>>,
}

impl FlushBarrier {
    /// With `lanes == 0` the completion runs immediately.
    pub(crate) fn new(lanes: usize, on_complete: Completion) -> Arc<Self> {
        let barrier = Arc::new(Self {
            remaining: AtomicUsize::new(lanes),
            on_complete: Mutex::new(Some(on_complete)),
        });
        if lanes == 0 {
            barrier.complete();
        }
        barrier
    }

    fn arrive(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.complete();
        }
    }

    fn complete(&self) {
        let on_complete = self.on_complete.lock().take();
        if let Some(on_complete) = on_complete {
            on_complete();
        }
    }
}

thread_local! {
    /// `(director id, lane)` pairs owned by this thread.
    static OWNED: RefCell<Vec<(usize, usize)>> = const { RefCell::new(Vec::new()) };
}

pub(crate) fn owned_lane(director: usize) -> Option<usize> {
    OWNED.with(|owned| {
        owned
            .borrow()
            .iter()
            .find(|(d, _)| *d == director)
            .map(|(_, lane)| *lane)
    })
}

pub(crate) fn record_owned(director: usize, lane: usize) {
    OWNED.with(|owned| owned.borrow_mut().push((director, lane)));
}
