//! The director process: worker threads draining lanes, and the input loop
//! feeding them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use futures_util::StreamExt;
use metric_tags::line::Overflow;
use metric_tags::{LineCodec, LineError, TagSearch};
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::{Instrument, debug, info, trace, warn};

use crate::config::LaneBlock;
use crate::director::{AccountInterest, MetricDirector, SearchScope, SubscribeAll, WantHook};
use crate::error::DirectorResult;
use crate::telemetry::spans;

/// How long an idle worker waits before rechecking the stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Messages one worker handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub lane: usize,
    pub name: String,
    pub processed: u64,
}

/// One OS thread per configured lane.
pub struct Workers {
    stop: Arc<AtomicBool>,
    handles: Vec<(usize, String, JoinHandle<u64>)>,
}

impl Workers {
    /// Spawn a worker for each block, in lane order. Returns once every
    /// worker has claimed its lane and registered its interests, so no
    /// message fed afterwards can miss them.
    pub fn spawn(director: Arc<MetricDirector>, blocks: &[LaneBlock]) -> DirectorResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let accounts = blocks
            .iter()
            .any(|b| !b.accounts.is_empty())
            .then(|| Arc::new(AccountInterest::new(director.lane_count())));
        if let Some(hook) = &accounts {
            let hook: Arc<dyn WantHook> = hook.clone();
            director.add_hook(hook);
        }

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(blocks.len());
        let mut workers = Self {
            stop: Arc::clone(&stop),
            handles: Vec::with_capacity(blocks.len()),
        };
        for (lane, block) in blocks.iter().enumerate() {
            let name = block.display_name(lane);
            let director = Arc::clone(&director);
            let block = block.clone();
            let accounts = accounts.clone();
            let stop = Arc::clone(&stop);
            let ready_tx = ready_tx.clone();
            let thread_name = name.clone();

            let handle = thread::spawn(move || {
                let _span = spans::lane(lane, &thread_name).entered();
                let registered = register(&director, lane, &block, accounts.as_deref());
                let ok = registered.is_ok();
                let _ = ready_tx.send(registered);
                if ok {
                    drain(&director, &stop)
                } else {
                    0
                }
            });
            workers.handles.push((lane, name, handle));
        }
        drop(ready_tx);

        for _ in 0..blocks.len() {
            match ready_rx.recv() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    workers.stop();
                    return Err(e);
                }
                // every worker already exited
                Err(_) => break,
            }
        }
        info!(workers = blocks.len(), "Workers ready");
        Ok(workers)
    }

    /// Signal every worker to stop and wait for them.
    pub fn stop(self) -> Vec<WorkerReport> {
        self.stop.store(true, Ordering::Relaxed);
        self.handles
            .into_iter()
            .map(|(lane, name, handle)| {
                let processed = handle.join().unwrap_or_else(|_| {
                    warn!(lane, "Worker panicked");
                    0
                });
                WorkerReport {
                    lane,
                    name,
                    processed,
                }
            })
            .collect()
    }
}

fn register(
    director: &MetricDirector,
    lane: usize,
    block: &LaneBlock,
    accounts: Option<&AccountInterest>,
) -> DirectorResult<()> {
    director.claim_lane(lane)?;
    if block.checks {
        director.adjust_checks_interest(1)?;
    }
    if block.all {
        director.add_hook(Arc::new(SubscribeAll::new(lane)));
    }
    if let Some(accounts) = accounts {
        for account in &block.accounts {
            accounts.adjust(*account, lane, 1)?;
        }
    }
    for interest in &block.metric {
        director.adjust_metric_interest(interest.check_uuid, &interest.name, 1)?;
    }
    for query in &block.searches {
        director.register_search_on(lane, TagSearch::parse(query)?, SearchScope::ANY)?;
    }
    debug!(
        checks = block.checks,
        all = block.all,
        metrics = block.metric.len(),
        searches = block.searches.len(),
        "Lane interests registered"
    );
    Ok(())
}

fn drain(director: &MetricDirector, stop: &AtomicBool) -> u64 {
    let mut processed = 0;
    while !stop.load(Ordering::Relaxed) {
        match director.lane_recv_timeout(POLL_INTERVAL) {
            Ok(Some(message)) => {
                processed += 1;
                trace!(message = %message.to_json(false), "Metric");
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Worker lost its lane");
                break;
            }
        }
    }
    debug!(processed, "Worker stopped");
    processed
}

/// What the input loop saw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedReport {
    pub lines: u64,
    pub queued: u64,
    pub rejected: u64,
    pub too_long: u64,
}

/// Stream newline-delimited lines from `reader` into the director until
/// end of input. Over-long lines are skipped and counted.
pub async fn feed<R>(
    director: &MetricDirector,
    reader: R,
    max_line_len: usize,
    source: Option<&str>,
) -> Result<FeedReport, LineError>
where
    R: AsyncRead + Unpin,
{
    async move {
        let mut frames = FramedRead::new(reader, LineCodec::with_max_len(max_line_len, Overflow::Skip));
        let mut report = FeedReport::default();
        while let Some(line) = frames.next().await {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            report.lines += 1;
            match director.process_line(&line) {
                Ok(queued) => report.queued += queued as u64,
                Err(_) => report.rejected += 1,
            }
        }
        report.too_long = frames.decoder().skipped();
        info!(
            lines = report.lines,
            queued = report.queued,
            rejected = report.rejected,
            too_long = report.too_long,
            "End of input"
        );
        Ok(report)
    }
    .instrument(spans::input(source))
    .await
}

/// Flush every claimed lane and wait for all of them to drain.
pub async fn flush(director: &MetricDirector) {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let lanes = director.flush(move || {
        let _ = tx.send(());
    });
    let _ = rx.await;
    debug!(lanes, "Flush complete");
}
