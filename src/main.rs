//! metric-director - routes metric lines to worker lanes.
//!
//! Usage: `metric-director [config.toml]`. Without a config file every
//! setting takes its default and input is read from stdin.

use std::sync::Arc;

use metric_director::config::Config;
use metric_director::director::MetricDirector;
use metric_director::host::{self, Workers};
use metric_director::telemetry;
use tokio::io::AsyncRead;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).map_err(|e| {
            error!(path = %path, error = %e, "Failed to load config");
            e
        })?,
        None => {
            let config = Config::default();
            config.validate()?;
            config
        }
    };

    info!(
        lanes = config.director.lanes,
        workers = config.lanes.len(),
        dedupe = config.director.dedupe,
        "Starting metric-director"
    );
    if config.lanes.is_empty() {
        warn!("No [[lane]] blocks configured; every message will be dropped as unwanted");
    }

    let director = Arc::new(MetricDirector::new(&config.director));
    let workers = Workers::spawn(Arc::clone(&director), &config.lanes)?;

    let path = config.input.path.clone();
    let reader: Box<dyn AsyncRead + Unpin + Send> = match &path {
        Some(path) => Box::new(tokio::fs::File::open(path).await.map_err(|e| {
            error!(path = %path, error = %e, "Failed to open input");
            e
        })?),
        None => Box::new(tokio::io::stdin()),
    };

    let feed = host::feed(&director, reader, config.input.max_line_len, path.as_deref());
    tokio::select! {
        report = feed => {
            report?;
            host::flush(&director).await;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping without flush");
        }
    }

    for report in workers.stop() {
        info!(
            lane = report.lane,
            name = %report.name,
            processed = report.processed,
            "Worker finished"
        );
    }
    let stats = director.stats();
    info!(stats = %serde_json::to_string(&stats)?, "Final statistics");
    Ok(())
}
