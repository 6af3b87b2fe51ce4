//! `[[lane]]` blocks: what each worker lane subscribes to.

use serde::Deserialize;
use uuid::Uuid;

/// One worker lane and its interests.
///
/// ```toml
/// [[lane]]
/// name = "latency"
/// checks = true
/// searches = ["and(env:prod,__name:latency*)"]
/// accounts = [933]
///
/// [[lane.metric]]
/// check_uuid = "4766c496-2173-4f60-9607-6449d29cac56"
/// name = "foo|ST[color:orange]"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LaneBlock {
    /// Label used in logs.
    #[serde(default)]
    pub name: String,
    /// Receive `S`, `C` and `D` records.
    #[serde(default)]
    pub checks: bool,
    /// Receive every record.
    #[serde(default)]
    pub all: bool,
    /// Receive every record from these accounts.
    #[serde(default)]
    pub accounts: Vec<u64>,
    /// Tag-search queries evaluated against each metric.
    #[serde(default)]
    pub searches: Vec<String>,
    /// Exact (check, metric name) interests.
    #[serde(default)]
    pub metric: Vec<MetricInterestBlock>,
}

impl LaneBlock {
    /// The configured name, or `lane-<index>` when blank.
    pub fn display_name(&self, index: usize) -> String {
        if self.name.is_empty() {
            format!("lane-{index}")
        } else {
            self.name.clone()
        }
    }
}

/// An exact metric interest.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricInterestBlock {
    /// Check to match; any check when unset.
    #[serde(default)]
    pub check_uuid: Option<Uuid>,
    /// Metric name, with or without tags. Canonicalized on registration.
    pub name: String,
}
