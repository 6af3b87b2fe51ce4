//! Shared helpers for director integration tests.

#![allow(dead_code)]

use metric_director::config::DirectorConfig;
use metric_director::director::MetricDirector;

pub const CHECK: &str = "4766c496-2173-4f60-9607-6449d29cac56";
pub const OTHER_CHECK: &str = "43e5c324-44c2-4877-a625-3b4c8230f2eb";

/// A director with `lanes` lanes and default settings otherwise.
pub fn director(lanes: usize) -> MetricDirector {
    MetricDirector::new(&DirectorConfig {
        lanes,
        ..DirectorConfig::default()
    })
}

/// An `M` line for `name` on `check`, from account 1.
pub fn metric_line(check: &str, name: &str, value: i64) -> String {
    metric_line_at(check, name, value, 1_526_493_506_214)
}

pub fn metric_line_at(check: &str, name: &str, value: i64, timestamp_ms: u64) -> String {
    format!(
        "M\t{}.{:03}\tweb`http`c_1_77`{check}\t{name}\tl\t{value}",
        timestamp_ms / 1000,
        timestamp_ms % 1000
    )
}

/// An `S` record for `check`.
pub fn status_line(check: &str) -> String {
    format!("S\t1526493506.214\tweb`http`c_1_77`{check}\tG\tA\t20\tok")
}
