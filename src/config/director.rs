//! `[director]` and `[input]` sections.

use metric_tags::NoitField;
use metric_tags::line::DEFAULT_MAX_LINE_LEN;
use serde::Deserialize;

/// Director tuning.
///
/// ```toml
/// [director]
/// lanes = 4
/// max_backlog = 10000
/// dedupe = true
/// dedupe_window_secs = 10
/// noit_field = "auto"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct DirectorConfig {
    /// Number of worker lanes (default: 4).
    #[serde(default = "default_lanes")]
    pub lanes: usize,
    /// Per-lane queue depth past which new messages are dropped (default: 10000).
    #[serde(default = "default_max_backlog")]
    pub max_backlog: usize,
    /// Drop byte-identical lines seen within the dedupe window (default: true).
    #[serde(default = "default_true")]
    pub dedupe: bool,
    /// Dedupe window in seconds (default: 10).
    #[serde(default = "default_dedupe_window_secs")]
    pub dedupe_window_secs: u64,
    /// Whether lines carry the source address column (default: auto).
    #[serde(default)]
    pub noit_field: NoitField,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            lanes: default_lanes(),
            max_backlog: default_max_backlog(),
            dedupe: default_true(),
            dedupe_window_secs: default_dedupe_window_secs(),
            noit_field: NoitField::default(),
        }
    }
}

/// Input source.
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// File to read; stdin when unset.
    #[serde(default)]
    pub path: Option<String>,
    /// Longest accepted line in bytes (default: 65536). Longer lines are skipped.
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_line_len: default_max_line_len(),
        }
    }
}

fn default_lanes() -> usize {
    4
}

fn default_max_backlog() -> usize {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_dedupe_window_secs() -> u64 {
    10
}

fn default_max_line_len() -> usize {
    DEFAULT_MAX_LINE_LEN
}
