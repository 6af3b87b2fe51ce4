//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: the top-level `Config` and `ConfigError`
//! - [`director`]: lane count, backpressure, dedupe and input settings
//! - [`lanes`]: per-lane interest blocks
//! - [`validation`]: cross-field checks run by `Config::load`

mod director;
mod lanes;
mod types;
mod validation;

pub use director::{DirectorConfig, InputConfig};
pub use lanes::{LaneBlock, MetricInterestBlock};
pub use types::{Config, ConfigError};
pub use validation::ValidationError;
