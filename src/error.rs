//! Unified error handling for the metric director.
//!
//! Decode failures are counted and dropped by the director; everything else
//! here is a caller mistake or a resource limit and is returned as-is.

use metric_tags::{CanonicalizeError, DecodeError, SearchParseError};
use thiserror::Error;

// ============================================================================
// Director Errors (interest registration and distribution)
// ============================================================================

/// Errors raised by [`MetricDirector`](crate::director::MetricDirector).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DirectorError {
    /// Every lane is already owned by another thread.
    #[error("no free lane: all {0} lanes are claimed")]
    NoFreeLane(usize),

    /// The lane belongs to another thread, or this thread owns a different one.
    #[error("lane {0} is already claimed")]
    LaneTaken(usize),

    #[error("lane {lane} out of range (director has {lanes} lanes)")]
    LaneOutOfRange { lane: usize, lanes: usize },

    /// An interest count would exceed `u32::MAX`.
    #[error("interest count overflow on lane {0}")]
    InterestOverflow(usize),

    #[error("invalid metric name: {0}")]
    Name(#[from] CanonicalizeError),

    #[error("invalid tag search: {0}")]
    Search(#[from] SearchParseError),

    #[error("undecodable line: {0}")]
    Decode(#[from] DecodeError),
}

impl DirectorError {
    /// Get a static error code string for counters and log fields.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoFreeLane(_) => "no_free_lane",
            Self::LaneTaken(_) => "lane_taken",
            Self::LaneOutOfRange { .. } => "lane_out_of_range",
            Self::InterestOverflow(_) => "interest_overflow",
            Self::Name(_) => "invalid_name",
            Self::Search(_) => "invalid_search",
            Self::Decode(_) => "undecodable",
        }
    }
}

/// Result type for director operations.
pub type DirectorResult<T> = Result<T, DirectorError>;
