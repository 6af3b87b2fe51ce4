//! Tracing setup and span constructors.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber: `RUST_LOG` if set, otherwise `info`.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();
}

/// Standardized span constructors for director observability.
pub mod spans {
    use tracing::{Span, info_span};

    /// Create a span for a worker draining one lane.
    pub fn lane(lane: usize, name: &str) -> Span {
        info_span!("lane", lane, name = %name)
    }

    /// Create a span for the input loop.
    pub fn input(source: Option<&str>) -> Span {
        if let Some(path) = source {
            info_span!("input", path = %path)
        } else {
            info_span!("input", path = "<stdin>")
        }
    }
}
