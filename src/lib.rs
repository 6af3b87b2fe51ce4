//! Metric director.
//!
//! Reads the tab-separated metric line protocol, decodes each line with
//! [`metric_tags`], and hands every message to the worker lanes that asked
//! for it, by exact `(check, name)` interest, check-record interest, tag
//! search or hook.
//!
//! ```
//! use metric_director::config::DirectorConfig;
//! use metric_director::director::MetricDirector;
//!
//! let director = MetricDirector::new(&DirectorConfig::default());
//! director.adjust_metric_interest(None, "latency|ST[env:prod]", 1).unwrap();
//!
//! let line = "M\t1526493506.214\tweb`http`c_1_77`4766c496-2173-4f60-9607-6449d29cac56\tlatency|ST[env:prod]\tn\t12.5";
//! assert_eq!(director.process_line(line.as_bytes()).unwrap(), 1);
//!
//! let message = director.lane_next().unwrap().unwrap();
//! assert_eq!(message.metric_name(), Some("latency|ST[env:prod]"));
//! ```

pub mod config;
pub mod director;
pub mod error;
pub mod host;
pub mod telemetry;

pub use config::{Config, ConfigError};
pub use director::{MetricDirector, SearchId, SearchScope, SharedMessage, WantHook};
pub use error::{DirectorError, DirectorResult};
