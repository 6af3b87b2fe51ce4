//! # metric-tags
//!
//! Tagged metric names and the records that carry them.
//!
//! A metric name may carry stream tags and measurement tags in trailing
//! blocks: `latency|ST[env:prod,host:web1]|MT{units:ms}`. This crate
//! provides:
//!
//! - the tag codec, where a half that is not plain text is written as
//!   `b"<base64>"`
//! - tag sets with deterministic ordering and deduplication
//! - canonicalization of tagged names
//! - a tag-search query language, `and(env:prod,not(host:web*))`, with a
//!   parser, an evaluator and a renderer
//! - a decoder for the tab-separated metric line protocol
//! - with the `tokio` feature, a newline codec for reading such lines
//!
//! ## Quick Start
//!
//! ```rust
//! use metric_tags::{canonicalize, decode_line, NoitField, TagSearch};
//!
//! let name = canonicalize("latency|ST[host:web1,env:prod]").unwrap();
//! assert_eq!(name, "latency|ST[env:prod,host:web1]");
//!
//! let line = b"M\t1526493506.214\tweb`http`c_1_77`4766c496-2173-4f60-9607-6449d29cac56\tlatency|ST[env:prod]\tn\t12.5";
//! let message = decode_line(line, NoitField::Auto).unwrap();
//! let search: TagSearch = "and(env:prod,__name:lat*)".parse().unwrap();
//! assert!(search.matches_message(&message));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod canonical;
pub mod error;
#[cfg(feature = "tokio")]
pub mod line;
pub mod message;
pub mod search;
pub mod tag;

pub use self::canonical::{canonicalize, TaggedName, MAX_METRIC_NAME_LEN};
#[cfg(feature = "tokio")]
pub use self::error::LineError;
pub use self::error::{CanonicalizeError, DecodeError, SearchErrorKind, SearchParseError, TagError};
#[cfg(feature = "tokio")]
pub use self::line::LineCodec;
pub use self::message::{
    decode_line, MessageType, MetricId, MetricMessage, MetricName, MetricValue, NoitField,
    ValueType,
};
pub use self::search::{Pattern, SearchNode, TagSearch, MAX_QUERY_DEPTH};
pub use self::tag::{decode_tag, encode_tag, Tag, TagLimit, TagSet, TagSetBuilder};
