//! Tag-search queries: `and`/`or`/`not`/`hint` over category and value
//! patterns.

mod ast;
mod eval;
mod parse;
mod pattern;

pub use self::ast::{SearchNode, TagSearch};
pub use self::parse::MAX_QUERY_DEPTH;
pub use self::pattern::Pattern;
