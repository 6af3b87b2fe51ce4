//! Tag-search syntax tree and its textual rendering.

use std::fmt;
use std::str::FromStr;

use super::parse;
use super::pattern::{scan_regex, Pattern, Side};
use crate::error::SearchParseError;
use crate::tag::TAG_B64;

use base64::Engine as _;

/// A node of a parsed tag search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchNode {
    /// All children must match.
    And(Vec<SearchNode>),
    /// At least one child must match.
    Or(Vec<SearchNode>),
    /// The child must not match.
    Not(Box<SearchNode>),
    /// Planner hints around an expression. Matches exactly when `expr`
    /// does; `options` never affect the result.
    Hint {
        /// The wrapped expression.
        expr: Box<SearchNode>,
        /// Hint arguments such as `index:none`.
        options: Vec<SearchNode>,
    },
    /// Some tag matches `category`, and `value` when present.
    Match {
        /// Pattern for the category.
        category: Pattern,
        /// Pattern for the value; `None` accepts any value.
        value: Option<Pattern>,
    },
}

impl SearchNode {
    /// Children of an `and`, `or` or `not` node; the wrapped expression of
    /// a `hint`.
    pub fn args(&self) -> &[SearchNode] {
        match self {
            SearchNode::And(args) | SearchNode::Or(args) => args,
            SearchNode::Not(arg) => std::slice::from_ref(arg.as_ref()),
            SearchNode::Hint { expr, .. } => std::slice::from_ref(expr.as_ref()),
            SearchNode::Match { .. } => &[],
        }
    }

    /// Mutable children of an `and` or `or` node.
    pub fn args_mut(&mut self) -> Option<&mut Vec<SearchNode>> {
        match self {
            SearchNode::And(args) | SearchNode::Or(args) => Some(args),
            _ => None,
        }
    }

    /// Swap two children of an `and`/`or` node. Returns false if either
    /// index is out of range or the node has no argument list.
    pub fn swap_args(&mut self, a: usize, b: usize) -> bool {
        match self.args_mut() {
            Some(args) if a < args.len() && b < args.len() => {
                args.swap(a, b);
                true
            }
            _ => false,
        }
    }

    fn write(&self, out: &mut String) {
        match self {
            SearchNode::And(args) => write_args("and(", args, out),
            SearchNode::Or(args) => write_args("or(", args, out),
            SearchNode::Not(arg) => {
                out.push_str("not(");
                arg.write(out);
                out.push(')');
            }
            SearchNode::Hint { expr, options } => {
                out.push_str("hint(");
                expr.write(out);
                for option in options {
                    out.push(',');
                    option.write(out);
                }
                out.push(')');
            }
            SearchNode::Match { category, value } => {
                write_pattern(category, Side::Category, out);
                if let Some(value) = value {
                    out.push(':');
                    write_pattern(value, Side::Value, out);
                }
            }
        }
    }
}

fn write_args(open: &str, args: &[SearchNode], out: &mut String) {
    out.push_str(open);
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        arg.write(out);
    }
    out.push(')');
}

fn starts_encoded(bytes: &[u8]) -> bool {
    matches!(bytes, [b'"', ..] | [b'b', b'"' | b'!' | b'/', ..] | [b'/', ..])
}

fn write_b64(open: &str, bytes: &[u8], close: char, out: &mut String) {
    out.push_str(open);
    TAG_B64.encode_string(bytes, out);
    out.push(close);
}

fn write_pattern(pattern: &Pattern, side: Side, out: &mut String) {
    match pattern {
        Pattern::Literal(lit) => {
            out.push_str("[exact]");
            let raw_ok = lit.iter().all(|b| side.allows(*b) || matches!(b, b'*' | b'?'))
                && !starts_encoded(lit);
            if raw_ok {
                out.extend(lit.iter().map(|b| char::from(*b)));
            } else {
                write_b64("b\"", lit, '"', out);
            }
        }
        Pattern::Glob { source, .. } => {
            let raw_ok = source
                .iter()
                .all(|b| side.allows(*b) || matches!(b, b'*' | b'?'))
                && !starts_encoded(source);
            if raw_ok {
                out.extend(source.iter().map(|b| char::from(*b)));
            } else {
                write_b64("b\"", source, '"', out);
            }
        }
        Pattern::Graphite { source, .. } => {
            let raw_ok = !source.is_empty()
                && source
                    .iter()
                    .all(|b| side.allows(*b) || matches!(b, b'*' | b'?'));
            if raw_ok {
                out.push_str("[graphite]");
                out.extend(source.iter().map(|b| char::from(*b)));
            } else {
                write_b64("b[graphite]\"", source, '"', out);
            }
        }
        Pattern::Regex { source, .. } => {
            let raw = format!("/{source}/");
            let bytes = raw.as_bytes();
            let round_trips = source.bytes().all(|b| b.is_ascii_graphic())
                && scan_regex(bytes, side) == Some(bytes.len() - 1);
            if round_trips {
                out.push_str(&raw);
            } else {
                write_b64("b/", source.as_bytes(), '/', out);
            }
        }
    }
}

/// A parsed tag-search query.
///
/// ```
/// use metric_tags::{TagSearch, TagSet, TagLimit};
///
/// let search: TagSearch = "and(env:prod,or(service:web,team:/^(red|blue)$/),not(special))"
///     .parse()
///     .unwrap();
/// let tags = TagSet::parse("env:prod,team:red", TagLimit::Standard).unwrap();
/// assert!(search.matches(&tags));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagSearch {
    query: String,
    root: SearchNode,
}

impl TagSearch {
    /// Parse a query. The root must be `and(...)`, `or(...)` or `not(...)`.
    ///
    /// # Errors
    ///
    /// Returns the byte offset where parsing stopped.
    pub fn parse(query: &str) -> Result<Self, SearchParseError> {
        let root = parse::parse_query(query)?;
        Ok(Self {
            query: query.to_owned(),
            root,
        })
    }

    /// The query text as given.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Root node.
    pub fn root(&self) -> &SearchNode {
        &self.root
    }

    /// Mutable root node, for planners that reorder arguments.
    pub fn root_mut(&mut self) -> &mut SearchNode {
        &mut self.root
    }

    /// Render the tree back to query text.
    pub fn unparse(&self) -> String {
        self.root.to_string()
    }
}

impl FromStr for TagSearch {
    type Err = SearchParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SearchNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write(&mut out);
        f.write_str(&out)
    }
}

impl fmt::Display for TagSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt(f)
    }
}
