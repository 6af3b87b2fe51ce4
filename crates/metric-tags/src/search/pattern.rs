//! Category and value patterns of a tag match.

use std::fmt::Write as _;

use regex::bytes::{Regex, RegexBuilder};

use crate::tag::{is_taggable_key_char, is_taggable_value_char};

/// Which half of a tag a pattern applies to. The halves differ in the
/// raw character set and in what ends a part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Side {
    Category,
    Value,
}

impl Side {
    pub(crate) fn allows(self, b: u8) -> bool {
        match self {
            Side::Category => is_taggable_key_char(b),
            Side::Value => is_taggable_value_char(b),
        }
    }

    /// Bytes that end a part.
    pub(crate) fn is_terminator(self, b: Option<u8>) -> bool {
        match b {
            None | Some(b',' | b')' | b' ') => true,
            Some(b':') => self == Side::Category,
            Some(_) => false,
        }
    }
}

/// A compiled matcher for one half of a tag.
#[derive(Clone, Debug)]
pub enum Pattern {
    /// Exact bytes.
    Literal(Vec<u8>),
    /// Shell-style `*`/`?` pattern, anchored at both ends.
    Glob {
        /// The pattern as written.
        source: Vec<u8>,
        /// Compiled translation.
        regex: Regex,
    },
    /// Graphite-style name pattern over `.`-separated segments.
    Graphite {
        /// The pattern as written.
        source: Vec<u8>,
        /// Compiled translation.
        regex: Regex,
    },
    /// Regular expression, unanchored.
    Regex {
        /// The expression as written.
        source: String,
        /// Compiled expression.
        regex: Regex,
    },
}

impl Pattern {
    /// Build a glob pattern.
    pub fn glob(source: impl Into<Vec<u8>>) -> Result<Self, regex::Error> {
        let source = source.into();
        let regex = compile(&glob_to_regex(&source))?;
        Ok(Pattern::Glob { source, regex })
    }

    /// Build a graphite pattern: `*` and `?` stay inside one segment,
    /// `**` spans segments, `{a,b}` is an alternation.
    pub fn graphite(source: impl Into<Vec<u8>>) -> Result<Self, regex::Error> {
        let source = source.into();
        let regex = compile(&graphite_to_regex(&source))?;
        Ok(Pattern::Graphite { source, regex })
    }

    /// Build a regex pattern.
    pub fn regex(source: impl Into<String>) -> Result<Self, regex::Error> {
        let source = source.into();
        let regex = compile(&source)?;
        Ok(Pattern::Regex { source, regex })
    }

    /// True if `subject` matches.
    pub fn matches(&self, subject: &[u8]) -> bool {
        match self {
            Pattern::Literal(lit) => lit.as_slice() == subject,
            Pattern::Glob { regex, .. }
            | Pattern::Graphite { regex, .. }
            | Pattern::Regex { regex, .. } => regex.is_match(subject),
        }
    }

    /// The literal bytes, for exact patterns.
    pub fn as_literal(&self) -> Option<&[u8]> {
        match self {
            Pattern::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// Short kind label: `exact`, `glob`, `graphite` or `re`.
    pub fn kind(&self) -> &'static str {
        match self {
            Pattern::Literal(_) => "exact",
            Pattern::Glob { .. } => "glob",
            Pattern::Graphite { .. } => "graphite",
            Pattern::Regex { .. } => "re",
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Pattern::Literal(a), Pattern::Literal(b)) => a == b,
            (Pattern::Glob { source: a, .. }, Pattern::Glob { source: b, .. }) => a == b,
            (Pattern::Graphite { source: a, .. }, Pattern::Graphite { source: b, .. }) => a == b,
            (Pattern::Regex { source: a, .. }, Pattern::Regex { source: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Pattern {}

/// Byte-oriented, like the tags it runs against.
fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).unicode(false).build()
}

/// Translate a glob into an anchored regex.
///
/// Only `.` is escaped; `*` becomes `.*` and `?` becomes `.`. Every other
/// byte passes through, so regex metacharacters keep their meaning.
pub(crate) fn glob_to_regex(glob: &[u8]) -> String {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');
    for &b in glob {
        match b {
            b'*' => out.push_str(".*"),
            b'?' => out.push('.'),
            b'.' => out.push_str("\\."),
            b if b.is_ascii() => out.push(char::from(b)),
            b => {
                let _ = write!(out, "\\x{b:02x}");
            }
        }
    }
    out.push('$');
    out
}

/// Translate a graphite pattern into an anchored regex.
///
/// Everything but the wildcards and braces is matched literally. An
/// unclosed `{` leaves an open group, which fails to compile.
pub(crate) fn graphite_to_regex(pattern: &[u8]) -> String {
    let mut out = String::with_capacity(pattern.len() * 3 + 2);
    out.push('^');
    let mut depth = 0usize;
    let mut i = 0;
    while i < pattern.len() {
        match pattern[i] {
            b'*' if pattern.get(i + 1) == Some(&b'*') => {
                out.push_str(".*");
                i += 1;
            }
            b'*' => out.push_str("[^.]*"),
            b'?' => out.push_str("[^.]"),
            b'{' => {
                depth += 1;
                out.push_str("(?:");
            }
            b'}' if depth > 0 => {
                depth -= 1;
                out.push(')');
            }
            b',' if depth > 0 => out.push('|'),
            b if b.is_ascii() => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(char::from(b).encode_utf8(&mut buf)));
            }
            b => {
                let _ = write!(out, "\\x{b:02x}");
            }
        }
        i += 1;
    }
    out.push('$');
    out
}

/// True if the bytes hold glob metacharacters.
pub(crate) fn has_glob_chars(bytes: &[u8]) -> bool {
    bytes.iter().any(|b| matches!(b, b'*' | b'?'))
}

/// Find the end of a `/regex/` part starting at `input[0] == '/'`.
///
/// Returns the index of the closing `/`. The body may nest `()`, `[]` and
/// `{}` and escape with `\`; a `,` or `)` at nesting depth zero means this
/// is not a regex after all.
pub(crate) fn scan_regex(input: &[u8], side: Side) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_class = false;
    let mut i = 1;
    while i < input.len() {
        let b = input[i];
        if b == b'\\' {
            i += 2;
            continue;
        }
        if in_class {
            in_class = b != b']';
        } else {
            match b {
                b'[' => in_class = true,
                b'(' | b'{' => depth += 1,
                b')' | b'}' if depth > 0 => depth -= 1,
                b')' | b',' if depth == 0 => return None,
                b'/' if depth == 0 && i > 1 && side.is_terminator(input.get(i + 1).copied()) => {
                    return Some(i)
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_translation() {
        assert_eq!(glob_to_regex(b"f*.b?r"), "^f.*\\.b.r$");
        assert_eq!(glob_to_regex(b"(x)"), "^(x)$");
    }

    #[test]
    fn test_glob_matches_whole_subject() {
        let p = Pattern::glob("*bar").unwrap();
        assert!(p.matches(b"foobar"));
        assert!(!p.matches(b"foobarx"));
        let p = Pattern::glob("a.?").unwrap();
        assert!(p.matches(b"a.b"));
        assert!(!p.matches(b"axb"));
    }

    #[test]
    fn test_glob_keeps_regex_metachars() {
        // the inner ^ can never match mid-subject
        let p = Pattern::glob("/foo/(^(?:[0-9]{2}-)/(.+)$)").unwrap();
        assert!(!p.matches(b"/foo/(^(?:[0-9]{2}-)/(.+)$)"));
    }

    #[test]
    fn test_graphite_translation() {
        assert_eq!(graphite_to_regex(b"f1.*.f6"), "^f1\\.[^.]*\\.f6$");
        assert_eq!(graphite_to_regex(b"f1.**"), "^f1\\..*$");
        assert_eq!(graphite_to_regex(b"a.{b,c}?"), "^a\\.(?:b|c)[^.]$");
        assert_eq!(graphite_to_regex(b"a}b"), "^a\\}b$");
    }

    #[test]
    fn test_graphite_segments() {
        let p = Pattern::graphite("f1.*.f3").unwrap();
        assert!(p.matches(b"f1.f2.f3"));
        assert!(!p.matches(b"f1.f2.x.f3"));
        let p = Pattern::graphite("f1.**.f3").unwrap();
        assert!(p.matches(b"f1.f2.x.f3"));
        let p = Pattern::graphite("f{1,2{a,b}}.x").unwrap();
        assert!(p.matches(b"f2b.x"));
        assert!(p.matches(b"f1.x"));
        assert!(!p.matches(b"f2.x"));
        assert!(Pattern::graphite("f{1,2").is_err());
    }

    #[test]
    fn test_regex_unanchored() {
        let p = Pattern::regex("ba(.?)r").unwrap();
        assert!(p.matches(b"xxbarxx"));
        assert!(p.matches(b"baar"));
        assert!(!p.matches(b"bzzr"));
    }

    #[test]
    fn test_literal_exact() {
        let p = Pattern::Literal(b"bar".to_vec());
        assert!(p.matches(b"bar"));
        assert!(!p.matches(b"barn"));
        assert_eq!(p.kind(), "exact");
    }

    #[test]
    fn test_scan_regex() {
        assert_eq!(scan_regex(b"/^f(o{2})$/:x", Side::Category), Some(10));
        assert_eq!(scan_regex(b"/(b|a){2,2}r/)", Side::Value), Some(12));
        assert_eq!(scan_regex(b"/value)", Side::Value), None);
        assert_eq!(scan_regex(b"/)", Side::Value), None);
        assert_eq!(scan_regex(b"/value,bar:/x/)", Side::Value), None);
        assert_eq!(scan_regex(b"/endpoint`latency:/bar)", Side::Category), None);
        assert_eq!(scan_regex(b"/a\\/b/", Side::Value), Some(5));
        assert_eq!(scan_regex(b"/[,)]/", Side::Value), Some(5));
    }

    #[test]
    fn test_pattern_eq_ignores_compiled_form() {
        assert_eq!(Pattern::glob("a*").unwrap(), Pattern::glob("a*").unwrap());
        assert_ne!(Pattern::glob("a*").unwrap(), Pattern::regex("a*").unwrap());
    }
}
