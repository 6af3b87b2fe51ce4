//! Canonical form of tagged metric names.
//!
//! A tagged name is `<name>|ST[<tags>]|MT{<tags>}`. Inputs may carry several
//! trailing tag blocks in any order; the canonical form has at most one of
//! each, stream first, every tag set sorted and deduplicated, and a bare
//! name free of control characters.

use std::borrow::Cow;
use std::fmt;

use smallvec::SmallVec;

use crate::error::CanonicalizeError;
use crate::tag::{decode_parts, truncate_pair, Tag, TagLimit, TagSet, TagSetBuilder};

/// Maximum length of a metric name, tag blocks included.
pub const MAX_METRIC_NAME_LEN: usize = 4096;

/// Opening marker of a stream tag block.
pub const STREAM_TAG_OPEN: &str = "|ST[";
/// Opening marker of a measurement tag block.
pub const MEASUREMENT_TAG_OPEN: &str = "|MT{";

type Result<T, E = CanonicalizeError> = std::result::Result<T, E>;

/// A metric name split into its bare name and decoded tag sets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaggedName<'a> {
    name: Cow<'a, str>,
    stream: TagSet<'a>,
    measurement: TagSet<'a>,
}

impl<'a> TaggedName<'a> {
    /// Split `input` into name, stream tags and measurement tags.
    ///
    /// Over-long tags are shortened with a `_tldr_` digest suffix rather
    /// than dropped.
    ///
    /// # Errors
    ///
    /// Fails if `input` exceeds [`MAX_METRIC_NAME_LEN`], a tag marker is
    /// left after taking every trailing block, a tag is malformed, there
    /// are too many tags, or the cleaned name is empty.
    pub fn parse(input: &'a str) -> Result<Self> {
        if input.len() > MAX_METRIC_NAME_LEN {
            return Err(CanonicalizeError::NameTooLong {
                actual: input.len(),
                limit: MAX_METRIC_NAME_LEN,
            });
        }

        let mut rest = input;
        let mut stream_blocks: SmallVec<[&str; 2]> = SmallVec::new();
        let mut measurement_blocks: SmallVec<[&str; 2]> = SmallVec::new();
        loop {
            if let Some((head, body)) = take_trailing_block(rest, STREAM_TAG_OPEN, ']') {
                stream_blocks.push(body);
                rest = head;
            } else if let Some((head, body)) =
                take_trailing_block(rest, MEASUREMENT_TAG_OPEN, '}')
            {
                measurement_blocks.push(body);
                rest = head;
            } else {
                break;
            }
        }

        let stray = [STREAM_TAG_OPEN, MEASUREMENT_TAG_OPEN]
            .iter()
            .filter_map(|marker| rest.find(marker))
            .min();
        if let Some(position) = stray {
            return Err(CanonicalizeError::StrayMarker { position });
        }

        let name = clean_name(rest);
        if name.is_empty() {
            return Err(CanonicalizeError::EmptyName);
        }

        // blocks were collected back to front
        Ok(Self {
            name,
            stream: collect_blocks(stream_blocks.into_iter().rev())?,
            measurement: collect_blocks(measurement_blocks.into_iter().rev())?,
        })
    }

    /// The cleaned bare name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stream tags (`|ST[...]`).
    pub fn stream(&self) -> &TagSet<'a> {
        &self.stream
    }

    /// Measurement tags (`|MT{...}`).
    pub fn measurement(&self) -> &TagSet<'a> {
        &self.measurement
    }

    /// Append the canonical rendering to `out`.
    pub fn write_canonical(&self, out: &mut String) {
        out.push_str(&self.name);
        if !self.stream.is_empty() {
            out.push_str(STREAM_TAG_OPEN);
            self.stream.write_canonical(out);
            out.push(']');
        }
        if !self.measurement.is_empty() {
            out.push_str(MEASUREMENT_TAG_OPEN);
            self.measurement.write_canonical(out);
            out.push('}');
        }
    }

    /// Render the canonical form, enforcing the length limit.
    pub fn to_canonical(&self) -> Result<String> {
        let mut out = String::with_capacity(
            self.name.len()
                + self.stream.canonical_size()
                + self.measurement.canonical_size()
                + self.stream.len()
                + self.measurement.len()
                + 2 * STREAM_TAG_OPEN.len(),
        );
        self.write_canonical(&mut out);
        if out.len() > MAX_METRIC_NAME_LEN {
            return Err(CanonicalizeError::OutputTooLong {
                actual: out.len(),
                limit: MAX_METRIC_NAME_LEN,
            });
        }
        Ok(out)
    }

    /// Detach from the source buffer.
    pub fn into_owned(self) -> TaggedName<'static> {
        TaggedName {
            name: Cow::Owned(self.name.into_owned()),
            stream: self.stream.into_owned(),
            measurement: self.measurement.into_owned(),
        }
    }
}

impl fmt::Display for TaggedName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_canonical(&mut out);
        f.write_str(&out)
    }
}

/// Canonicalize a tagged metric name.
///
/// Returns the input unchanged, borrowed, when it is already canonical.
///
/// ```
/// use metric_tags::canonicalize;
///
/// let out = canonicalize("woop|ST[a:b,c:d]|MT{foo:bar}|ST[c:d,e:f,a:b]").unwrap();
/// assert_eq!(out, "woop|ST[a:b,c:d,e:f]|MT{foo:bar}");
/// ```
pub fn canonicalize(input: &str) -> Result<Cow<'_, str>> {
    let canonical = TaggedName::parse(input)?.to_canonical()?;
    if canonical == input {
        Ok(Cow::Borrowed(input))
    } else {
        Ok(Cow::Owned(canonical))
    }
}

/// Take a well-formed block `<open>body<close>` ending `s`.
fn take_trailing_block<'s>(s: &'s str, open: &str, close: char) -> Option<(&'s str, &'s str)> {
    let inner = s.strip_suffix(close)?;
    let start = inner.rfind(open)?;
    let body = &inner[start + open.len()..];
    if body.contains(close) {
        return None;
    }
    Some((&s[..start], body))
}

fn collect_blocks<'a>(blocks: impl Iterator<Item = &'a str>) -> Result<TagSet<'a>> {
    let mut builder = TagSetBuilder::new(TagLimit::Standard);
    for block in blocks {
        for encoded in block.split(',').filter(|s| !s.is_empty()) {
            let (category, value) = decode_parts(encoded.as_bytes(), true)?;
            let (category, value) = truncate_pair(category, value);
            builder.add(Tag::new(category, value)?)?;
        }
    }
    Ok(builder.finish())
}

/// Replace ASCII control bytes with spaces, then trim spaces.
fn clean_name(raw: &str) -> Cow<'_, str> {
    let is_dirty = |b: u8| b.is_ascii_control();
    if !raw.bytes().any(is_dirty) {
        return Cow::Borrowed(raw.trim_matches(' '));
    }
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_control() { ' ' } else { c })
        .collect();
    let trimmed = cleaned.trim_matches(' ');
    if trimmed.len() == cleaned.len() {
        Cow::Owned(cleaned)
    } else {
        Cow::Owned(trimmed.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name_borrowed() {
        let out = canonicalize("simple string with spaces").unwrap();
        assert!(matches!(out, Cow::Borrowed("simple string with spaces")));
    }

    #[test]
    fn test_canonical_input_borrowed() {
        let input = "woop|ST[a:b,c:d,e:f]|MT{foo:bar}";
        assert!(matches!(canonicalize(input).unwrap(), Cow::Borrowed(_)));
    }

    #[test]
    fn test_take_trailing_block() {
        assert_eq!(
            take_trailing_block("m|ST[a:b]", STREAM_TAG_OPEN, ']'),
            Some(("m", "a:b"))
        );
        assert_eq!(take_trailing_block("m|ST[a:b] ", STREAM_TAG_OPEN, ']'), None);
        assert_eq!(take_trailing_block("m|MT{a:b}", STREAM_TAG_OPEN, ']'), None);
    }

    #[test]
    fn test_stray_marker_position() {
        let err = canonicalize("trailing space|ST[foo:bar] ").unwrap_err();
        assert_eq!(err, CanonicalizeError::StrayMarker { position: 14 });
    }

    #[test]
    fn test_interior_marker_rejected() {
        assert!(canonicalize("a|ST[x:y]b|ST[c:d]").is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        assert_eq!(
            canonicalize(" \t|ST[a:b]").unwrap_err(),
            CanonicalizeError::EmptyName
        );
    }

    #[test]
    fn test_too_long_input() {
        let name = "n".repeat(MAX_METRIC_NAME_LEN + 1);
        assert!(matches!(
            canonicalize(&name),
            Err(CanonicalizeError::NameTooLong { .. })
        ));
    }

    #[test]
    fn test_clean_name_keeps_utf8() {
        assert_eq!(clean_name("\tcafé\u{7f}"), "café");
        assert_eq!(clean_name("a\u{1}b"), "a b");
    }

    #[test]
    fn test_parts_exposed() {
        let tagged = TaggedName::parse("m|ST[b:2,a:1]|MT{u:ms}").unwrap();
        assert_eq!(tagged.name(), "m");
        assert_eq!(tagged.stream().canonical(), "a:1,b:2");
        assert_eq!(tagged.measurement().canonical(), "u:ms");
        assert_eq!(tagged.to_string(), "m|ST[a:1,b:2]|MT{u:ms}");
    }

    #[test]
    fn test_empty_block_dropped() {
        assert_eq!(canonicalize("m|ST[]").unwrap(), "m");
    }
}
