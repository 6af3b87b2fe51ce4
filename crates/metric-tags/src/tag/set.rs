//! Tags and ordered, deduplicated tag sets.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::iter;

use super::codec::{self, TagLimit, MAX_TAGS, TAG_SEPARATOR};
use crate::error::{Result, TagError};

/// A decoded `category:value` pair.
///
/// Halves that were raw on the wire borrow from the source text; halves
/// that arrived base64 encoded are owned.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tag<'a> {
    category: Cow<'a, [u8]>,
    value: Cow<'a, [u8]>,
}

impl<'a> Tag<'a> {
    /// Build a tag from decoded halves.
    pub fn new(
        category: impl Into<Cow<'a, [u8]>>,
        value: impl Into<Cow<'a, [u8]>>,
    ) -> Result<Self> {
        let category = category.into();
        if category.is_empty() {
            return Err(TagError::EmptyCategory);
        }
        if category.contains(&TAG_SEPARATOR) {
            return Err(TagError::SeparatorInCategory);
        }
        Ok(Self {
            category,
            value: value.into(),
        })
    }

    /// Parse one encoded tag. A tag without `:` has an empty value.
    ///
    /// # Errors
    ///
    /// Returns [`TagError::TooLong`] when the decoded pair exceeds `limit`,
    /// which tag-set parsing treats as "drop this tag" rather than failure.
    pub fn parse(encoded: &'a str, limit: TagLimit) -> Result<Self> {
        let (category, value) = codec::decode_parts(encoded.as_bytes(), true)?;
        let tag = Self { category, value };
        let total = tag.total_size();
        if total > limit.max_pair_len() {
            return Err(TagError::TooLong {
                actual: total,
                limit: limit.max_pair_len(),
            });
        }
        Ok(tag)
    }

    /// Decoded category bytes.
    pub fn category(&self) -> &[u8] {
        &self.category
    }

    /// Decoded value bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Decoded pair length, separator included.
    pub fn total_size(&self) -> usize {
        self.category.len() + 1 + self.value.len()
    }

    /// Category length plus the separator; the value starts here.
    pub fn category_size(&self) -> usize {
        self.category.len() + 1
    }

    /// Length of the wire form.
    pub fn encoded_len(&self) -> usize {
        codec::encoded_len(&self.category, &self.value)
    }

    /// The decoded `category 0x1F value` bytes.
    pub fn decoded(&self) -> Vec<u8> {
        self.decoded_bytes().copied().collect()
    }

    fn decoded_bytes(&self) -> impl Iterator<Item = &u8> {
        self.category
            .iter()
            .chain(iter::once(&TAG_SEPARATOR))
            .chain(self.value.iter())
    }

    /// Append the wire form to `out`.
    pub fn write_encoded(&self, out: &mut String) {
        codec::write_encoded(&self.category, &self.value, out);
    }

    /// The wire form.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.encoded_len());
        self.write_encoded(&mut out);
        out
    }

    /// Detach from the source buffer.
    pub fn into_owned(self) -> Tag<'static> {
        Tag {
            category: Cow::Owned(self.category.into_owned()),
            value: Cow::Owned(self.value.into_owned()),
        }
    }
}

/// Orders by decoded bytes, `category 0x1F value`, shorter first on a
/// common prefix.
impl Ord for Tag<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_any(other)
    }
}

impl PartialOrd for Tag<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Tag<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// A compacted tag set: sorted by decoded bytes, exact duplicates removed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagSet<'a> {
    tags: Vec<Tag<'a>>,
    canonical_size: usize,
}

impl<'a> TagSet<'a> {
    /// An empty tag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-separated list of encoded tags.
    ///
    /// Tags over `limit` are dropped; any other invalid tag fails the parse.
    pub fn parse(list: &'a str, limit: TagLimit) -> Result<Self> {
        let mut builder = TagSetBuilder::new(limit);
        builder.add_many(list)?;
        Ok(builder.finish())
    }

    /// Tags in canonical order.
    pub fn tags(&self) -> &[Tag<'a>] {
        &self.tags
    }

    /// Iterate tags in canonical order.
    pub fn iter(&self) -> std::slice::Iter<'_, Tag<'a>> {
        self.tags.iter()
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// True when there are no tags.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Sum of the encoded lengths of all tags, separators excluded.
    pub fn canonical_size(&self) -> usize {
        self.canonical_size
    }

    /// True if an identical tag is present.
    pub fn contains(&self, tag: &Tag<'_>) -> bool {
        self.tags.binary_search_by(|t| t.cmp_any(tag)).is_ok()
    }

    /// Append the comma-joined canonical form to `out`.
    pub fn write_canonical(&self, out: &mut String) {
        for (i, tag) in self.tags.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            tag.write_encoded(out);
        }
    }

    /// The comma-joined canonical form.
    pub fn canonical(&self) -> String {
        let mut out = String::with_capacity(self.canonical_size + self.tags.len());
        self.write_canonical(&mut out);
        out
    }

    /// Detach from the source buffer.
    pub fn into_owned(self) -> TagSet<'static> {
        TagSet {
            tags: self.tags.into_iter().map(Tag::into_owned).collect(),
            canonical_size: self.canonical_size,
        }
    }
}

impl Tag<'_> {
    fn cmp_any(&self, other: &Tag<'_>) -> Ordering {
        self.decoded_bytes().cmp(other.decoded_bytes())
    }
}

impl<'s, 'a> IntoIterator for &'s TagSet<'a> {
    type Item = &'s Tag<'a>;
    type IntoIter = std::slice::Iter<'s, Tag<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

impl fmt::Display for TagSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Accumulates tags from one or more sources, then compacts once.
///
/// A name can carry several `|ST[...]` blocks appended at different points
/// in a pipeline; all of them feed one builder.
#[derive(Debug, Default)]
pub struct TagSetBuilder<'a> {
    tags: Vec<Tag<'a>>,
    limit: TagLimit,
    dropped: usize,
}

impl<'a> TagSetBuilder<'a> {
    /// A builder applying `limit` to every encoded tag it parses.
    pub fn new(limit: TagLimit) -> Self {
        Self {
            tags: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    /// Add an already decoded tag.
    pub fn add(&mut self, tag: Tag<'a>) -> Result<()> {
        if tag.total_size() > self.limit.max_pair_len() {
            self.dropped += 1;
            return Ok(());
        }
        self.push(tag)
    }

    /// Add a system-injected tag, checked against the implicit limit.
    pub fn add_implicit(
        &mut self,
        category: impl Into<Cow<'a, [u8]>>,
        value: impl Into<Cow<'a, [u8]>>,
    ) -> Result<()> {
        let tag = Tag::new(category, value)?;
        if tag.total_size() > TagLimit::Implicit.max_pair_len() {
            self.dropped += 1;
            return Ok(());
        }
        self.push(tag)
    }

    /// Parse and add one encoded tag. An over-long tag is dropped.
    pub fn add_encoded(&mut self, encoded: &'a str) -> Result<()> {
        match Tag::parse(encoded, self.limit) {
            Ok(tag) => self.push(tag),
            Err(TagError::TooLong { .. }) => {
                self.dropped += 1;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Parse and add a comma-separated list. Empty entries are skipped.
    ///
    /// Stops at the first invalid tag; tags added before it are kept.
    /// Returns how many tags were added.
    pub fn add_many(&mut self, list: &'a str) -> Result<usize> {
        let before = self.tags.len();
        for encoded in list.split(',').filter(|s| !s.is_empty()) {
            self.add_encoded(encoded)?;
        }
        Ok(self.tags.len() - before)
    }

    fn push(&mut self, tag: Tag<'a>) -> Result<()> {
        if self.tags.len() >= MAX_TAGS {
            return Err(TagError::TooManyTags { limit: MAX_TAGS });
        }
        self.tags.push(tag);
        Ok(())
    }

    /// Tags accepted so far.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// True when nothing was accepted.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Tags dropped for exceeding the pair limit.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Sort, remove exact duplicates and compute the canonical size.
    pub fn finish(self) -> TagSet<'a> {
        let mut tags = self.tags;
        tags.sort();
        tags.dedup();
        let canonical_size = tags.iter().map(Tag::encoded_len).sum();
        TagSet {
            tags,
            canonical_size,
        }
    }

    /// Like [`finish`](Self::finish), also rendering the canonical string.
    pub fn finish_canonical(self) -> (TagSet<'a>, String) {
        let set = self.finish();
        let canonical = set.canonical();
        (set, canonical)
    }
}
