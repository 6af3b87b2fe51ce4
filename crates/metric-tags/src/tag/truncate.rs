//! Shortening of over-long tags.
//!
//! A cut half keeps a prefix and ends in `_tldr_` plus the hex SHA-1 of the
//! full original half, so distinct long tags stay distinct after the cut.

use std::borrow::Cow;
use std::fmt::Write as _;

use sha1::{Digest, Sha1};

use super::codec::MAX_TAG_PAIR_LEN;

/// Marker placed between the kept prefix and the digest.
pub const TLDR_MARKER: &str = "_tldr_";

/// A category is cut to this length when its pair is too long.
pub const MAX_TRUNCATED_CATEGORY_LEN: usize = 128;

const DIGEST_HEX_LEN: usize = 40;
const SUFFIX_LEN: usize = TLDR_MARKER.len() + DIGEST_HEX_LEN;

/// Shorten `half` to exactly `target` bytes.
fn tldr(half: &[u8], target: usize) -> Vec<u8> {
    let keep = target.saturating_sub(SUFFIX_LEN);
    let digest = Sha1::digest(half);
    let mut hex = String::with_capacity(DIGEST_HEX_LEN);
    for b in digest {
        let _ = write!(hex, "{b:02x}");
    }
    let mut out = Vec::with_capacity(keep + SUFFIX_LEN);
    out.extend_from_slice(&half[..keep.min(half.len())]);
    out.extend_from_slice(TLDR_MARKER.as_bytes());
    out.extend_from_slice(hex.as_bytes());
    out
}

/// Fit a decoded pair into the standard pair limit.
///
/// Pairs already within the limit are returned untouched. Otherwise a
/// category over [`MAX_TRUNCATED_CATEGORY_LEN`] is cut to that length
/// first, then the value is cut to whatever room is left.
pub fn truncate_pair<'a>(
    category: Cow<'a, [u8]>,
    value: Cow<'a, [u8]>,
) -> (Cow<'a, [u8]>, Cow<'a, [u8]>) {
    if category.len() + 1 + value.len() <= MAX_TAG_PAIR_LEN {
        return (category, value);
    }
    let category = if category.len() > MAX_TRUNCATED_CATEGORY_LEN {
        Cow::Owned(tldr(&category, MAX_TRUNCATED_CATEGORY_LEN))
    } else {
        category
    };
    let room = MAX_TAG_PAIR_LEN - category.len() - 1;
    let value = if value.len() > room {
        Cow::Owned(tldr(&value, room))
    } else {
        value
    };
    (category, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_CAT: &str = "superlongtagthatismorethan256characterstotal";

    #[test]
    fn test_short_pair_untouched() {
        let (c, v) = truncate_pair(Cow::Borrowed(b"a"), Cow::Borrowed(b"b"));
        assert!(matches!(c, Cow::Borrowed(_)));
        assert!(matches!(v, Cow::Borrowed(_)));
    }

    #[test]
    fn test_long_value_cut() {
        let value = vec![b'x'; 355];
        let (c, v) = truncate_pair(Cow::Borrowed(LONG_CAT.as_bytes()), Cow::Owned(value));
        assert_eq!(c.len(), 44);
        assert_eq!(v.len(), 211);
        assert_eq!(c.len() + 1 + v.len(), MAX_TAG_PAIR_LEN);
        let expected = format!(
            "{}_tldr_8e2bd46fa751af2d2b093c2f5465f786cbe2b8a9",
            "x".repeat(165)
        );
        assert_eq!(&v[..], expected.as_bytes());
    }

    #[test]
    fn test_long_category_cut_first() {
        let category = vec![b'y'; 267];
        let value = vec![b'x'; 355];
        let (c, v) = truncate_pair(Cow::Owned(category), Cow::Owned(value));
        assert_eq!(c.len(), MAX_TRUNCATED_CATEGORY_LEN);
        assert_eq!(v.len(), 127);
        assert!(!c.ends_with(TLDR_MARKER.as_bytes()));
        assert_eq!(&c[82..88], TLDR_MARKER.as_bytes());
    }

    #[test]
    fn test_long_category_short_value() {
        let category = vec![b'y'; 246];
        let value = vec![b'x'; 125];
        let (c, v) = truncate_pair(Cow::Owned(category), Cow::Owned(value));
        assert_eq!(c.len(), MAX_TRUNCATED_CATEGORY_LEN);
        assert_eq!(v.len(), 125);
    }
}
