//! Wire-safe textual encoding of a single tag.
//!
//! A decoded tag is `category 0x1F value`. On the wire each half is either
//! emitted raw, when every byte is in the taggable set for that half, or as
//! `b"<base64>"`.

use std::borrow::Cow;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;

use crate::error::{Result, TagError};

/// Internal separator between category and value in the decoded form.
pub const TAG_SEPARATOR: u8 = 0x1f;

/// Maximum decoded pair length (`category + 1 + value`) of a standard tag.
pub const MAX_TAG_PAIR_LEN: usize = 256;

/// Maximum decoded pair length of an implicit, system-injected tag.
pub const MAX_IMPLICIT_TAG_PAIR_LEN: usize = 4096;

/// Maximum number of tags accepted in one tag set.
pub const MAX_TAGS: usize = 256;

/// Base64 engine used for `b"..."` blocks. Padding is optional on decode and
/// non-zero trailing bits are ignored.
pub(crate) const TAG_B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Which pair-length limit applies to a tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TagLimit {
    /// Tags supplied in metric names.
    #[default]
    Standard,
    /// Tags injected by the system, such as `__name`.
    Implicit,
}

impl TagLimit {
    /// Maximum decoded pair length for this kind of tag.
    pub const fn max_pair_len(self) -> usize {
        match self {
            Self::Standard => MAX_TAG_PAIR_LEN,
            Self::Implicit => MAX_IMPLICIT_TAG_PAIR_LEN,
        }
    }
}

/// Returns true if `b` may appear raw in a category.
#[inline]
pub fn is_taggable_key_char(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'`' | b'+'
                | b'!'
                | b'@'
                | b'#'
                | b'$'
                | b'%'
                | b'^'
                | b'&'
                | b'"'
                | b'\''
                | b'/'
                | b'?'
                | b'.'
                | b'_'
                | b'-'
        )
}

/// Returns true if `b` may appear raw in a value.
#[inline]
pub fn is_taggable_value_char(b: u8) -> bool {
    is_taggable_key_char(b) || b == b':' || b == b'='
}

/// Returns true if `b` may appear inside a `b"..."` block.
#[inline]
pub fn is_taggable_b64_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=')
}

/// Returns true if every byte of `key` may appear raw in a category.
pub fn is_taggable_key(key: &[u8]) -> bool {
    key.iter().copied().all(is_taggable_key_char)
}

/// Returns true if every byte of `value` may appear raw in a value.
pub fn is_taggable_value(value: &[u8]) -> bool {
    value.iter().copied().all(is_taggable_value_char)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Half {
    Category,
    Value,
}

impl Half {
    fn allows(self, b: u8) -> bool {
        match self {
            Half::Category => is_taggable_key_char(b),
            Half::Value => is_taggable_value_char(b),
        }
    }
}

/// Splits an encoded tag at the first `:` that is not inside a `b"..."`
/// block. Returns `None` for the value when there is no separator.
fn split_encoded(encoded: &[u8]) -> Result<(&[u8], Option<&[u8]>)> {
    if encoded.starts_with(b"b\"") {
        let body = &encoded[2..];
        let close = match body.iter().position(|b| !is_taggable_b64_char(*b)) {
            Some(i) if body[i] == b'"' => i + 2,
            Some(i) => {
                return Err(TagError::InvalidCharacter {
                    byte: body[i],
                    position: i + 2,
                })
            }
            None => return Err(TagError::UnterminatedBlock { position: 0 }),
        };
        return match encoded.get(close + 1) {
            None => Ok((encoded, None)),
            Some(b':') => Ok((&encoded[..=close], Some(&encoded[close + 2..]))),
            Some(&byte) => Err(TagError::TrailingAfterBlock {
                byte,
                position: close + 1,
            }),
        };
    }
    match encoded.iter().position(|b| *b == b':') {
        Some(i) => Ok((&encoded[..i], Some(&encoded[i + 1..]))),
        None => Ok((encoded, None)),
    }
}

/// Decodes one half. `offset` is the position of `half` inside the full
/// encoded tag, for error reporting.
fn decode_half(half: &[u8], offset: usize, which: Half) -> Result<Cow<'_, [u8]>> {
    if half.starts_with(b"b\"") {
        let Some(inner) = half[2..].strip_suffix(b"\"") else {
            return Err(TagError::UnterminatedBlock { position: offset });
        };
        if let Some(i) = inner.iter().position(|b| !is_taggable_b64_char(*b)) {
            return Err(TagError::InvalidCharacter {
                byte: inner[i],
                position: offset + 2 + i,
            });
        }
        return TAG_B64
            .decode(inner)
            .map(Cow::Owned)
            .map_err(|e| TagError::InvalidBase64(e.to_string()));
    }
    if let Some(i) = half.iter().position(|b| !which.allows(*b)) {
        return Err(TagError::InvalidCharacter {
            byte: half[i],
            position: offset + i,
        });
    }
    Ok(Cow::Borrowed(half))
}

/// Decodes an encoded tag into its category and value halves.
///
/// With `bare_ok`, a tag without a `:` is a category with an empty value.
/// Raw halves borrow from `encoded`; base64 halves are owned.
pub(crate) fn decode_parts(
    encoded: &[u8],
    bare_ok: bool,
) -> Result<(Cow<'_, [u8]>, Cow<'_, [u8]>)> {
    let (cat, val) = split_encoded(encoded)?;
    let val = match val {
        Some(v) => v,
        None if bare_ok => &[],
        None => return Err(TagError::MissingSeparator),
    };
    let category = decode_half(cat, 0, Half::Category)?;
    if category.is_empty() {
        return Err(TagError::EmptyCategory);
    }
    if category.contains(&TAG_SEPARATOR) {
        return Err(TagError::SeparatorInCategory);
    }
    let value = decode_half(val, cat.len() + 1, Half::Value)?;
    Ok((category, value))
}

/// Decodes `category:value` wire form into `category 0x1F value`.
///
/// # Errors
///
/// Fails when the separator is missing, a `b"` block is unterminated or
/// holds invalid base64, a raw byte is outside the taggable set, the
/// category is empty, or the decoded pair exceeds `limit`.
pub fn decode_tag(encoded: &[u8], limit: TagLimit) -> Result<Vec<u8>> {
    let (category, value) = decode_parts(encoded, false)?;
    let total = category.len() + 1 + value.len();
    if total > limit.max_pair_len() {
        return Err(TagError::TooLong {
            actual: total,
            limit: limit.max_pair_len(),
        });
    }
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&category);
    out.push(TAG_SEPARATOR);
    out.extend_from_slice(&value);
    Ok(out)
}

/// Encodes `category 0x1F value` into `category:value` wire form.
///
/// # Errors
///
/// Fails when the input exceeds `limit`, has no separator, or has an
/// empty category.
pub fn encode_tag(decoded: &[u8], limit: TagLimit) -> Result<String> {
    if decoded.len() > limit.max_pair_len() {
        return Err(TagError::TooLong {
            actual: decoded.len(),
            limit: limit.max_pair_len(),
        });
    }
    let sep = decoded
        .iter()
        .position(|b| *b == TAG_SEPARATOR)
        .ok_or(TagError::MissingSeparator)?;
    let (category, value) = (&decoded[..sep], &decoded[sep + 1..]);
    if category.is_empty() {
        return Err(TagError::EmptyCategory);
    }
    let mut out = String::with_capacity(encoded_len(category, value));
    write_encoded(category, value, &mut out);
    Ok(out)
}

fn needs_b64(half: &[u8], which: Half) -> bool {
    half.starts_with(b"b\"") || !half.iter().all(|b| which.allows(*b))
}

fn encoded_half_len(half: &[u8], which: Half) -> usize {
    if needs_b64(half, which) {
        3 + half.len().div_ceil(3) * 4
    } else {
        half.len()
    }
}

fn write_half(half: &[u8], which: Half, out: &mut String) {
    if needs_b64(half, which) {
        out.push_str("b\"");
        TAG_B64.encode_string(half, out);
        out.push('"');
    } else {
        // taggable bytes are all ASCII
        out.extend(half.iter().map(|b| char::from(*b)));
    }
}

/// Length of the wire form of a decoded pair.
pub(crate) fn encoded_len(category: &[u8], value: &[u8]) -> usize {
    encoded_half_len(category, Half::Category) + 1 + encoded_half_len(value, Half::Value)
}

/// Appends the wire form of a decoded pair to `out`.
pub(crate) fn write_encoded(category: &[u8], value: &[u8], out: &mut String) {
    write_half(category, Half::Category, out);
    out.push(':');
    write_half(value, Half::Value, out);
}
