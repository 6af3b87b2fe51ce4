//! Tag encoding and tag sets.

mod codec;
mod set;
mod truncate;

pub use self::codec::{
    decode_tag, encode_tag, is_taggable_b64_char, is_taggable_key, is_taggable_key_char,
    is_taggable_value, is_taggable_value_char, TagLimit, MAX_IMPLICIT_TAG_PAIR_LEN,
    MAX_TAGS, MAX_TAG_PAIR_LEN, TAG_SEPARATOR,
};
pub use self::set::{Tag, TagSet, TagSetBuilder};
pub use self::truncate::{truncate_pair, MAX_TRUNCATED_CATEGORY_LEN, TLDR_MARKER};

pub(crate) use self::codec::{decode_parts, TAG_B64};
