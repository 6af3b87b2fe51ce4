//! Error types for the metric tag library.
//!
//! Every failure mode here describes malformed input. Callers processing
//! untrusted lines are expected to drop the offending record and count it,
//! so each error carries a stable label suitable for a counter key.

use thiserror::Error;

/// Convenience type alias for Results using [`TagError`].
pub type Result<T, E = TagError> = std::result::Result<T, E>;

/// Errors raised while encoding, decoding or collecting tags.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TagError {
    /// No `:` separating category from value.
    #[error("tag has no category/value separator")]
    MissingSeparator,

    /// The category half was empty.
    #[error("tag has an empty category")]
    EmptyCategory,

    /// A `b"` block was not closed by a `"`.
    #[error("unterminated b\"...\" block at byte {position}")]
    UnterminatedBlock {
        /// Offset of the opening `b"`.
        position: usize,
    },

    /// Garbage followed a closed `b"..."` block.
    #[error("unexpected byte {byte:#04x} after b\"...\" block at byte {position}")]
    TrailingAfterBlock {
        /// The unexpected byte.
        byte: u8,
        /// Offset of the unexpected byte.
        position: usize,
    },

    /// The contents of a `b"..."` block were not valid base64.
    #[error("invalid base64 in tag: {0}")]
    InvalidBase64(String),

    /// A raw byte outside the taggable set.
    #[error("illegal tag character {byte:#04x} at byte {position}")]
    InvalidCharacter {
        /// The invalid byte.
        byte: u8,
        /// Offset within the encoded tag.
        position: usize,
    },

    /// A decoded category contained the internal separator byte.
    #[error("decoded category contains the separator byte")]
    SeparatorInCategory,

    /// The pair exceeded the maximum pair length.
    #[error("tag too long: {actual} bytes (limit: {limit})")]
    TooLong {
        /// Decoded pair length.
        actual: usize,
        /// Applicable limit.
        limit: usize,
    },

    /// More tags than a tag set can hold.
    #[error("too many tags: limit is {limit}")]
    TooManyTags {
        /// Maximum number of tags.
        limit: usize,
    },
}

impl TagError {
    /// Stable label for counters and structured logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingSeparator => "missing_separator",
            Self::EmptyCategory => "empty_category",
            Self::UnterminatedBlock { .. } => "unterminated_block",
            Self::TrailingAfterBlock { .. } => "trailing_after_block",
            Self::InvalidBase64(_) => "invalid_base64",
            Self::InvalidCharacter { .. } => "invalid_character",
            Self::SeparatorInCategory => "separator_in_category",
            Self::TooLong { .. } => "too_long",
            Self::TooManyTags { .. } => "too_many_tags",
        }
    }
}

/// Errors raised by name canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CanonicalizeError {
    /// Input name longer than the maximum metric name length.
    #[error("metric name too long: {actual} bytes (limit: {limit})")]
    NameTooLong {
        /// Input length.
        actual: usize,
        /// Maximum accepted length.
        limit: usize,
    },

    /// A `|ST[` or `|MT{` marker remained after all trailing blocks were taken.
    #[error("stray tag block marker at byte {position}")]
    StrayMarker {
        /// Offset of the first leftover marker.
        position: usize,
    },

    /// The bare name was empty after cleaning.
    #[error("metric name is empty")]
    EmptyName,

    /// A tag inside one of the blocks could not be decoded.
    #[error("invalid tag: {0}")]
    Tag(#[from] TagError),

    /// The canonical output exceeded the maximum metric name length.
    #[error("canonical name too long: {actual} bytes (limit: {limit})")]
    OutputTooLong {
        /// Output length.
        actual: usize,
        /// Maximum accepted length.
        limit: usize,
    },
}

impl CanonicalizeError {
    /// Stable label for counters and structured logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NameTooLong { .. } => "name_too_long",
            Self::StrayMarker { .. } => "stray_marker",
            Self::EmptyName => "empty_name",
            Self::Tag(e) => e.error_code(),
            Self::OutputTooLong { .. } => "output_too_long",
        }
    }
}

/// Kind of tag-search parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SearchErrorKind {
    /// Input ended before the expression was complete.
    #[error("unexpected end of query")]
    UnexpectedEnd,

    /// A bare match appeared where only `and`/`or`/`not` is allowed.
    #[error("expected and(), or() or not()")]
    ExpectedOperator,

    /// A closing parenthesis was expected.
    #[error("expected ')'")]
    ExpectedClose,

    /// A pattern part was empty or contained an illegal character.
    #[error("invalid pattern")]
    InvalidPattern,

    /// An encoded `b"`, `b/` or `b!` part held invalid base64.
    #[error("invalid base64 pattern")]
    InvalidBase64,

    /// A regex or translated glob failed to compile.
    #[error("invalid regex: {0}")]
    InvalidRegex(String),

    /// Characters remained after the root expression.
    #[error("trailing characters after query")]
    TrailingInput,

    /// Operators nested deeper than the parser allows.
    #[error("query nested too deeply")]
    TooDeep,
}

/// A tag-search query failed to parse.
///
/// `offset` is the byte position in the query where parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at byte {offset}")]
pub struct SearchParseError {
    /// Byte offset into the query string.
    pub offset: usize,
    /// What went wrong.
    pub kind: SearchErrorKind,
}

impl SearchParseError {
    pub(crate) fn new(offset: usize, kind: SearchErrorKind) -> Self {
        Self { offset, kind }
    }

    /// Stable label for counters and structured logs.
    pub fn error_code(&self) -> &'static str {
        match self.kind {
            SearchErrorKind::UnexpectedEnd => "unexpected_end",
            SearchErrorKind::ExpectedOperator => "expected_operator",
            SearchErrorKind::ExpectedClose => "expected_close",
            SearchErrorKind::InvalidPattern => "invalid_pattern",
            SearchErrorKind::InvalidBase64 => "invalid_base64",
            SearchErrorKind::InvalidRegex(_) => "invalid_regex",
            SearchErrorKind::TrailingInput => "trailing_input",
            SearchErrorKind::TooDeep => "too_deep",
        }
    }
}

/// Errors raised by the metric line decoder.
///
/// Each variant maps to a stable negative code through [`DecodeError::code`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// No timestamp field.
    #[error("missing timestamp field")]
    MissingTimestamp,
    /// No check identity field.
    #[error("missing identity field")]
    MissingIdentity,
    /// No metric name field.
    #[error("missing metric name field")]
    MissingName,
    /// No metric type field.
    #[error("missing metric type field")]
    MissingType,
    /// No metric value field.
    #[error("missing metric value field")]
    MissingValue,
    /// Identity shorter than a UUID.
    #[error("identity field too short: {0} bytes")]
    IdentityTooShort(usize),
    /// Tag blocks in the name could not be processed.
    #[error("invalid tags in metric name: {0}")]
    InvalidTags(#[source] CanonicalizeError),
    /// The identity did not end with a valid UUID.
    #[error("invalid check uuid")]
    InvalidUuid,
    /// Metric type character not recognized.
    #[error("unknown metric type {0:?}")]
    UnknownValueType(char),
    /// Metric name exceeds the maximum length.
    #[error("metric name too long: {0} bytes")]
    NameTooLong(usize),
    /// A text field was not valid UTF-8.
    #[error("invalid utf-8 in field")]
    InvalidUtf8,
    /// First byte does not name a known record type.
    #[error("unknown record type {0:?}")]
    UnknownRecordType(char),
}

impl DecodeError {
    /// Stable negative code, one per failure mode.
    pub fn code(&self) -> i32 {
        match self {
            Self::MissingTimestamp => -1,
            Self::MissingIdentity => -2,
            Self::MissingName => -3,
            Self::MissingType => -4,
            Self::MissingValue => -5,
            Self::IdentityTooShort(_) => -6,
            Self::InvalidTags(_) => -7,
            Self::InvalidUuid => -8,
            Self::UnknownValueType(_) => -9,
            Self::NameTooLong(_) => -10,
            Self::InvalidUtf8 => -11,
            Self::UnknownRecordType(_) => -12,
        }
    }

    /// Stable label for counters and structured logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingTimestamp => "missing_timestamp",
            Self::MissingIdentity => "missing_identity",
            Self::MissingName => "missing_name",
            Self::MissingType => "missing_type",
            Self::MissingValue => "missing_value",
            Self::IdentityTooShort(_) => "identity_too_short",
            Self::InvalidTags(_) => "invalid_tags",
            Self::InvalidUuid => "invalid_uuid",
            Self::UnknownValueType(_) => "unknown_value_type",
            Self::NameTooLong(_) => "name_too_long",
            Self::InvalidUtf8 => "invalid_utf8",
            Self::UnknownRecordType(_) => "unknown_record_type",
        }
    }
}

/// Errors from the newline framing codec.
#[cfg(feature = "tokio")]
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LineError {
    /// I/O error while reading.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Line exceeded the configured maximum length.
    #[error("line too long: {actual} bytes (limit: {limit})")]
    LineTooLong {
        /// Actual length seen so far.
        actual: usize,
        /// Configured limit.
        limit: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_codes_are_distinct() {
        let all = [
            DecodeError::MissingTimestamp,
            DecodeError::MissingIdentity,
            DecodeError::MissingName,
            DecodeError::MissingType,
            DecodeError::MissingValue,
            DecodeError::IdentityTooShort(3),
            DecodeError::InvalidTags(CanonicalizeError::EmptyName),
            DecodeError::InvalidUuid,
            DecodeError::UnknownValueType('x'),
            DecodeError::NameTooLong(5000),
            DecodeError::InvalidUtf8,
            DecodeError::UnknownRecordType('Q'),
        ];
        let mut codes: Vec<i32> = all.iter().map(DecodeError::code).collect();
        assert!(codes.iter().all(|c| *c < 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn test_search_error_display_includes_offset() {
        let err = SearchParseError::new(7, SearchErrorKind::ExpectedClose);
        assert_eq!(err.to_string(), "expected ')' at byte 7");
        assert_eq!(err.error_code(), "expected_close");
    }

    #[test]
    fn test_canonicalize_error_code_forwards_tag_code() {
        let err = CanonicalizeError::from(TagError::EmptyCategory);
        assert_eq!(err.error_code(), "empty_category");
    }
}
