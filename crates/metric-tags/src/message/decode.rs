//! Single-pass decoder for tab-separated metric lines.
//!
//! ```text
//! M \t [source \t] <sec>.<ms> \t <target>`<module>`<name>`<uuid> \t <tagged name> \t <type> \t <value>
//! H \t [source \t] <sec>.<ms> \t <identity> \t <tagged name> \t <base64>
//! S|C|D \t [source \t] <sec>.<ms> \t <identity> \t <payload>
//! ```

use std::borrow::Cow;

use uuid::Uuid;

use super::types::{
    MessageType, MetricId, MetricMessage, MetricName, MetricValue, NoitField, ValueType,
};
use crate::canonical::{TaggedName, MAX_METRIC_NAME_LEN};
use crate::error::DecodeError;

const UUID_STR_LEN: usize = 36;
const NULL_VALUE: &str = "[[null]]";
/// Numeric values are parsed from at most this many bytes.
const MAX_NUMERIC_LEN: usize = 511;

type Result<T, E = DecodeError> = std::result::Result<T, E>;

/// Decode one line, without its trailing newline.
///
/// Metric names are canonicalized. When the name on the line already is
/// canonical the result borrows it; otherwise the canonical name is owned.
///
/// # Errors
///
/// Each failure mode has its own [`DecodeError`] variant and code.
pub fn decode_line(line: &[u8], noit: NoitField) -> Result<MetricMessage<'_>> {
    let text = std::str::from_utf8(line).map_err(|_| DecodeError::InvalidUtf8)?;
    let text = strip_newline(text);

    let (head, rest) = text.split_once('\t').ok_or(DecodeError::MissingTimestamp)?;
    let first = head.bytes().next().unwrap_or(b'\0');
    let kind = MessageType::from_byte(first)
        .ok_or(DecodeError::UnknownRecordType(char::from(first)))?;

    let has_source = match noit {
        NoitField::Present => true,
        NoitField::Absent => false,
        NoitField::Auto => !looks_like_timestamp(rest),
    };
    let (source, rest) = if has_source {
        let (source, rest) = rest.split_once('\t').ok_or(DecodeError::MissingTimestamp)?;
        (Some(Cow::Borrowed(source)), rest)
    } else {
        (None, rest)
    };

    let (timestamp, rest) = rest.split_once('\t').ok_or(DecodeError::MissingIdentity)?;
    let timestamp_ms = parse_timestamp_ms(timestamp);

    let (identity, rest) = rest.split_once('\t').ok_or(DecodeError::MissingName)?;
    let (identity, check_uuid) = split_identity(identity)?;
    let account_id = account_id(identity);

    let mut id = MetricId {
        check_uuid,
        identity: Cow::Borrowed(identity),
        account_id,
        name: None,
    };

    let (value, payload) = match kind {
        MessageType::Metric => {
            let (name, rest) = rest.split_once('\t').ok_or(DecodeError::MissingType)?;
            let (type_field, value) = rest.split_once('\t').ok_or(DecodeError::MissingValue)?;
            id.name = Some(metric_name(name)?);
            (parse_value(type_field, value)?, None)
        }
        MessageType::Histogram => {
            let (name, payload) = rest.split_once('\t').ok_or(DecodeError::MissingType)?;
            id.name = Some(metric_name(name)?);
            (MetricValue::Histogram(Cow::Borrowed(payload)), None)
        }
        MessageType::Status | MessageType::Check | MessageType::Delete => {
            (MetricValue::Absent, Some(Cow::Borrowed(rest)))
        }
    };

    Ok(MetricMessage {
        kind,
        timestamp_ms,
        source,
        id,
        value,
        payload,
        original: Cow::Borrowed(line),
    })
}

fn strip_newline(s: &str) -> &str {
    let s = s.strip_suffix('\n').unwrap_or(s);
    s.strip_suffix('\r').unwrap_or(s)
}

/// True if the field up to the next tab is `<digits>.<three digits>`.
fn looks_like_timestamp(rest: &str) -> bool {
    let Some((field, _)) = rest.split_once('\t') else {
        return false;
    };
    match field.split_once('.') {
        Some((secs, millis)) => {
            !secs.is_empty()
                && secs.bytes().all(|b| b.is_ascii_digit())
                && millis.len() == 3
                && millis.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// `<seconds>[.<fraction>]` to milliseconds; unparsable parts count as zero.
fn parse_timestamp_ms(field: &str) -> u64 {
    let (secs, fraction) = field.split_once('.').unwrap_or((field, ""));
    let secs = parse_u64_prefix(secs);
    let mut millis = 0u64;
    let mut scale = 100u64;
    for b in fraction.bytes().take(3) {
        if !b.is_ascii_digit() {
            break;
        }
        millis += u64::from(b - b'0') * scale;
        scale /= 10;
    }
    secs.saturating_mul(1000).saturating_add(millis)
}

fn split_identity(identity: &str) -> Result<(&str, Uuid)> {
    if identity.len() < UUID_STR_LEN {
        return Err(DecodeError::IdentityTooShort(identity.len()));
    }
    let split = identity.len() - UUID_STR_LEN;
    let uuid_str = identity.get(split..).ok_or(DecodeError::InvalidUuid)?;
    let uuid = Uuid::parse_str(uuid_str).map_err(|_| DecodeError::InvalidUuid)?;
    let prefix = &identity[..split];
    Ok((prefix.strip_suffix('`').unwrap_or(prefix), uuid))
}

/// Account from a ``c_<account>_<check>`` segment of the identity.
fn account_id(identity: &str) -> Option<u64> {
    identity.split('`').find_map(|segment| {
        let rest = segment.strip_prefix("c_")?;
        let (account, _) = rest.split_once('_')?;
        if account.is_empty() || !account.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        account.parse().ok()
    })
}

fn metric_name(raw: &str) -> Result<MetricName<'_>> {
    if raw.len() > MAX_METRIC_NAME_LEN {
        return Err(DecodeError::NameTooLong(raw.len()));
    }
    let parts = TaggedName::parse(raw).map_err(DecodeError::InvalidTags)?;
    let canonical = parts.to_canonical().map_err(DecodeError::InvalidTags)?;
    let canonical = if canonical == raw {
        Cow::Borrowed(raw)
    } else {
        Cow::Owned(canonical)
    };
    Ok(MetricName::new(canonical, parts))
}

fn parse_value<'a>(type_field: &str, value: &'a str) -> Result<MetricValue<'a>> {
    let type_char = type_field.chars().next().ok_or(DecodeError::MissingType)?;
    let value_type =
        ValueType::from_char(type_char).ok_or(DecodeError::UnknownValueType(type_char))?;
    if value == NULL_VALUE {
        return Ok(MetricValue::Null(value_type));
    }
    let numeric = truncate_numeric(value);
    Ok(match value_type {
        ValueType::Int32 => MetricValue::Int32(saturate(parse_i128_prefix(numeric))),
        ValueType::UInt32 => MetricValue::UInt32(saturate(parse_i128_prefix(numeric))),
        ValueType::Int64 => MetricValue::Int64(saturate(parse_i128_prefix(numeric))),
        ValueType::UInt64 => MetricValue::UInt64(saturate(parse_i128_prefix(numeric))),
        ValueType::Double => MetricValue::Double(parse_f64_prefix(numeric)),
        ValueType::String => MetricValue::String(Cow::Borrowed(value)),
    })
}

fn truncate_numeric(value: &str) -> &str {
    if value.len() <= MAX_NUMERIC_LEN {
        return value;
    }
    let mut end = MAX_NUMERIC_LEN;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

fn saturate<T>(v: i128) -> T
where
    T: TryFrom<i128> + Bounded,
{
    T::try_from(v).unwrap_or(if v < 0 { T::MIN } else { T::MAX })
}

trait Bounded: Sized {
    const MIN: Self;
    const MAX: Self;
}

macro_rules! bounded {
    ($($t:ty),*) => {
        $(impl Bounded for $t {
            const MIN: Self = <$t>::MIN;
            const MAX: Self = <$t>::MAX;
        })*
    };
}

bounded!(i32, u32, i64, u64);

/// Leading whitespace, optional sign, then decimal digits. Anything else
/// ends the number; no digits at all yields zero.
fn parse_i128_prefix(s: &str) -> i128 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i128, |acc, d| {
            acc.saturating_mul(10).saturating_add(i128::from(d - b'0'))
        });
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

pub(crate) fn parse_i64_prefix(s: &str) -> i64 {
    saturate(parse_i128_prefix(s))
}

fn parse_u64_prefix(s: &str) -> u64 {
    saturate(parse_i128_prefix(s))
}

/// The longest leading run that parses as a float; zero if none does.
fn parse_f64_prefix(s: &str) -> f64 {
    let s = s.trim_start();
    let run = s
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
        .count();
    (1..=run)
        .rev()
        .find_map(|end| s[..end].parse::<f64>().ok())
        .unwrap_or(0.0)
}
