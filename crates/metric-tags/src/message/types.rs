//! Decoded metric line records.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::canonical::TaggedName;
use crate::tag::{TagLimit, TagSet, TagSetBuilder};

/// Record type, selected by the first byte of a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageType {
    /// `M`: a single metric value.
    Metric,
    /// `H`: a histogram, carried as base64 text.
    Histogram,
    /// `S`: check status.
    Status,
    /// `C`: check configuration.
    Check,
    /// `D`: check deletion.
    Delete,
}

impl MessageType {
    /// Look up the record type for a leading byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'M' => Some(Self::Metric),
            b'H' => Some(Self::Histogram),
            b'S' => Some(Self::Status),
            b'C' => Some(Self::Check),
            b'D' => Some(Self::Delete),
            _ => None,
        }
    }

    /// The wire character.
    pub fn as_char(self) -> char {
        match self {
            Self::Metric => 'M',
            Self::Histogram => 'H',
            Self::Status => 'S',
            Self::Check => 'C',
            Self::Delete => 'D',
        }
    }

    /// True for records about checks rather than metrics.
    pub fn is_check_record(self) -> bool {
        matches!(self, Self::Status | Self::Check | Self::Delete)
    }
}

/// Whether lines carry the source address column after the record type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum NoitField {
    /// Probe each line: the column is absent when the second field
    /// already looks like `<seconds>.<millis>`.
    #[default]
    Auto,
    /// Always present.
    Present,
    /// Never present.
    Absent,
}

impl FromStr for NoitField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            other => Err(format!("unknown noit field mode: {other}")),
        }
    }
}

/// Declared type of an `M` record value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// `i`
    Int32,
    /// `I`
    UInt32,
    /// `l`
    Int64,
    /// `L`
    UInt64,
    /// `n`
    Double,
    /// `s`
    String,
}

impl ValueType {
    /// Look up a wire type character.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'i' => Some(Self::Int32),
            'I' => Some(Self::UInt32),
            'l' => Some(Self::Int64),
            'L' => Some(Self::UInt64),
            'n' => Some(Self::Double),
            's' => Some(Self::String),
            _ => None,
        }
    }

    /// The wire type character.
    pub fn as_char(self) -> char {
        match self {
            Self::Int32 => 'i',
            Self::UInt32 => 'I',
            Self::Int64 => 'l',
            Self::UInt64 => 'L',
            Self::Double => 'n',
            Self::String => 's',
        }
    }
}

/// Value carried by a record.
#[derive(Clone, Debug, PartialEq)]
pub enum MetricValue<'a> {
    /// No value: check records.
    Absent,
    /// `[[null]]` with its declared type.
    Null(ValueType),
    /// `i`
    Int32(i32),
    /// `I`
    UInt32(u32),
    /// `l`
    Int64(i64),
    /// `L`
    UInt64(u64),
    /// `n`
    Double(f64),
    /// `s`
    String(Cow<'a, str>),
    /// Base64 histogram payload of an `H` record, not decoded.
    Histogram(Cow<'a, str>),
}

impl MetricValue<'_> {
    /// Wire type character, `None` for absent and null values.
    pub fn type_char(&self) -> Option<char> {
        match self {
            Self::Absent | Self::Null(_) => None,
            Self::Int32(_) => Some('i'),
            Self::UInt32(_) => Some('I'),
            Self::Int64(_) => Some('l'),
            Self::UInt64(_) => Some('L'),
            Self::Double(_) => Some('n'),
            Self::String(_) | Self::Histogram(_) => Some('s'),
        }
    }

    /// True for `[[null]]`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Absent | Self::Null(_) => Value::Null,
            Self::Int32(v) => Value::from(*v),
            Self::UInt32(v) => Value::from(*v),
            Self::Int64(v) => Value::from(*v),
            Self::UInt64(v) => Value::from(*v),
            Self::Double(v) => Value::from(*v),
            Self::String(s) | Self::Histogram(s) => Value::from(s.as_ref()),
        }
    }

    /// Detach from the source line.
    pub fn into_owned(self) -> MetricValue<'static> {
        match self {
            Self::Absent => MetricValue::Absent,
            Self::Null(t) => MetricValue::Null(t),
            Self::Int32(v) => MetricValue::Int32(v),
            Self::UInt32(v) => MetricValue::UInt32(v),
            Self::Int64(v) => MetricValue::Int64(v),
            Self::UInt64(v) => MetricValue::UInt64(v),
            Self::Double(v) => MetricValue::Double(v),
            Self::String(s) => MetricValue::String(Cow::Owned(s.into_owned())),
            Self::Histogram(s) => MetricValue::Histogram(Cow::Owned(s.into_owned())),
        }
    }
}

/// A metric name as it appeared on the line, with its canonical form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricName<'a> {
    canonical: Cow<'a, str>,
    parts: TaggedName<'a>,
}

impl<'a> MetricName<'a> {
    pub(crate) fn new(canonical: Cow<'a, str>, parts: TaggedName<'a>) -> Self {
        Self { canonical, parts }
    }

    /// Bare name, without tag blocks.
    pub fn name(&self) -> &str {
        self.parts.name()
    }

    /// Canonical name including tag blocks.
    pub fn with_tags(&self) -> &str {
        &self.canonical
    }

    /// Stream tags.
    pub fn stream(&self) -> &TagSet<'a> {
        self.parts.stream()
    }

    /// Measurement tags.
    pub fn measurement(&self) -> &TagSet<'a> {
        self.parts.measurement()
    }

    /// True when canonicalization had to rewrite the name.
    pub fn is_allocated(&self) -> bool {
        matches!(self.canonical, Cow::Owned(_))
    }

    /// Detach from the source line.
    pub fn into_owned(self) -> MetricName<'static> {
        MetricName {
            canonical: Cow::Owned(self.canonical.into_owned()),
            parts: self.parts.into_owned(),
        }
    }
}

/// Who produced a record: check identity, and metric name when present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricId<'a> {
    /// Check UUID taken from the end of the identity field.
    pub check_uuid: Uuid,
    /// Identity field without the UUID, e.g. ``push`httptrap`c_933_247631::httptrap``.
    pub identity: Cow<'a, str>,
    /// Account parsed from a ``c_<account>_<check>`` identity segment.
    pub account_id: Option<u64>,
    /// Metric name; `None` for check records.
    pub name: Option<MetricName<'a>>,
}

impl MetricId<'_> {
    /// Detach from the source line.
    pub fn into_owned(self) -> MetricId<'static> {
        MetricId {
            check_uuid: self.check_uuid,
            identity: Cow::Owned(self.identity.into_owned()),
            account_id: self.account_id,
            name: self.name.map(MetricName::into_owned),
        }
    }
}

/// Fields of an `S` record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusFields<'s> {
    /// Check state, e.g. `G` or `B`.
    pub state: &'s str,
    /// Availability, e.g. `A` or `U`.
    pub available: Option<&'s str>,
    /// Check duration in milliseconds.
    pub duration: Option<i64>,
    /// Free-form status text.
    pub status: Option<&'s str>,
}

/// One decoded line.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricMessage<'a> {
    /// Record type.
    pub kind: MessageType,
    /// Timestamp in milliseconds since the epoch.
    pub timestamp_ms: u64,
    /// Source address column, when present.
    pub source: Option<Cow<'a, str>>,
    /// Check identity and metric name.
    pub id: MetricId<'a>,
    /// Decoded value.
    pub value: MetricValue<'a>,
    /// Text following the identity of a check record.
    pub payload: Option<Cow<'a, str>>,
    /// The line as received.
    pub original: Cow<'a, [u8]>,
}

impl<'a> MetricMessage<'a> {
    /// Canonical metric name with tags, if the record has one.
    pub fn metric_name(&self) -> Option<&str> {
        self.id.name.as_ref().map(MetricName::with_tags)
    }

    /// Split the payload of an `S` record.
    pub fn status(&self) -> Option<StatusFields<'_>> {
        if self.kind != MessageType::Status {
            return None;
        }
        let payload = self.payload.as_deref()?;
        let mut fields = payload.split('\t').filter(|f| !f.is_empty());
        Some(StatusFields {
            state: fields.next()?,
            available: fields.next(),
            duration: fields.next().map(super::parse_i64_prefix),
            status: fields.next(),
        })
    }

    /// System tags: `__name` and `__check_uuid`.
    pub fn implicit_tags(&self) -> TagSet<'_> {
        let mut builder = TagSetBuilder::new(TagLimit::Implicit);
        // constant categories always validate; an over-long name is dropped
        if let Some(name) = &self.id.name {
            let _ = builder.add_implicit(&b"__name"[..], name.name().as_bytes());
        }
        let uuid = self.id.check_uuid.hyphenated().to_string().into_bytes();
        let _ = builder.add_implicit(&b"__check_uuid"[..], uuid);
        builder.finish()
    }

    /// Render as a JSON object.
    ///
    /// Keys: `type`, `timestamp_ms`, `check_uuid`, `value_type` and, when
    /// known, `account_id`. `M` records add `<name>: <value>`; `S` records
    /// add `state`, `available`, `duration` and `status`; `H` records add
    /// `histogram` with the base64 payload.
    pub fn to_json(&self, include_original: bool) -> String {
        let mut o = Map::new();
        o.insert("type".into(), Value::from(self.kind.as_char().to_string()));
        o.insert("timestamp_ms".into(), Value::from(self.timestamp_ms));
        o.insert(
            "check_uuid".into(),
            Value::from(self.id.check_uuid.hyphenated().to_string()),
        );
        let value_type = self.value.type_char().map(|c| c.to_string());
        o.insert("value_type".into(), value_type.map_or(Value::Null, Value::from));
        if let Some(account) = self.id.account_id {
            o.insert("account_id".into(), Value::from(account));
        }

        match self.kind {
            MessageType::Metric => {
                if let Some(name) = self.metric_name() {
                    o.insert(name.to_owned(), self.value.to_json());
                }
            }
            MessageType::Histogram => {
                o.insert("histogram".into(), self.value.to_json());
            }
            MessageType::Status => {
                if let Some(status) = self.status() {
                    o.insert("state".into(), Value::from(status.state));
                    if let Some(available) = status.available {
                        o.insert("available".into(), Value::from(available));
                    }
                    if let Some(duration) = status.duration {
                        o.insert("duration".into(), Value::from(duration));
                    }
                    if let Some(text) = status.status {
                        o.insert("status".into(), Value::from(text));
                    }
                }
            }
            MessageType::Check | MessageType::Delete => {}
        }

        if include_original {
            o.insert(
                "original".into(),
                Value::from(String::from_utf8_lossy(&self.original).into_owned()),
            );
        }
        Value::Object(o).to_string()
    }

    /// Detach from the source line.
    pub fn into_owned(self) -> MetricMessage<'static> {
        MetricMessage {
            kind: self.kind,
            timestamp_ms: self.timestamp_ms,
            source: self.source.map(|s| Cow::Owned(s.into_owned())),
            id: self.id.into_owned(),
            value: self.value.into_owned(),
            payload: self.payload.map(|p| Cow::Owned(p.into_owned())),
            original: Cow::Owned(self.original.into_owned()),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}
