use std::fmt;
use std::time::SystemTime;

use serde::Serialize;

/// Value of a [`Tag`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    /// bool values
    Bool(bool),
    /// f64 values
    F64(f64),
    /// i64 values
    I64(i64),
    /// u64 values
    U64(u64),
    /// String values
    String(String),
}

impl TagValue {
    /// Interprets the value as a sampling priority: positive numbers, `true`
    /// and strings holding a positive integer are truthy.
    pub(crate) fn as_sampling_priority(&self) -> bool {
        match self {
            TagValue::Bool(b) => *b,
            TagValue::F64(f) => *f > 0.0,
            TagValue::I64(i) => *i > 0,
            TagValue::U64(u) => *u > 0,
            TagValue::String(s) => s.trim().parse::<i64>().map(|i| i > 0).unwrap_or(false),
        }
    }
}

macro_rules! from_values {
   (
        $(
            ($t:ty, $val:expr);
        )+
    ) => {
        $(
            impl From<$t> for TagValue {
                fn from(t: $t) -> Self {
                    $val(t.into())
                }
            }
        )+
    }
}

from_values!(
    (bool, TagValue::Bool);
    (f64, TagValue::F64);
    (i64, TagValue::I64);
    (i32, TagValue::I64);
    (u64, TagValue::U64);
    (u32, TagValue::U64);
    (String, TagValue::String);
    (&str, TagValue::String);
);

impl fmt::Display for TagValue {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Bool(v) => v.fmt(fmt),
            TagValue::F64(v) => v.fmt(fmt),
            TagValue::I64(v) => v.fmt(fmt),
            TagValue::U64(v) => v.fmt(fmt),
            TagValue::String(v) => fmt.write_str(v),
        }
    }
}

/// A key-value pair attached to a span, a log record or the tracer process.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Tag {
    /// The tag key.
    pub key: String,
    /// The tag value.
    pub value: TagValue,
}

impl Tag {
    /// Create a new tag.
    pub fn new(key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        Tag {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A timestamped set of fields logged on a span.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    /// When the event happened.
    pub timestamp: SystemTime,
    /// The logged fields.
    pub fields: Vec<Tag>,
}

impl LogRecord {
    /// Create a log record.
    pub fn new(timestamp: SystemTime, fields: Vec<Tag>) -> Self {
        LogRecord { timestamp, fields }
    }
}
