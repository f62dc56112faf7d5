use std::collections::HashMap;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use super::id::{is_hex, parse_span_id, TraceId};

/// Flags that can be set on a [`SpanContext`].
///
/// The sampled flag marks a trace whose spans are reported. The debug flag
/// marks a trace that was force-sampled, either by a debug id or by the
/// `sampling.priority` tag.
#[derive(Clone, Debug, Default, PartialEq, Eq, Copy, Hash)]
pub struct TraceFlags(u8);

impl TraceFlags {
    /// Trace flags with no bit set.
    pub const NOT_SAMPLED: TraceFlags = TraceFlags(0x00);

    /// The sampled flag.
    pub const SAMPLED: TraceFlags = TraceFlags(0x01);

    /// The debug flag.
    pub const DEBUG: TraceFlags = TraceFlags(0x02);

    /// Construct new trace flags
    pub const fn new(flags: u8) -> Self {
        TraceFlags(flags)
    }

    /// Returns `true` if the sampled flag is set
    pub fn is_sampled(&self) -> bool {
        (*self & TraceFlags::SAMPLED) == TraceFlags::SAMPLED
    }

    /// Returns `true` if the debug flag is set
    pub fn is_debug(&self) -> bool {
        (*self & TraceFlags::DEBUG) == TraceFlags::DEBUG
    }

    /// Returns a copy of the current flags with the `sampled` flag set.
    pub fn with_sampled(&self, sampled: bool) -> Self {
        if sampled {
            *self | TraceFlags::SAMPLED
        } else {
            *self & !TraceFlags::SAMPLED
        }
    }

    /// Returns the flags as a `u8`
    pub fn to_u8(self) -> u8 {
        self.0
    }
}

impl BitAnd for TraceFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl BitOr for TraceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl Not for TraceFlags {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self(!self.0)
    }
}

impl fmt::LowerHex for TraceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Error returned when a textual span context or id cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseSpanContextError {
    /// The input does not have four `:` separated fields.
    #[error("span context must have four ':' separated fields, got {0:?}")]
    WrongFieldCount(String),
    /// The trace id field is not 1 to 32 hex digits.
    #[error("invalid trace id {0:?}")]
    InvalidTraceId(String),
    /// A span or parent id field is not 1 to 16 hex digits.
    #[error("invalid span id {0:?}")]
    InvalidSpanId(String),
    /// The flags field is not a hex byte.
    #[error("invalid flags {0:?}")]
    InvalidFlags(String),
}

/// Immutable portion of a span that is propagated across process boundaries.
///
/// Besides the trace and span ids a context carries the sampling flags, the
/// baggage items and, for contexts extracted from a request that only carried
/// a debug header, a debug id.
///
/// Baggage is stored behind an [`Arc`], so cloning a context is cheap and a
/// baggage update produces a new context instead of mutating a shared map.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpanContext {
    trace_id: TraceId,
    span_id: u64,
    parent_id: u64,
    flags: TraceFlags,
    baggage: Arc<HashMap<String, String>>,
    debug_id: String,
    trace_state: String,
}

impl SpanContext {
    /// Create a new context. A `parent_id` of zero marks a root span.
    pub fn new(
        trace_id: TraceId,
        span_id: u64,
        parent_id: u64,
        flags: TraceFlags,
        baggage: HashMap<String, String>,
    ) -> Self {
        SpanContext {
            trace_id,
            span_id,
            parent_id,
            flags,
            baggage: Arc::new(baggage),
            debug_id: String::new(),
            trace_state: String::new(),
        }
    }

    /// A context with no ids that only carries a debug id.
    ///
    /// Used as a parent, it forces the new trace to be sampled and tagged with
    /// the debug id.
    pub fn debug_id_container(debug_id: impl Into<String>) -> Self {
        SpanContext {
            debug_id: debug_id.into(),
            ..SpanContext::default()
        }
    }

    /// A context with no ids that only carries baggage, to be inherited by
    /// the next root span.
    pub fn baggage_container(baggage: HashMap<String, String>) -> Self {
        SpanContext {
            baggage: Arc::new(baggage),
            ..SpanContext::default()
        }
    }

    /// The trace id.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// The span id.
    pub fn span_id(&self) -> u64 {
        self.span_id
    }

    /// The parent span id, zero for root spans.
    pub fn parent_id(&self) -> u64 {
        self.parent_id
    }

    /// The trace flags.
    pub fn flags(&self) -> TraceFlags {
        self.flags
    }

    /// The debug correlation id, empty unless one was supplied.
    pub fn debug_id(&self) -> &str {
        &self.debug_id
    }

    /// Opaque vendor state passed through untouched.
    pub fn trace_state(&self) -> &str {
        &self.trace_state
    }

    /// All baggage items.
    pub fn baggage(&self) -> &HashMap<String, String> {
        &self.baggage
    }

    /// The value of one baggage item.
    pub fn baggage_item(&self, key: &str) -> Option<&str> {
        self.baggage.get(key).map(String::as_str)
    }

    /// Returns `true` if the trace id is valid and the span id is non-zero.
    pub fn is_valid(&self) -> bool {
        self.trace_id.is_valid() && self.span_id != 0
    }

    /// Returns `true` if the context has no valid trace id but carries a debug id.
    pub fn is_debug_id_container_only(&self) -> bool {
        !self.trace_id.is_valid() && !self.debug_id.is_empty()
    }

    /// Returns `true` if the sampled flag is set.
    pub fn is_sampled(&self) -> bool {
        self.flags.is_sampled()
    }

    /// Returns `true` if the debug flag is set.
    pub fn is_debug(&self) -> bool {
        self.flags.is_debug()
    }

    /// A copy of this context with its baggage replaced.
    pub fn with_baggage(&self, baggage: HashMap<String, String>) -> Self {
        SpanContext {
            baggage: Arc::new(baggage),
            ..self.clone()
        }
    }

    /// A copy of this context with one baggage item added or replaced.
    pub fn with_baggage_item(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut baggage = (*self.baggage).clone();
        baggage.insert(key.into(), value.into());
        self.with_baggage(baggage)
    }

    /// A copy of this context with different flags.
    pub fn with_flags(&self, flags: TraceFlags) -> Self {
        SpanContext {
            flags,
            ..self.clone()
        }
    }

    /// A copy of this context carrying a debug id.
    pub fn with_debug_id(&self, debug_id: impl Into<String>) -> Self {
        SpanContext {
            debug_id: debug_id.into(),
            ..self.clone()
        }
    }

    /// A copy of this context carrying opaque trace state.
    pub fn with_trace_state(&self, trace_state: impl Into<String>) -> Self {
        SpanContext {
            trace_state: trace_state.into(),
            ..self.clone()
        }
    }
}

/// Formats as `trace_id:span_id:parent_id:flags`, all in hex.
impl fmt::Display for SpanContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{:016x}:{:016x}:{:x}",
            self.trace_id, self.span_id, self.parent_id, self.flags
        )
    }
}

/// Parses the format written by [`Display`](fmt::Display). Baggage, debug id
/// and trace state are not part of it and come back empty.
impl FromStr for SpanContext {
    type Err = ParseSpanContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(':').collect();
        let [trace_id, span_id, parent_id, flags] = fields.as_slice() else {
            return Err(ParseSpanContextError::WrongFieldCount(s.to_string()));
        };

        let trace_id = trace_id.parse::<TraceId>()?;
        let span_id = parse_span_id(span_id)?;
        let parent_id = parse_span_id(parent_id)?;
        let flags = if flags.is_empty() || flags.len() > 2 || !is_hex(flags) {
            return Err(ParseSpanContextError::InvalidFlags(flags.to_string()));
        } else {
            u8::from_str_radix(flags, 16)
                .map_err(|_| ParseSpanContextError::InvalidFlags(flags.to_string()))?
        };

        Ok(SpanContext::new(
            trace_id,
            span_id,
            parent_id,
            TraceFlags::new(flags),
            HashMap::new(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn context(high: u64, low: u64, span_id: u64, parent_id: u64, flags: u8) -> SpanContext {
        SpanContext::new(
            TraceId::new(high, low),
            span_id,
            parent_id,
            TraceFlags::new(flags),
            HashMap::new(),
        )
    }

    #[rstest]
    #[case(context(0, 1, 2, 0, 1), "0000000000000001:0000000000000002:0000000000000000:1")]
    #[case(context(0xabc, 1, 2, 3, 3), "0000000000000abc0000000000000001:0000000000000002:0000000000000003:3")]
    #[case(context(0, u64::MAX, u64::MAX, 7, 0), "ffffffffffffffff:ffffffffffffffff:0000000000000007:0")]
    fn text_round_trip(#[case] ctx: SpanContext, #[case] text: &str) {
        assert_eq!(ctx.to_string(), text);
        assert_eq!(text.parse::<SpanContext>().unwrap(), ctx);
    }

    #[rstest]
    #[case("", ParseSpanContextError::WrongFieldCount(String::new()))]
    #[case("1:2:3", ParseSpanContextError::WrongFieldCount("1:2:3".to_string()))]
    #[case("g:2:3:1", ParseSpanContextError::InvalidTraceId("g".to_string()))]
    #[case("1:2:3:100", ParseSpanContextError::InvalidFlags("100".to_string()))]
    #[case("1:00000000000000002:3:1", ParseSpanContextError::InvalidSpanId("00000000000000002".to_string()))]
    #[case("+1:2:3:1", ParseSpanContextError::InvalidTraceId("+1".to_string()))]
    #[case("1:+2:3:1", ParseSpanContextError::InvalidSpanId("+2".to_string()))]
    #[case("1:2:3:+1", ParseSpanContextError::InvalidFlags("+1".to_string()))]
    fn parse_errors(#[case] input: &str, #[case] expected: ParseSpanContextError) {
        assert_eq!(input.parse::<SpanContext>().unwrap_err(), expected);
    }

    #[test]
    fn baggage_is_copy_on_write() {
        let original = context(0, 1, 2, 0, 1).with_baggage_item("k1", "v1");
        let updated = original.with_baggage_item("k2", "v2");

        assert_eq!(original.baggage().len(), 1);
        assert_eq!(updated.baggage().len(), 2);
        assert_eq!(updated.baggage_item("k1"), Some("v1"));
        assert_eq!(original.baggage_item("k2"), None);
    }

    #[test]
    fn validity_and_containers() {
        assert!(context(0, 1, 2, 0, 0).is_valid());
        assert!(!context(0, 1, 0, 0, 0).is_valid());
        assert!(!context(0, 0, 2, 0, 0).is_valid());

        let debug = SpanContext::debug_id_container("xyz");
        assert!(!debug.is_valid());
        assert!(debug.is_debug_id_container_only());
        assert_eq!(debug.debug_id(), "xyz");
        assert!(!context(0, 1, 2, 0, 0)
            .with_debug_id("xyz")
            .is_debug_id_container_only());

        let baggage = SpanContext::baggage_container(HashMap::from([(
            "k".to_string(),
            "v".to_string(),
        )]));
        assert!(!baggage.is_valid());
        assert!(!baggage.is_debug_id_container_only());
    }

    #[test]
    fn flags() {
        let flags = TraceFlags::SAMPLED | TraceFlags::DEBUG;
        assert!(flags.is_sampled());
        assert!(flags.is_debug());
        let cleared = flags.with_sampled(false);
        assert!(!cleared.is_sampled());
        assert!(cleared.is_debug());
        assert_eq!(cleared.to_u8(), 2);
    }
}
