use std::cell::RefCell;
use std::fmt;
use std::str::FromStr;

use rand::{rngs, Rng, SeedableRng};

use super::span_context::ParseSpanContextError;

/// A 128-bit trace identifier made of two 64-bit halves.
///
/// When 128-bit trace ids are disabled `high` is always zero, and the textual
/// form only contains the low half.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceId {
    high: u64,
    low: u64,
}

impl TraceId {
    /// Invalid trace id
    pub const INVALID: TraceId = TraceId { high: 0, low: 0 };

    /// Create a trace id from its two halves.
    pub const fn new(high: u64, low: u64) -> Self {
        TraceId { high, low }
    }

    /// The upper 64 bits.
    pub const fn high(&self) -> u64 {
        self.high
    }

    /// The lower 64 bits. Probabilistic sampling decisions are based on this half.
    pub const fn low(&self) -> u64 {
        self.low
    }

    /// Returns `true` unless both halves are zero.
    pub const fn is_valid(&self) -> bool {
        self.high != 0 || self.low != 0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.high == 0 {
            write!(f, "{:016x}", self.low)
        } else {
            write!(f, "{:016x}{:016x}", self.high, self.low)
        }
    }
}

impl FromStr for TraceId {
    type Err = ParseSpanContextError;

    /// Parses 1 to 32 hex digits. Digits beyond the last 16 form the high half.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > 32 || !is_hex(s) {
            return Err(ParseSpanContextError::InvalidTraceId(s.to_string()));
        }
        let invalid = || ParseSpanContextError::InvalidTraceId(s.to_string());
        if s.len() <= 16 {
            let low = u64::from_str_radix(s, 16).map_err(|_| invalid())?;
            return Ok(TraceId::new(0, low));
        }
        let (high, low) = s.split_at(s.len() - 16);
        Ok(TraceId::new(
            u64::from_str_radix(high, 16).map_err(|_| invalid())?,
            u64::from_str_radix(low, 16).map_err(|_| invalid())?,
        ))
    }
}

// `from_str_radix` alone also accepts a leading sign.
pub(crate) fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Parses a span id written as up to 16 hex digits.
pub(crate) fn parse_span_id(s: &str) -> Result<u64, ParseSpanContextError> {
    if s.is_empty() || s.len() > 16 || !is_hex(s) {
        return Err(ParseSpanContextError::InvalidSpanId(s.to_string()));
    }
    u64::from_str_radix(s, 16).map_err(|_| ParseSpanContextError::InvalidSpanId(s.to_string()))
}

/// Generates random, non-zero trace and span ids.
#[derive(Clone, Debug, Default)]
pub(crate) struct RandomIdGenerator {
    gen_128_bit: bool,
}

impl RandomIdGenerator {
    pub(crate) fn new(gen_128_bit: bool) -> Self {
        RandomIdGenerator { gen_128_bit }
    }

    /// A fresh trace id. The high half is only random when 128-bit ids are enabled.
    pub(crate) fn new_trace_id(&self) -> TraceId {
        let high = if self.gen_128_bit { random_id() } else { 0 };
        TraceId::new(high, random_id())
    }

    pub(crate) fn new_span_id(&self) -> u64 {
        random_id()
    }
}

fn random_id() -> u64 {
    CURRENT_RNG.with(|rng| {
        let mut rng = rng.borrow_mut();
        loop {
            let value = rng.random::<u64>();
            if value != 0 {
                return value;
            }
        }
    })
}

thread_local! {
    /// Store random number generator for each thread
    static CURRENT_RNG: RefCell<rngs::SmallRng> = RefCell::new(rngs::SmallRng::from_os_rng());
}
