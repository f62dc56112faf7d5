//! Baggage restrictions.
//!
//! A [`RestrictionManager`] decides, per service and baggage key, whether the
//! key may be set on a span and how long its value may be. The
//! [`BaggageSetter`] applies that decision whenever
//! [`Span::set_baggage_item`](crate::trace::Span::set_baggage_item) is called.
use std::fmt;

mod remote;
mod setter;

pub use remote::{
    BaggageRestriction, HttpRestrictionClient, RemoteRestrictionManager,
    RemoteRestrictionManagerBuilder, RestrictionClient,
};
pub use setter::BaggageSetter;

pub(crate) use remote::{DEFAULT_RESTRICTIONS_HOST_PORT, DEFAULT_RESTRICTIONS_REFRESH_INTERVAL};

/// Maximum length of a baggage value when no other limit is configured.
pub const DEFAULT_MAX_VALUE_LENGTH: usize = 2048;

/// Whether a baggage key may be set and the maximum length of its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Restriction {
    key_allowed: bool,
    max_value_length: usize,
}

impl Restriction {
    /// Create a restriction.
    pub const fn new(key_allowed: bool, max_value_length: usize) -> Self {
        Restriction {
            key_allowed,
            max_value_length,
        }
    }

    /// A restriction denying the key.
    pub const fn denied() -> Self {
        Restriction::new(false, 0)
    }

    /// Whether the key may be set.
    pub fn key_allowed(&self) -> bool {
        self.key_allowed
    }

    /// Values longer than this many bytes are truncated.
    pub fn max_value_length(&self) -> usize {
        self.max_value_length
    }
}

/// Source of baggage [`Restriction`]s.
pub trait RestrictionManager: Send + Sync + fmt::Debug {
    /// Returns the restriction for `key` in `service`.
    fn get_restriction(&self, service: &str, key: &str) -> Restriction;

    /// Releases background resources. Called by
    /// [`Tracer::close`](crate::trace::Tracer::close).
    fn close(&self) {}
}

/// Allows every key, with a single value length limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DefaultRestrictionManager {
    restriction: Restriction,
}

impl DefaultRestrictionManager {
    /// A zero `max_value_length` selects [`DEFAULT_MAX_VALUE_LENGTH`].
    pub fn new(max_value_length: usize) -> Self {
        let max_value_length = if max_value_length == 0 {
            DEFAULT_MAX_VALUE_LENGTH
        } else {
            max_value_length
        };
        DefaultRestrictionManager {
            restriction: Restriction::new(true, max_value_length),
        }
    }
}

impl Default for DefaultRestrictionManager {
    fn default() -> Self {
        DefaultRestrictionManager::new(DEFAULT_MAX_VALUE_LENGTH)
    }
}

impl RestrictionManager for DefaultRestrictionManager {
    fn get_restriction(&self, _service: &str, _key: &str) -> Restriction {
        self.restriction
    }
}
