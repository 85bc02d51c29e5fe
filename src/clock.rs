//! Time source abstraction.
//!
//! Rendering and queue timestamps read the time through [`Clock`] so tests
//! can pin it.

use chrono::{DateTime, FixedOffset, Local};

/// Source of the current time, in the user's local offset.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock in the process's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<FixedOffset>);

impl FixedClock {
    /// Creates a clock that always returns `at`.
    #[must_use]
    pub const fn new(at: DateTime<FixedOffset>) -> Self {
        Self(at)
    }

    /// Parses an RFC 3339 timestamp into a fixed clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the timestamp is not valid RFC 3339.
    pub fn parse(rfc3339: &str) -> crate::Result<Self> {
        DateTime::parse_from_rfc3339(rfc3339)
            .map(Self)
            .map_err(|e| crate::Error::InvalidInput(format!("invalid timestamp '{rfc3339}': {e}")))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}
