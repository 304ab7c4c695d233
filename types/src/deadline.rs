//! Validated run deadline.
//!
//! A [`Deadline`] is the maximum duration a guarded run may take before the
//! invoking path is released with a timeout. It is fixed when a guard is
//! constructed and converted to an absolute expiry each time a run starts.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A strictly positive duration.
///
/// # Invariants
///
/// - The wrapped duration is never zero
///
/// # Serde
///
/// Serializes as an integer number of milliseconds. Deserialization rejects
/// `0` so a config file cannot produce a guard that times out immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Deadline(Duration);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeadlineError {
    #[error("deadline must be a positive duration")]
    Zero,
}

impl Deadline {
    pub fn new(duration: Duration) -> Result<Self, DeadlineError> {
        if duration.is_zero() {
            Err(DeadlineError::Zero)
        } else {
            Ok(Self(duration))
        }
    }

    pub fn from_millis(millis: u64) -> Result<Self, DeadlineError> {
        Self::new(Duration::from_millis(millis))
    }

    pub fn from_secs(secs: u64) -> Result<Self, DeadlineError> {
        Self::new(Duration::from_secs(secs))
    }

    #[must_use]
    pub const fn get(self) -> Duration {
        self.0
    }

    /// Milliseconds, saturating at `u64::MAX`. Used for log fields.
    #[must_use]
    pub fn as_millis(self) -> u64 {
        u64::try_from(self.0.as_millis()).unwrap_or(u64::MAX)
    }

    /// Absolute expiry for a run starting at `start`.
    ///
    /// Returns `None` when the expiry is not representable, which callers
    /// treat as "never expires".
    #[must_use]
    pub fn expiry_from(self, start: Instant) -> Option<Instant> {
        start.checked_add(self.0)
    }
}

impl TryFrom<Duration> for Deadline {
    type Error = DeadlineError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<u64> for Deadline {
    type Error = DeadlineError;

    fn try_from(millis: u64) -> Result<Self, Self::Error> {
        Self::from_millis(millis)
    }
}

impl From<Deadline> for u64 {
    fn from(value: Deadline) -> Self {
        value.as_millis()
    }
}

impl From<Deadline> for Duration {
    fn from(value: Deadline) -> Self {
        value.0
    }
}

impl std::fmt::Display for Deadline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
