//! Run outcomes.
//!
//! Every guarded run produces exactly one [`Outcome`]. It is built once by the
//! guard and handed to the caller by value; nothing holds on to it afterwards.

use std::time::Duration;

use thiserror::Error;

use crate::Fault;

/// Terminal result of a single guarded run.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The work unit returned before the deadline.
    Completed(T),
    /// The work unit panicked (or its worker disappeared) before the deadline.
    Faulted(Fault),
    /// The invoking path was released before the work unit reported.
    TimedOut(TimeoutCause),
}

/// Why a run was released without a report from its work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutCause {
    /// The configured deadline elapsed.
    DeadlineExceeded { deadline: Duration },
    /// The ambient scope was cancelled upstream.
    Cancelled,
}

/// Outcome discriminant without the payload, for log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Completed,
    Faulted,
    TimedOut,
}

impl OutcomeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Faulted => "faulted",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Error form of a non-completed [`Outcome`].
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("deadline of {deadline:?} exceeded")]
    DeadlineExceeded { deadline: Duration },
    #[error("run cancelled upstream")]
    Cancelled,
    #[error(transparent)]
    WorkFault(#[from] Fault),
}

impl From<TimeoutCause> for GuardError {
    fn from(cause: TimeoutCause) -> Self {
        match cause {
            TimeoutCause::DeadlineExceeded { deadline } => Self::DeadlineExceeded { deadline },
            TimeoutCause::Cancelled => Self::Cancelled,
        }
    }
}

impl<T> Outcome<T> {
    #[must_use]
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Completed(_) => OutcomeKind::Completed,
            Self::Faulted(_) => OutcomeKind::Faulted,
            Self::TimedOut(_) => OutcomeKind::TimedOut,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    #[must_use]
    pub fn is_faulted(&self) -> bool {
        matches!(self, Self::Faulted(_))
    }

    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }

    pub fn into_result(self) -> Result<T, GuardError> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Faulted(fault) => Err(GuardError::WorkFault(fault)),
            Self::TimedOut(cause) => Err(cause.into()),
        }
    }

    /// Unwrap a completed value, re-raising a fault on the current thread.
    ///
    /// Timeouts are returned as `Err` since they are not faults of the work.
    pub fn resume_fault(self) -> Result<T, TimeoutCause> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Faulted(fault) => fault.resume(),
            Self::TimedOut(cause) => Err(cause),
        }
    }
}
