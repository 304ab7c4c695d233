//! Deadline-bounded execution for runguard.
//!
//! [`ExecutionGuard`] runs one work unit per call on a detached task, races it
//! against a fixed deadline and an ambient [`CancelScope`], and hands back
//! exactly one [`Outcome`](runguard_types::Outcome).

mod guard;
mod scope;

pub use guard::ExecutionGuard;
pub use scope::CancelScope;

pub use runguard_types::{
    Deadline, DeadlineError, Fault, GuardError, Outcome, OutcomeKind, TimeoutCause,
};
