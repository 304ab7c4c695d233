//! Core domain types for runguard.
//!
//! Deadlines, outcomes and faults. No IO, no async.

#![allow(clippy::missing_errors_doc)]

mod deadline;
mod fault;
mod outcome;

pub use deadline::{Deadline, DeadlineError};
pub use fault::{Fault, PanicPayload, panic_message};
pub use outcome::{GuardError, Outcome, OutcomeKind, TimeoutCause};
