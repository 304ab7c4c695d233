//! Request pipeline stages for runguard.
//!
//! A pipeline is a stack of [`Handler`]s, each owning the next:
//!
//! ```text
//! Recovery ──▶ TimeoutStage ──▶ your handler
//!   500 on      504 on deadline,
//!   panic       re-raise on fault
//! ```
//!
//! The driver (server loop, test harness) owns the request's [`CancelScope`]
//! and cancels it when the client goes away.
//!
//! [`CancelScope`]: runguard_core::CancelScope

mod handler;
mod recovery;
pub mod response;
pub mod sanitize;
mod timeout;

pub use handler::{Handler, Request, Response};
pub use recovery::Recovery;
pub use response::{ErrorBody, TIMEOUT_MESSAGE, timeout_response};
pub use sanitize::DiagnosticsSanitizer;
pub use timeout::TimeoutStage;
