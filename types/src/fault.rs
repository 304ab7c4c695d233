//! Captured work-unit faults.
//!
//! A [`Fault`] is what the fault boundary produces when a work unit panics on
//! its detached path. It keeps the original panic payload so the fault can be
//! re-raised on the invoking path unchanged.

use std::any::Any;
use std::fmt;

/// Panic payload as handed out by `catch_unwind` and `JoinError::into_panic`.
pub type PanicPayload = Box<dyn Any + Send + 'static>;

/// A fault captured on a detached execution path.
///
/// `Fault` is `Send` but not `Sync`: the payload is an arbitrary `Any` value.
pub struct Fault {
    message: String,
    kind: FaultKind,
}

enum FaultKind {
    Panic(PanicPayload),
    /// The worker went away without reporting anything.
    WorkerLost,
}

impl Fault {
    /// Wrap a payload caught from an unwinding work unit.
    #[must_use]
    pub fn from_panic(payload: PanicPayload) -> Self {
        let message = panic_message(&*payload);
        Self {
            message,
            kind: FaultKind::Panic(payload),
        }
    }

    #[must_use]
    pub fn worker_lost(reason: impl Into<String>) -> Self {
        Self {
            message: reason.into(),
            kind: FaultKind::WorkerLost,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn is_panic(&self) -> bool {
        matches!(self.kind, FaultKind::Panic(_))
    }

    #[must_use]
    pub fn is_worker_lost(&self) -> bool {
        matches!(self.kind, FaultKind::WorkerLost)
    }

    /// Take the payload out for re-raising or inspection.
    ///
    /// A lost worker has no payload of its own; its message is boxed instead.
    #[must_use]
    pub fn into_payload(self) -> PanicPayload {
        match self.kind {
            FaultKind::Panic(payload) => payload,
            FaultKind::WorkerLost => Box::new(self.message),
        }
    }

    /// Re-raise on the current thread as if the work unit had panicked inline.
    pub fn resume(self) -> ! {
        std::panic::resume_unwind(self.into_payload())
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            FaultKind::Panic(_) => "panic",
            FaultKind::WorkerLost => "worker_lost",
        };
        f.debug_struct("Fault")
            .field("kind", &kind)
            .field("message", &self.message)
            .finish()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FaultKind::Panic(_) => write!(f, "work unit panicked: {}", self.message),
            FaultKind::WorkerLost => write!(f, "work unit lost: {}", self.message),
        }
    }
}

impl std::error::Error for Fault {}

/// Render a panic payload for logs and error messages.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
