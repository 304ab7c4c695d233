//! Deadline-bounded execution of a single work unit.
//!
//! # Lifecycle
//!
//! ```text
//! PendingRun ──spawn──▶ SpawnedRun ──settle──▶ Outcome
//!   (Idle)               (Running)            (terminal)
//! ```
//!
//! Each state is consumed by the transition out of it, so a run cannot be
//! settled twice and an outcome cannot be produced without a spawned worker.
//!
//! # Abandoned workers
//!
//! Rust has no way to preempt arbitrary code. When the deadline fires (or the
//! ambient scope is cancelled) the invoking path is released with
//! [`Outcome::TimedOut`], but the worker keeps running until its work unit
//! returns or panics. Whatever it produces afterwards is dropped and logged at
//! `debug`; a late fault is never re-raised. Work units that want to stop early
//! should watch the [`CancelScope`] they are handed, which is cancelled as soon
//! as the run settles.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::Instrument;

use runguard_types::{Deadline, DeadlineError, Fault, Outcome, TimeoutCause};

use crate::CancelScope;

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// What a worker sends back over its single-slot channel.
type Report<T> = Result<T, Fault>;

/// Runs work units under a fixed deadline.
///
/// The deadline is set once at construction and applied to every run; callers
/// that need a different deadline build a different guard. The guard holds no
/// per-run state, so one instance can serve any number of concurrent runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionGuard {
    deadline: Deadline,
}

impl ExecutionGuard {
    #[must_use]
    pub const fn new(deadline: Deadline) -> Self {
        Self { deadline }
    }

    /// Build a guard from a raw duration, rejecting zero.
    pub fn with_timeout(timeout: Duration) -> Result<Self, DeadlineError> {
        Deadline::new(timeout).map(Self::new)
    }

    #[must_use]
    pub const fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// Run an async work unit on its own tokio task and race it against the
    /// deadline and `ambient` cancellation.
    ///
    /// The work unit receives a child of `ambient` that is cancelled when the
    /// run settles, whichever way it settles. If `ambient` is already cancelled
    /// the work unit is never started.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn run<F, Fut, T>(&self, ambient: &CancelScope, work: F) -> Outcome<T>
    where
        F: FnOnce(CancelScope) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let Some(pending) = PendingRun::begin(self.deadline, ambient) else {
            return Outcome::TimedOut(TimeoutCause::Cancelled);
        };
        let span = pending.span.clone();
        pending.spawn(work).settle().instrument(span).await
    }

    /// Like [`run`](Self::run), but for synchronous work that blocks its thread.
    ///
    /// The work unit runs on tokio's blocking pool. An abandoned blocking work
    /// unit holds its pool thread until it returns, and runtime shutdown waits
    /// for it, so blocking work that can run long should poll
    /// [`CancelScope::is_cancelled`].
    pub async fn run_blocking<F, T>(&self, ambient: &CancelScope, work: F) -> Outcome<T>
    where
        F: FnOnce(CancelScope) -> T + Send + 'static,
        T: Send + 'static,
    {
        let Some(pending) = PendingRun::begin(self.deadline, ambient) else {
            return Outcome::TimedOut(TimeoutCause::Cancelled);
        };
        let span = pending.span.clone();
        pending.spawn_blocking(work).settle().instrument(span).await
    }
}

/// A run that has a scope and an expiry but no worker yet.
struct PendingRun {
    id: u64,
    deadline: Deadline,
    scope: CancelScope,
    started: Instant,
    expiry: Option<Instant>,
    span: tracing::Span,
}

impl PendingRun {
    fn begin(deadline: Deadline, ambient: &CancelScope) -> Option<Self> {
        let id = NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed);
        if ambient.is_cancelled() {
            tracing::debug!(run = id, "ambient scope already cancelled; work unit not started");
            return None;
        }

        let started = Instant::now();
        let expiry = deadline
            .expiry_from(started.into_std())
            .map(Instant::from_std);
        let span = tracing::debug_span!("guard_run", run = id, deadline_ms = deadline.as_millis());

        Some(Self {
            id,
            deadline,
            scope: ambient.child(),
            started,
            expiry,
            span,
        })
    }

    fn spawn<F, Fut, T>(self, work: F) -> SpawnedRun<T>
    where
        F: FnOnce(CancelScope) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let scope = self.scope.clone();
        let id = self.id;

        tokio::spawn(
            async move {
                // The call itself sits inside the boundary so a panic while
                // building the future is captured too.
                let report = AssertUnwindSafe(async move { work(scope).await })
                    .catch_unwind()
                    .await
                    .map_err(Fault::from_panic);
                deliver(id, tx, report);
            }
            .instrument(self.span.clone()),
        );

        tracing::trace!(run = id, "work unit spawned");
        SpawnedRun {
            run: self,
            report: rx,
        }
    }

    fn spawn_blocking<F, T>(self, work: F) -> SpawnedRun<T>
    where
        F: FnOnce(CancelScope) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let scope = self.scope.clone();
        let id = self.id;
        let span = self.span.clone();

        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let report = std::panic::catch_unwind(AssertUnwindSafe(move || work(scope)))
                .map_err(Fault::from_panic);
            deliver(id, tx, report);
        });

        tracing::trace!(run = id, "blocking work unit spawned");
        SpawnedRun {
            run: self,
            report: rx,
        }
    }
}

/// Hand the worker's report to the invoking path, or drop it if that path has
/// already moved on.
fn deliver<T>(id: u64, tx: oneshot::Sender<Report<T>>, report: Report<T>) {
    match tx.send(report) {
        Ok(()) => {}
        Err(Ok(_)) => {
            tracing::debug!(run = id, "discarding result of abandoned work unit");
        }
        Err(Err(fault)) => {
            tracing::debug!(
                run = id,
                panic = %fault.message(),
                "discarding fault of abandoned work unit"
            );
        }
    }
}

/// A run whose worker is in flight. Settling consumes it.
struct SpawnedRun<T> {
    run: PendingRun,
    report: oneshot::Receiver<Report<T>>,
}

impl<T> SpawnedRun<T> {
    async fn settle(self) -> Outcome<T> {
        let Self { run, mut report } = self;

        let expired = async {
            match run.expiry {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        // Polled in order, so a report that is already delivered wins. One
        // woken on the same tick gets its turn in `last_call`.
        let outcome = tokio::select! {
            biased;
            received = &mut report => received_outcome(received),
            () = run.scope.cancelled() => {
                last_call(&mut report, TimeoutCause::Cancelled).await
            }
            () = expired => {
                let cause = TimeoutCause::DeadlineExceeded {
                    deadline: run.deadline.get(),
                };
                last_call(&mut report, cause).await
            }
        };

        run.scope.cancel();
        log_outcome(&run, &outcome);
        outcome
    }
}

fn received_outcome<T>(received: Result<Report<T>, oneshot::error::RecvError>) -> Outcome<T> {
    match received {
        Ok(Ok(value)) => Outcome::Completed(value),
        Ok(Err(fault)) => Outcome::Faulted(fault),
        Err(_) => Outcome::Faulted(Fault::worker_lost("worker dropped before reporting")),
    }
}

/// A worker woken on the same tick as the deadline (or the cancellation) may
/// not have been polled yet. Give it one scheduler turn to report before
/// settling as timed out.
async fn last_call<T>(
    report: &mut oneshot::Receiver<Report<T>>,
    cause: TimeoutCause,
) -> Outcome<T> {
    tokio::task::yield_now().await;
    match report.try_recv() {
        Ok(received) => received_outcome(Ok(received)),
        Err(_) => Outcome::TimedOut(cause),
    }
}

fn log_outcome<T>(run: &PendingRun, outcome: &Outcome<T>) {
    let elapsed_ms = u64::try_from(run.started.elapsed().as_millis()).unwrap_or(u64::MAX);
    match outcome {
        Outcome::Completed(_) => {
            tracing::debug!(
                run = run.id,
                elapsed_ms,
                outcome = outcome.kind().as_str(),
                "run settled"
            );
        }
        Outcome::Faulted(fault) => {
            tracing::error!(
                run = run.id,
                elapsed_ms,
                outcome = outcome.kind().as_str(),
                panic = %fault.message(),
                "work unit faulted"
            );
        }
        Outcome::TimedOut(TimeoutCause::DeadlineExceeded { .. }) => {
            tracing::warn!(
                run = run.id,
                elapsed_ms,
                deadline_ms = run.deadline.as_millis(),
                outcome = outcome.kind().as_str(),
                "deadline exceeded; abandoning work unit"
            );
        }
        Outcome::TimedOut(TimeoutCause::Cancelled) => {
            tracing::info!(
                run = run.id,
                elapsed_ms,
                outcome = outcome.kind().as_str(),
                "run cancelled upstream; abandoning work unit"
            );
        }
    }
}
