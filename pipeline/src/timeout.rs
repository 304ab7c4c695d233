//! Deadline stage.
//!
//! Wraps the next handler in an [`ExecutionGuard`] and maps the run's outcome
//! onto the response:
//!
//! | Outcome     | Response                                   |
//! |-------------|--------------------------------------------|
//! | `Completed` | the handler's own response, untouched      |
//! | `TimedOut`  | `504` + `{"error": "request timed out"}`   |
//! | `Faulted`   | status `500`, then the panic is re-raised  |
//!
//! This stage never builds the `500` itself. On a fault it logs the request
//! with `status = 500` and re-raises the original payload, which unwinds out of
//! [`Handler::call`]'s future on the invoking task. The `500` response is
//! written by whatever unwind boundary sits outside: [`Recovery`](crate::Recovery)
//! or the host's own. A bare `TimeoutStage` with no boundary above it
//! propagates the panic to its caller.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use runguard_core::{CancelScope, ExecutionGuard, Outcome, TimeoutCause};

use crate::response::timeout_response;
use crate::{Handler, Request, Response};

pub struct TimeoutStage<H> {
    guard: ExecutionGuard,
    next: Arc<H>,
}

impl<H: Handler> TimeoutStage<H> {
    pub fn new(guard: ExecutionGuard, next: H) -> Self {
        Self {
            guard,
            next: Arc::new(next),
        }
    }
}

impl<H: Handler> Handler for TimeoutStage<H> {
    fn call(&self, request: Request, scope: CancelScope) -> BoxFuture<'static, Response> {
        let guard = self.guard;
        let next = Arc::clone(&self.next);

        Box::pin(async move {
            let method = request.method().clone();
            let path = request.uri().path().to_owned();

            let outcome = guard
                .run(&scope, move |run_scope| next.call(request, run_scope))
                .await;

            match outcome {
                Outcome::Completed(response) => response,
                Outcome::TimedOut(cause) => {
                    let reason = match cause {
                        TimeoutCause::DeadlineExceeded { .. } => "deadline exceeded",
                        TimeoutCause::Cancelled => "cancelled upstream",
                    };
                    tracing::warn!(%method, path = %path, reason, "Request timed out");
                    timeout_response()
                }
                Outcome::Faulted(fault) => {
                    tracing::error!(
                        %method,
                        path = %path,
                        status = 500,
                        panic = %fault.message(),
                        "Handler faulted; re-raising"
                    );
                    fault.resume()
                }
            }
        })
    }
}
