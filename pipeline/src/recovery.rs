//! Outermost unwind boundary: any panic below becomes an empty `500`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use http::StatusCode;
use runguard_core::CancelScope;
use runguard_types::panic_message;

use crate::response::status_response;
use crate::{Handler, Request, Response};

pub struct Recovery<H> {
    next: Arc<H>,
}

impl<H: Handler> Recovery<H> {
    pub fn new(next: H) -> Self {
        Self {
            next: Arc::new(next),
        }
    }
}

impl<H: Handler> Handler for Recovery<H> {
    fn call(&self, request: Request, scope: CancelScope) -> BoxFuture<'static, Response> {
        let next = Arc::clone(&self.next);

        Box::pin(async move {
            let method = request.method().clone();
            let path = request.uri().path().to_owned();

            match AssertUnwindSafe(async move { next.call(request, scope).await })
                .catch_unwind()
                .await
            {
                Ok(response) => response,
                Err(payload) => {
                    tracing::error!(
                        %method,
                        path = %path,
                        panic = %panic_message(&*payload),
                        "Recovered from handler panic"
                    );
                    status_response(StatusCode::INTERNAL_SERVER_ERROR)
                }
            }
        })
    }
}
