//! The contract every pipeline stage and handler implements.

use std::future::Future;

use futures_util::future::BoxFuture;
use runguard_core::CancelScope;

pub type Request = http::Request<String>;
pub type Response = http::Response<String>;

/// A request handler or a stage wrapping one.
///
/// `scope` is cancelled when the caller no longer wants the response (the
/// client went away, or an outer stage gave up). Handlers may ignore it.
///
/// Any `Fn(Request, CancelScope) -> impl Future<Output = Response>` closure is
/// a handler.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: Request, scope: CancelScope) -> BoxFuture<'static, Response>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request, CancelScope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, request: Request, scope: CancelScope) -> BoxFuture<'static, Response> {
        Box::pin(self(request, scope))
    }
}
