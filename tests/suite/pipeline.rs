//! Full pipeline: recovery around the deadline stage around a handler

use std::time::Duration;

use http::StatusCode;
use runguard_core::CancelScope;
use runguard_pipeline::{
    DiagnosticsSanitizer, ErrorBody, Handler, Recovery, Request, Response, TIMEOUT_MESSAGE,
    TimeoutStage,
};

use crate::common::{Finished, cancel_after, guard_ms};

fn request(path: &str, body: &str) -> Request {
    http::Request::builder()
        .method("POST")
        .uri(path)
        .body(body.to_string())
        .unwrap()
}

fn assert_timeout_body(response: &Response) {
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(
        response.headers().get(http::header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let body: ErrorBody = serde_json::from_str(response.body()).unwrap();
    assert_eq!(body, ErrorBody::new(TIMEOUT_MESSAGE));
}

async fn echo(request: Request, _scope: CancelScope) -> Response {
    tokio::time::sleep(Duration::from_millis(1)).await;
    Response::new(request.into_body())
}

async fn stuck(_request: Request, _scope: CancelScope) -> Response {
    tokio::time::sleep(Duration::from_secs(60)).await;
    Response::new(String::new())
}

#[tokio::test(start_paused = true)]
async fn fast_handler_response_is_untouched() {
    let pipeline = Recovery::new(TimeoutStage::new(guard_ms(10), echo));

    let response = pipeline
        .call(request("/format", "package main"), CancelScope::new())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body(), "package main");
}

#[tokio::test(start_paused = true)]
async fn deadline_produces_gateway_timeout() {
    let pipeline = Recovery::new(TimeoutStage::new(guard_ms(10), stuck));
    let started = tokio::time::Instant::now();

    let response = pipeline
        .call(request("/execute", "for {}"), CancelScope::new())
        .await;

    assert_eq!(started.elapsed(), Duration::from_millis(10));
    assert_timeout_body(&response);
}

#[tokio::test(start_paused = true)]
async fn client_going_away_produces_gateway_timeout() {
    let pipeline = Recovery::new(TimeoutStage::new(guard_ms(100), stuck));
    let request_scope = CancelScope::new();
    cancel_after(&request_scope, Duration::from_millis(5));
    let started = tokio::time::Instant::now();

    let response = pipeline.call(request("/execute", ""), request_scope).await;

    assert_eq!(started.elapsed(), Duration::from_millis(5));
    assert_timeout_body(&response);
}

#[tokio::test(start_paused = true)]
async fn handler_sees_its_scope_cancelled_after_timeout() {
    let finished = Finished::default();
    let observed = finished.clone();
    let handler = move |_request: Request, scope: CancelScope| {
        let observed = observed.clone();
        async move {
            scope.cancelled().await;
            observed.mark();
            Response::new(String::new())
        }
    };
    let pipeline = TimeoutStage::new(guard_ms(10), handler);

    let response = pipeline.call(request("/execute", ""), CancelScope::new()).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(finished.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn handler_panic_becomes_internal_error() {
    async fn exploding(_request: Request, _scope: CancelScope) -> Response {
        panic!("index out of range");
    }

    let pipeline = Recovery::new(TimeoutStage::new(guard_ms(10), exploding));
    let response = pipeline.call(request("/execute", ""), CancelScope::new()).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body().is_empty());
}

#[tokio::test(start_paused = true)]
async fn pipeline_serves_requests_independently() {
    async fn by_path(request: Request, _scope: CancelScope) -> Response {
        if request.uri().path() == "/slow" {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Response::new("done".to_string())
    }

    let pipeline = Recovery::new(TimeoutStage::new(guard_ms(10), by_path));

    let (slow, fast) = tokio::join!(
        pipeline.call(request("/slow", ""), CancelScope::new()),
        pipeline.call(request("/fast", ""), CancelScope::new()),
    );

    assert_timeout_body(&slow);
    assert_eq!(fast.status(), StatusCode::OK);
    assert_eq!(fast.body(), "done");
}

#[tokio::test(start_paused = true)]
async fn handler_relays_sanitized_diagnostics() {
    async fn compile(_request: Request, _scope: CancelScope) -> Response {
        let stderr = "# command-line-arguments\n/var/folders/x/T/main.go:4:2: undefined: prinln";
        let mut response = Response::new(DiagnosticsSanitizer::go_toolchain().sanitize(stderr));
        *response.status_mut() = StatusCode::BAD_REQUEST;
        response
    }

    let pipeline = Recovery::new(TimeoutStage::new(guard_ms(10), compile));
    let response = pipeline.call(request("/execute", ""), CancelScope::new()).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.body(), "\ntmp.go:4:2: undefined: prinln");
}
