//! Response builders shared by the stages.

use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::Response;

/// Message carried in the 504 body.
pub const TIMEOUT_MESSAGE: &str = "request timed out";

/// JSON error body: `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// `504 Gateway Timeout` with `{"error": "request timed out"}`.
#[must_use]
pub fn timeout_response() -> Response {
    json_response(StatusCode::GATEWAY_TIMEOUT, &ErrorBody::new(TIMEOUT_MESSAGE))
}

#[must_use]
pub fn json_response(status: StatusCode, body: &ErrorBody) -> Response {
    let json = serde_json::to_string(body).unwrap_or_else(|err| {
        tracing::warn!("Failed to serialize error body: {err}");
        String::from("{}")
    });
    let mut response = Response::new(json);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// A response with only a status line, as written when a request is aborted.
#[must_use]
pub fn status_response(status: StatusCode) -> Response {
    let mut response = Response::new(String::new());
    *response.status_mut() = status;
    response
}
