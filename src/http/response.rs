//! Locally generated responses.
//!
//! # Responsibilities
//! - Render policy rejections as plain-text errors
//! - Map forwarding failures to 5xx responses
//!
//! # Design Decisions
//! - Rejections are ordinary responses, never errors or panics
//! - Body is the reason message plus a trailing newline
//! - Upstream failures carry no body; the log has the detail

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};

use crate::filter::BlockReason;
use crate::http::forward::ForwardError;

const TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
const NOSNIFF: HeaderValue = HeaderValue::from_static("nosniff");

/// Response for a blocked request.
pub fn blocked(reason: BlockReason, status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::from(format!("{}\n", reason.message())));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, TEXT_PLAIN);
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, NOSNIFF);
    response
}

/// Response for a request that could not be relayed.
pub fn upstream_failure(error: &ForwardError) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = error.status();
    response
}
