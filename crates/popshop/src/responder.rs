//! Mock response construction.
//!
//! Turns a matched rule's canned payload into an HTTP response. Headers are
//! copied verbatim; the only default applied is `Content-Type:
//! application/json` when the rule doesn't set one.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::CONTENT_TYPE;
use hyper::{Response, StatusCode};

use crate::config::MockResponse;

/// Build the response for a matched mock rule.
pub fn mock_response(mock: &MockResponse) -> Response<Full<Bytes>> {
    let status =
        StatusCode::from_u16(mock.status).unwrap_or(StatusCode::OK);

    let mut builder = Response::builder().status(status);

    let mut has_content_type = false;
    for (name, value) in &mock.headers {
        if name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()) {
            has_content_type = true;
        }
        builder = builder.header(name.as_str(), value.as_str());
    }
    if !has_content_type {
        builder = builder.header(CONTENT_TYPE, "application/json");
    }

    builder
        .body(Full::new(mock.body.clone()))
        .unwrap_or_else(|_| {
            // Only reachable if a configured header name/value is invalid
            // on the wire; degrade to the body without custom headers.
            Response::new(Full::new(mock.body.clone()))
        })
}
