//! CORS decoration.
//!
//! OPTIONS requests short-circuit with a 200 carrying the CORS headers;
//! every other response, success or rejection, is decorated on the way
//! out so browser clients can always read error statuses.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Response, StatusCode};

pub static ALLOW_ORIGIN: HeaderName = HeaderName::from_static("access-control-allow-origin");
pub static ALLOW_METHODS: HeaderName = HeaderName::from_static("access-control-allow-methods");
pub static ALLOW_HEADERS: HeaderName = HeaderName::from_static("access-control-allow-headers");

static METHODS_VALUE: HeaderValue =
    HeaderValue::from_static("GET, POST, PUT, DELETE, PATCH, OPTIONS");
static HEADERS_VALUE: HeaderValue = HeaderValue::from_static("Content-Type, Authorization");

/// Add the CORS headers to an outgoing response.
pub fn decorate_response<B>(response: &mut Response<B>, allow_origin: &str) {
    let origin = HeaderValue::from_str(allow_origin)
        .unwrap_or_else(|_| HeaderValue::from_static("*"));
    let headers = response.headers_mut();
    headers.insert(ALLOW_ORIGIN.clone(), origin);
    headers.insert(ALLOW_METHODS.clone(), METHODS_VALUE.clone());
    headers.insert(ALLOW_HEADERS.clone(), HEADERS_VALUE.clone());
}

/// The short-circuit answer for a preflight OPTIONS request.
pub fn preflight_response(allow_origin: &str) -> Response<Full<Bytes>> {
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())));
    decorate_response(&mut response, allow_origin);
    response
}
