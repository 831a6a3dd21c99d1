//! Request-size and header-size guards.

use hyper::header::{HeaderMap, CONTENT_LENGTH};

use crate::error::Rejection;

/// Reject early when a declared `Content-Length` exceeds the limit. A
/// missing or malformed header passes here; the body guard below catches
/// oversized bodies after the read.
pub fn check_content_length(headers: &HeaderMap, max_request_size: usize) -> Result<(), Rejection> {
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<usize>().ok());

    match declared {
        Some(length) if length > max_request_size => Err(Rejection::RequestTooLarge),
        _ => Ok(()),
    }
}

/// Reject when the summed header lines exceed the limit. Each header
/// counts as its wire form `name: value\r\n`.
pub fn check_header_size(headers: &HeaderMap, max_header_size: usize) -> Result<(), Rejection> {
    let mut total = 0usize;
    for (name, value) in headers {
        total += name.as_str().len() + 2 + value.as_bytes().len() + 2;
        if total > max_header_size {
            return Err(Rejection::HeadersTooLarge);
        }
    }
    Ok(())
}

/// Post-read enforcement for bodies sent without a `Content-Length`.
pub fn check_body_size(body_len: usize, max_request_size: usize) -> Result<(), Rejection> {
    if body_len > max_request_size {
        Err(Rejection::RequestTooLarge)
    } else {
        Ok(())
    }
}
