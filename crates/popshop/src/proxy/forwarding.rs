//! The upstream round trip.
//!
//! The URL policy runs before anything touches the network; a rejected
//! target is never dialed. Transport and timeout failures after that point
//! surface as 502s with a diagnostic body; the timeout covers the full
//! round trip including reading the upstream body.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::HeaderMap;
use hyper::{Request, Response, Uri};
use tracing::debug;

use super::client::HttpClient;
use super::headers::{build_outbound_headers, filter_response_headers};
use super::ssrf::is_valid_proxy_url;
use crate::config::ProxyTarget;
use crate::error::ProxyError;

/// Forward a request to `target` and relay the upstream's answer.
pub async fn forward(
    client: &HttpClient,
    target: &ProxyTarget,
    blocked_ports: &[u16],
    incoming_method: &str,
    incoming_headers: &HeaderMap,
    body: Bytes,
    client_ip: &str,
) -> Result<Response<Full<Bytes>>, ProxyError> {
    if !is_valid_proxy_url(&target.url, blocked_ports) {
        return Err(ProxyError::UnsafeUrl);
    }
    let uri: Uri = target.url.parse().map_err(|_| ProxyError::UnsafeUrl)?;

    let method = outbound_method(target, incoming_method)?;
    let headers = build_outbound_headers(incoming_headers, &target.headers, client_ip);
    let body = if method_admits_body(&method) {
        body
    } else {
        Bytes::new()
    };

    debug!("forwarding {} {} (timeout {}ms)", method, uri, target.timeout_ms);

    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Full::new(body))
        .map_err(|e| ProxyError::Transport(e.to_string()))?;
    *request.headers_mut() = headers;

    let round_trip = async {
        let response = client
            .request(request)
            .await
            .map_err(|e| ProxyError::Transport(e.to_string()))?;
        let (parts, body) = response.into_parts();
        let bytes = body
            .collect()
            .await
            .map_err(|e| ProxyError::UpstreamBody(e.to_string()))?
            .to_bytes();
        Ok::<_, ProxyError>((parts, bytes))
    };

    let (parts, bytes) = tokio::time::timeout(Duration::from_millis(target.timeout_ms), round_trip)
        .await
        .map_err(|_| ProxyError::Timeout)??;

    let mut downstream = Response::builder()
        .status(parts.status)
        .body(Full::new(bytes))
        .map_err(|e| ProxyError::Transport(e.to_string()))?;
    *downstream.headers_mut() = filter_response_headers(&parts.headers);

    Ok(downstream)
}

/// The verb for the outbound request: the target's override when present,
/// otherwise the incoming verb, upper-cased either way.
fn outbound_method(target: &ProxyTarget, incoming: &str) -> Result<hyper::Method, ProxyError> {
    let verb = match &target.method_override {
        Some(m) => m.as_str().to_string(),
        None => incoming.to_ascii_uppercase(),
    };
    hyper::Method::from_bytes(verb.as_bytes())
        .map_err(|_| ProxyError::Transport(format!("invalid outbound method '{verb}'")))
}

/// GET and HEAD requests are forwarded without a body.
fn method_admits_body(method: &hyper::Method) -> bool {
    *method != hyper::Method::GET && *method != hyper::Method::HEAD
}
