//! Forward-proxy subsystem.
//!
//! # Module structure
//!
//! - `ssrf` - target URL safety policy
//! - `client` - shared pooled HTTP client
//! - `headers` - hop-by-hop stripping and outbound header construction
//! - `forwarding` - the upstream round trip

mod client;
mod forwarding;
mod headers;
mod ssrf;

pub use client::{create_http_client, HttpClient};
pub use forwarding::forward;
pub use headers::{build_outbound_headers, filter_response_headers};
pub use ssrf::is_valid_proxy_url;
