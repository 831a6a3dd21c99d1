//! Ingress guard chain.
//!
//! Guards run in a fixed order before any rule work: size limits, then
//! rate limiting, then Host validation. The per-request timeout wraps
//! only the downstream handler, and CORS decoration wraps everything,
//! including guard rejections, so preflights and error responses stay
//! CORS-visible. The composition itself lives in the request pipeline.

mod cors;
mod host;
mod limits;
mod rate_limit;

pub use cors::{decorate_response, preflight_response, ALLOW_HEADERS, ALLOW_METHODS, ALLOW_ORIGIN};
pub use host::check_host;
pub use limits::{check_body_size, check_content_length, check_header_size};
pub use rate_limit::{client_identity, RateLimiter};
