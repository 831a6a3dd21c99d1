//! Error types shared across the server.
//!
//! Two families: `ConfigError` surfaces at startup and reload time and
//! propagates to the process exit code; `Rejection` covers everything that
//! can go wrong while handling one request and is always converted to an
//! HTTP response at the pipeline boundary.

use std::path::PathBuf;

use hyper::StatusCode;
use thiserror::Error;

/// Errors raised while loading or reloading rule configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A document exists but does not describe a valid rule set.
    #[error("invalid configuration in {file}: {message}")]
    InvalidConfiguration { file: PathBuf, message: String },

    /// The configured path yielded no rules at all.
    #[error("no rules loaded from {path}")]
    EmptyConfiguration { path: PathBuf },

    /// The path could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub fn invalid(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ConfigError::InvalidConfiguration {
            file: file.into(),
            message: message.into(),
        }
    }
}

/// Failure kinds for an upstream proxy round trip.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The target URL failed the safety policy or did not parse.
    #[error("invalid proxy URL")]
    UnsafeUrl,

    /// The upstream did not answer within the target's deadline.
    #[error("upstream request timed out")]
    Timeout,

    /// Connection or protocol failure talking to the upstream.
    #[error("upstream request failed: {0}")]
    Transport(String),

    /// The upstream answered but its body could not be read.
    #[error("failed to read upstream response: {0}")]
    UpstreamBody(String),
}

/// Per-request outcomes that terminate handling with an error response.
///
/// Ordered roughly by where in the pipeline they can occur.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error("request entity too large")]
    RequestTooLarge,

    #[error("request header fields too large")]
    HeadersTooLarge,

    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("host not allowed")]
    InvalidHost,

    #[error("request timeout")]
    RequestTimeout,

    #[error("no matching rule found")]
    NoRuleMatched,

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("internal server error")]
    Internal(String),
}

impl Rejection {
    /// The HTTP status this rejection maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::RequestTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Rejection::HeadersTooLarge => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            Rejection::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Rejection::InvalidHost => StatusCode::BAD_REQUEST,
            Rejection::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Rejection::NoRuleMatched => StatusCode::NOT_FOUND,
            Rejection::Proxy(ProxyError::UnsafeUrl) => StatusCode::BAD_REQUEST,
            Rejection::Proxy(_) => StatusCode::BAD_GATEWAY,
            Rejection::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The response body sent to the client.
    pub fn body(&self) -> String {
        match self {
            Rejection::RequestTooLarge => "Request entity too large".to_string(),
            Rejection::HeadersTooLarge => "Request header fields too large".to_string(),
            Rejection::RateLimited { .. } => "Rate limit exceeded".to_string(),
            Rejection::InvalidHost => "Host not allowed".to_string(),
            Rejection::RequestTimeout => "Request timeout".to_string(),
            Rejection::NoRuleMatched => "No matching rule found".to_string(),
            Rejection::Proxy(ProxyError::UnsafeUrl) => "Invalid proxy URL".to_string(),
            Rejection::Proxy(e) => e.to_string(),
            Rejection::Internal(_) => "Internal server error".to_string(),
        }
    }
}
