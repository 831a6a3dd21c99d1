//! Shared upstream HTTP client.
//!
//! One pooled client is built at startup and reused by every proxy rule;
//! the pool is internally synchronized and safe to share across request
//! tasks. HTTP/1.1 only, with rustls for https targets.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::info;

/// Type alias for the client used for upstream requests.
pub type HttpClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

const POOL_MAX_IDLE_PER_HOST: usize = 32;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;
const CONNECT_TIMEOUT_SECS: u64 = 10;
const KEEPALIVE_SECS: u64 = 60;

/// Create the shared client with connection pooling.
pub fn create_http_client() -> HttpClient {
    let mut http_connector = HttpConnector::new();
    http_connector.set_keepalive(Some(Duration::from_secs(KEEPALIVE_SECS)));
    http_connector.set_connect_timeout(Some(Duration::from_secs(CONNECT_TIMEOUT_SECS)));
    http_connector.enforce_http(false); // Allow both HTTP and HTTPS

    let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()
        .expect("failed to load native root certificates")
        .https_or_http()
        .enable_http1()
        .wrap_connector(http_connector);

    let client = Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .build(https_connector);

    info!(
        "upstream connection pool configured (HTTP/1.1): max_idle={}, idle_timeout={}s",
        POOL_MAX_IDLE_PER_HOST, POOL_IDLE_TIMEOUT_SECS
    );

    client
}
