//! The per-request pipeline.
//!
//! Binds the guard chain, the matcher, and the two responders into one
//! handler: guards run in order (size, rate limit, host), the per-request
//! timeout wraps everything downstream of them, and CORS decoration runs
//! on every exit path. All failures convert to responses here; nothing
//! escapes to the connection task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::{CONTENT_TYPE, RETRY_AFTER};
use hyper::{Request, Response};
use tracing::{debug, error, info, warn};

use crate::config::{RuleAction, ServerSettings};
use crate::error::{ProxyError, Rejection};
use crate::matcher::{find_match, IncomingRequest};
use crate::middleware::{
    check_body_size, check_content_length, check_header_size, check_host, client_identity,
    decorate_response, preflight_response, RateLimiter,
};
use crate::proxy::{create_http_client, forward, HttpClient};
use crate::responder::mock_response;
use crate::store::RuleStore;

pub struct Pipeline {
    settings: ServerSettings,
    store: Arc<RuleStore>,
    limiter: RateLimiter,
    client: HttpClient,
}

impl Pipeline {
    pub fn new(settings: ServerSettings, store: Arc<RuleStore>) -> Self {
        let limiter = RateLimiter::new(
            settings.rate_limit_requests,
            Duration::from_secs(settings.rate_limit_window_seconds),
        );
        let client = create_http_client();
        Pipeline {
            settings,
            store,
            limiter,
            client,
        }
    }

    /// Handle one request end to end. Always returns a response.
    pub async fn handle<B>(
        &self,
        request: Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let started = Instant::now();
        let method = request.method().as_str().to_string();
        let path = request.uri().path().to_string();

        // Preflights bypass the guards entirely so they always succeed.
        if request.method() == hyper::Method::OPTIONS {
            let response = preflight_response(&self.settings.cors_allow_origin);
            self.log_outcome(&method, &path, response.status().as_u16(), started);
            return response;
        }

        let mut response = match self.run(request, remote_addr).await {
            Ok(response) => response,
            Err(rejection) => {
                self.log_rejection(&method, &path, &rejection);
                self.rejection_response(&rejection)
            }
        };

        decorate_response(&mut response, &self.settings.cors_allow_origin);
        self.log_outcome(&method, &path, response.status().as_u16(), started);
        response
    }

    /// Guards, then the deadline-wrapped handler.
    async fn run<B>(
        &self,
        request: Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> Result<Response<Full<Bytes>>, Rejection>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        check_content_length(request.headers(), self.settings.max_request_size)?;
        check_header_size(request.headers(), self.settings.max_header_size)?;

        let client = client_identity(request.headers(), remote_addr);
        self.limiter.check(&client)?;

        check_host(request.headers(), &self.settings.allowed_hosts)?;

        let deadline = Duration::from_secs(self.settings.request_timeout_seconds);
        tokio::time::timeout(deadline, self.dispatch(request, remote_addr))
            .await
            .map_err(|_| Rejection::RequestTimeout)?
    }

    /// Read the body, match, and answer from the rule.
    async fn dispatch<B>(
        &self,
        request: Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> Result<Response<Full<Bytes>>, Rejection>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let (parts, body) = request.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| Rejection::Internal(format!("failed to read request body: {e}")))?
            .to_bytes();
        // Content-Length is optional; re-check against what actually arrived.
        check_body_size(body.len(), self.settings.max_request_size)?;

        let snapshot = self.store.snapshot();
        let incoming = IncomingRequest {
            method: parts.method.as_str(),
            path: parts.uri.path(),
            headers: &parts.headers,
            body: &body,
        };

        let Some((index, rule)) = find_match(&snapshot, &incoming) else {
            return Err(Rejection::NoRuleMatched);
        };
        debug!("request matched rule {}", rule.display_name(index));

        match &rule.action {
            RuleAction::Mock(mock) => Ok(mock_response(mock)),
            RuleAction::Proxy(target) => {
                let client_ip = remote_addr
                    .map(|addr| addr.ip().to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                let response = forward(
                    &self.client,
                    target,
                    &self.settings.blocked_proxy_ports,
                    parts.method.as_str(),
                    &parts.headers,
                    body,
                    &client_ip,
                )
                .await?;
                Ok(response)
            }
        }
    }

    fn rejection_response(&self, rejection: &Rejection) -> Response<Full<Bytes>> {
        let mut builder = Response::builder()
            .status(rejection.status())
            .header(CONTENT_TYPE, "text/plain; charset=utf-8");

        if let Rejection::RateLimited { retry_after_secs } = rejection {
            builder = builder.header(RETRY_AFTER, retry_after_secs.to_string());
        }

        builder
            .body(Full::new(Bytes::from(rejection.body())))
            .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"Internal server error"))))
    }

    fn log_rejection(&self, method: &str, path: &str, rejection: &Rejection) {
        match rejection {
            Rejection::Proxy(ProxyError::UnsafeUrl) => {
                warn!("{} {} rejected: unsafe proxy URL", method, path);
            }
            Rejection::Proxy(e) => {
                error!("{} {} upstream failure: {}", method, path, e);
            }
            Rejection::Internal(detail) => {
                error!("{} {} internal failure: {}", method, path, detail);
            }
            other => {
                warn!("{} {} rejected: {}", method, path, other);
            }
        }
    }

    fn log_outcome(&self, method: &str, path: &str, status: u16, started: Instant) {
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        info!("{} {} -> {} ({:.1}ms)", method, path, status, latency_ms);
    }
}
