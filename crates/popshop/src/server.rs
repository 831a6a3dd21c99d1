//! HTTP listener and graceful shutdown.
//!
//! One connection task per accepted socket; each request goes through the
//! shared pipeline. On ctrl-c the accept loop stops first, then in-flight
//! requests get a grace period before the process exits.

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::pipeline::Pipeline;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Bind and serve until ctrl-c.
pub async fn run(pipeline: Arc<Pipeline>, host: &str, port: u16) -> Result<(), anyhow::Error> {
    let listener = TcpListener::bind((host, port))
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {host}:{port}: {e}"))?;
    let addr = listener.local_addr()?;
    info!("listening on http://{}", addr);

    serve(listener, pipeline, tokio::signal::ctrl_c()).await;
    Ok(())
}

/// Accept loop, separated from binding so tests can drive it on an
/// ephemeral port with their own shutdown future.
pub async fn serve(
    listener: TcpListener,
    pipeline: Arc<Pipeline>,
    shutdown: impl std::future::Future,
) {
    let in_flight = Arc::new(AtomicUsize::new(0));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, remote_addr)) => {
                        let pipeline = Arc::clone(&pipeline);
                        let in_flight = Arc::clone(&in_flight);
                        tokio::spawn(async move {
                            in_flight.fetch_add(1, Ordering::SeqCst);
                            let io = TokioIo::new(stream);
                            let service = service_fn(move |req| {
                                let pipeline = Arc::clone(&pipeline);
                                async move {
                                    Ok::<_, Infallible>(
                                        pipeline.handle(req, Some(remote_addr)).await,
                                    )
                                }
                            });
                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                debug!("connection error from {}: {}", remote_addr, e);
                            }
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                    Err(e) => {
                        error!("accept error: {}", e);
                    }
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, draining in-flight requests");
                break;
            }
        }
    }

    // Accepting has stopped; give in-flight requests the grace period.
    let deadline = Instant::now() + SHUTDOWN_GRACE;
    while in_flight.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let remaining = in_flight.load(Ordering::SeqCst);
    if remaining > 0 {
        warn!("grace period elapsed with {} requests still in flight", remaining);
    }
    info!("shutdown complete");
}
