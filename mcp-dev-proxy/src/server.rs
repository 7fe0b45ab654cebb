//! Listener and accept loop for the forwarding service.
//!
//! Two cancellation tokens split shutdown in two steps: `engine` drains open
//! connections and upgrade tunnels, `listener` stops accepting and drops the
//! socket.

use std::net::SocketAddr;
use std::time::Duration;

use http_body_util::BodyExt;
use hyper::Request;
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{debug, error, info};

use crate::proxy_service::ForwardingService;

/// Bound on waiting for the accept loop to release the socket.
const LISTENER_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on a graceful connection shutdown.
const CONNECTION_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A running forwarder: bound socket, accept loop and its shutdown handles.
#[derive(Debug)]
pub struct Forwarder {
    local_addr: SocketAddr,
    engine: CancellationToken,
    listener_shutdown: CancellationToken,
    accept_task: JoinHandle<()>,
}

impl Forwarder {
    /// Bind `addr` and start serving `service`.
    ///
    /// Closing the engine cancels the service's own engine token, which also
    /// ends its upgrade tunnels.
    ///
    /// # Errors
    ///
    /// Returns the bind error if the address is unavailable.
    pub async fn bind(addr: SocketAddr, service: ForwardingService) -> std::io::Result<Self> {
        let engine = service.engine();
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let listener_shutdown = CancellationToken::new();

        info!(%local_addr, target_port = service.target_port(), "forwarder listening");

        let accept_task = tokio::spawn(accept_loop(
            listener,
            service,
            engine.clone(),
            listener_shutdown.clone(),
        ));

        Ok(Self {
            local_addr,
            engine,
            listener_shutdown,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Gracefully end open connections and upgrade tunnels.
    pub fn close_engine(&self) {
        self.engine.cancel();
    }

    /// Stop accepting and wait for the listening socket to be dropped.
    pub async fn close_listener(self) {
        self.listener_shutdown.cancel();
        match tokio::time::timeout(LISTENER_CLOSE_TIMEOUT, self.accept_task).await {
            Ok(Ok(())) => info!("HTTP server closed"),
            Ok(Err(e)) => error!(error = %e, "accept loop failed"),
            Err(_) => error!("accept loop did not stop in time"),
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    service: ForwardingService,
    engine: CancellationToken,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                debug!("accept loop stopping");
                break;
            }
            accept = listener.accept() => {
                match accept {
                    Ok((stream, peer_addr)) => {
                        let _ = stream.set_nodelay(true);
                        let service = service.clone();
                        let engine = engine.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, peer_addr, service, engine).await;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "accept failed");
                    }
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    service: ForwardingService,
    engine: CancellationToken,
) {
    let io = TokioIo::new(stream);

    let svc_fn = hyper::service::service_fn(move |req: Request<Incoming>| {
        let mut svc = service.clone();
        async move {
            let result: Result<_, std::convert::Infallible> = match svc.call(req).await {
                Ok(response) => Ok(response.map(|body| {
                    body.map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { e.into() })
                        .boxed()
                })),
                Err(e) => {
                    error!(error = %e, "Proxy error");
                    Ok(e.to_response()
                        .map(|body| body.map_err(|e| match e {}).boxed()))
                }
            };
            result
        }
    });

    let builder = auto::Builder::new(hyper_util::rt::TokioExecutor::new());
    let conn = builder.serve_connection_with_upgrades(io, svc_fn);
    tokio::pin!(conn);

    tokio::select! {
        result = &mut conn => {
            if let Err(e) = result {
                debug!(%peer_addr, error = %e, "connection ended with error");
            }
        }
        () = engine.cancelled() => {
            conn.as_mut().graceful_shutdown();
            // Streaming responses (SSE) never finish on their own.
            if tokio::time::timeout(CONNECTION_DRAIN_TIMEOUT, conn).await.is_err() {
                debug!(%peer_addr, "connection dropped after drain timeout");
            }
        }
    }
}
