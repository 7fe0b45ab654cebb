//! Reverse proxy in front of the inspector UI.
//!
//! # Request Flow
//!
//! ```text
//! Request<Incoming> ──► is_upgrade_request()?
//!                              │
//!         ┌─── yes ────────────┴──────────── no ───┐
//!         │                                        │
//!   handle_upgrade()                      rewrite_root()?
//!   dedicated HTTP/1.1 conn                 │           │
//!   101 → copy_bidirectional           Some(loc)      None
//!                                           │           │
//!                                      302 Location  handle_http_request()
//!                                                    streaming passthrough
//! ```
//!
//! The target is always `http://localhost:<client_port>`. The `Host` header
//! is rewritten to the target; everything else except hop-by-hop headers is
//! passed through.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use http::{HeaderValue, Uri};
use http_body_util::{BodyExt, BodyStream, Empty, StreamBody};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode, header};
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{debug, error, info, warn};

use crate::error::{ProxyError, ProxyResult, error_chain};
use crate::rewrite::{LaunchParams, rewrite_root};

/// Type alias for the client's streaming body type.
type ClientBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// Type alias for the unified response body type.
pub type UnifiedBody = http_body_util::combinators::BoxBody<Bytes, ProxyError>;

/// Host the inspector UI is reached on.
const TARGET_HOST: &str = "localhost";

/// Forwarding service for one inspector instance.
///
/// Cheap to clone; clones share the connection pool and the engine token.
#[derive(Clone)]
pub struct ForwardingService {
    /// Pooled client for plain requests.
    client: Client<HttpConnector, ClientBody>,
    /// Port of the inspector UI.
    target_port: u16,
    /// Parameters merged into root requests.
    params: Arc<LaunchParams>,
    /// Cancelled when the engine closes; ends open upgrade tunnels.
    engine: CancellationToken,
}

impl ForwardingService {
    /// Create a service forwarding to `localhost:<target_port>`.
    pub fn new(target_port: u16, params: LaunchParams, engine: CancellationToken) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build(connector);

        Self {
            client,
            target_port,
            params: Arc::new(params),
            engine,
        }
    }

    pub fn target_port(&self) -> u16 {
        self.target_port
    }

    /// Token that closes this service's connections and tunnels.
    pub fn engine(&self) -> CancellationToken {
        self.engine.clone()
    }

    /// `host:port` authority of the inspector UI.
    fn target_authority(&self) -> String {
        format!("{TARGET_HOST}:{}", self.target_port)
    }

    /// Handle one inbound request.
    pub async fn handle_request(
        &self,
        req: Request<Incoming>,
    ) -> ProxyResult<Response<UnifiedBody>> {
        if is_upgrade_request(&req) {
            return self.handle_upgrade(req).await;
        }

        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        if let Some(location) = rewrite_root(path_and_query, &self.params) {
            debug!(from = %path_and_query, to = %location, "redirecting root request");
            return redirect(&location);
        }

        self.handle_http_request(req).await
    }

    /// Forward a plain request with a streamed body in both directions.
    pub async fn handle_http_request(
        &self,
        req: Request<Incoming>,
    ) -> ProxyResult<Response<UnifiedBody>> {
        let target_uri = self.target_uri(&req)?;

        info!(
            method = %req.method(),
            uri = %req.uri(),
            target = %target_uri,
            "Proxying request"
        );

        let (parts, incoming_body) = req.into_parts();

        let mut upstream_req = Request::builder()
            .method(parts.method)
            .uri(target_uri)
            .version(parts.version);

        let headers = upstream_req.headers_mut().ok_or_else(|| {
            error!("Failed to get mutable headers from request builder");
            ProxyError::Connection("Request builder in invalid state".to_string())
        })?;
        self.copy_headers(parts.headers, headers)?;

        let body_stream = BodyStream::new(incoming_body);
        let mapped_stream = body_stream.map(|result| {
            result.map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
                Box::new(std::io::Error::other(format!("Body stream error: {}", e)))
            })
        });
        let boxed_body: ClientBody = BodyExt::boxed(StreamBody::new(mapped_stream));

        let upstream_req = upstream_req.body(boxed_body).map_err(|e| {
            error!(error = %e, "Failed to build upstream request");
            ProxyError::Connection(format!("Failed to build request: {}", e))
        })?;

        let upstream_res = self
            .client
            .request(upstream_req)
            .await
            .map_err(map_client_error)?;

        let (parts, body) = upstream_res.into_parts();
        let body_stream = BodyStream::new(body);
        let mapped_stream = body_stream.map(|result| {
            result.map_err(|e| ProxyError::Connection(format!("Body stream error: {}", e)))
        });
        let boxed_body: UnifiedBody = BodyExt::boxed(StreamBody::new(mapped_stream));

        Ok(Response::from_parts(parts, boxed_body))
    }

    /// Bridge a protocol upgrade (WebSocket) to the inspector.
    ///
    /// Opens a dedicated HTTP/1.1 connection with upgrades enabled. On `101`
    /// both sides are upgraded and bytes are copied until either side closes
    /// or the engine is cancelled. Any other answer is relayed as-is.
    async fn handle_upgrade(
        &self,
        mut req: Request<Incoming>,
    ) -> ProxyResult<Response<UnifiedBody>> {
        let protocol = get_upgrade_protocol(&req);
        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        info!(
            uri = %req.uri(),
            upgrade_protocol = ?protocol,
            target_port = self.target_port,
            "Proxying upgrade request"
        );

        let client_upgrade = hyper::upgrade::on(&mut req);

        let mut upstream_req = Request::builder()
            .method(req.method().clone())
            .uri(path_and_query)
            .version(http::Version::HTTP_11);
        let headers = upstream_req.headers_mut().ok_or_else(|| {
            ProxyError::Upgrade("Request builder in invalid state".to_string())
        })?;
        self.copy_headers(req.headers().clone(), headers)?;
        let upstream_req = upstream_req
            .body(Empty::<Bytes>::new())
            .map_err(|e| ProxyError::Upgrade(format!("Failed to build request: {}", e)))?;

        let stream = TcpStream::connect((TARGET_HOST, self.target_port))
            .await
            .map_err(map_connect_error)?;
        let _ = stream.set_nodelay(true);

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| ProxyError::Upgrade(format!("Handshake failed: {}", error_chain(&e))))?;
        tokio::spawn(async move {
            if let Err(e) = conn.with_upgrades().await {
                debug!(error = %e, "upstream upgrade connection ended with error");
            }
        });

        let mut upstream_res = sender
            .send_request(upstream_req)
            .await
            .map_err(|e| {
                ProxyError::Upgrade(format!("Upstream request failed: {}", error_chain(&e)))
            })?;

        if !is_upgrade_response(&upstream_res) {
            debug!(status = %upstream_res.status(), "upstream declined upgrade");
            let (parts, body) = upstream_res.into_parts();
            let body = body
                .map_err(|e| ProxyError::Connection(format!("Body stream error: {}", e)))
                .boxed();
            return Ok(Response::from_parts(parts, body));
        }

        let upstream_upgrade = hyper::upgrade::on(&mut upstream_res);
        let engine = self.engine.clone();
        tokio::spawn(async move {
            let (client_io, upstream_io) = match tokio::try_join!(client_upgrade, upstream_upgrade)
            {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "upgrade did not complete");
                    return;
                }
            };
            let mut client_io = TokioIo::new(client_io);
            let mut upstream_io = TokioIo::new(upstream_io);

            tokio::select! {
                result = tokio::io::copy_bidirectional(&mut client_io, &mut upstream_io) => {
                    match result {
                        Ok((to_upstream, to_client)) => {
                            debug!(to_upstream, to_client, "upgrade tunnel closed");
                        }
                        Err(e) => debug!(error = %e, "upgrade tunnel closed with error"),
                    }
                }
                () = engine.cancelled() => {
                    debug!("upgrade tunnel closed by shutdown");
                }
            }
        });

        let (parts, _body) = upstream_res.into_parts();
        let body = Empty::<Bytes>::new().map_err(|e| match e {}).boxed();
        Ok(Response::from_parts(parts, body))
    }

    /// Copy end-to-end headers and point `Host` at the inspector.
    fn copy_headers(
        &self,
        source: http::HeaderMap,
        target: &mut http::HeaderMap,
    ) -> ProxyResult<()> {
        let mut current = None;
        for (name_opt, value) in source {
            // `None` repeats the previous name for multi-valued headers.
            if let Some(name) = name_opt {
                current = Some(name);
            }
            if let Some(name) = &current
                && !is_hop_by_hop_header(name.as_str())
            {
                target.append(name.clone(), value);
            }
        }

        let host = HeaderValue::from_str(&self.target_authority())
            .map_err(|e| ProxyError::InvalidUri(format!("Invalid target host: {}", e)))?;
        target.insert(header::HOST, host);
        Ok(())
    }

    fn target_uri<B>(&self, req: &Request<B>) -> ProxyResult<Uri> {
        let path = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        format!("http://{}{}", self.target_authority(), path)
            .parse()
            .map_err(|e| ProxyError::InvalidUri(format!("Failed to parse target URI: {}", e)))
    }
}

impl Service<Request<Incoming>> for ForwardingService {
    type Response = Response<UnifiedBody>;
    type Error = ProxyError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { service.handle_request(req).await })
    }
}

fn redirect(location: &str) -> ProxyResult<Response<UnifiedBody>> {
    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location)
        .body(Empty::<Bytes>::new().map_err(|e| match e {}).boxed())
        .map_err(|e| ProxyError::InvalidUri(format!("Invalid redirect location: {}", e)))
}

/// Check if a header is a hop-by-hop header that shouldn't be forwarded.
///
/// `connection`, `upgrade` and `transfer-encoding` are kept so upgrades and
/// chunked bodies survive the hop.
fn is_hop_by_hop_header(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "keep-alive" | "proxy-authenticate" | "proxy-authorization" | "te" | "trailers"
    )
}

/// Check if a request is attempting a protocol upgrade.
pub fn is_upgrade_request<B>(req: &Request<B>) -> bool {
    req.headers()
        .get(header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_lowercase().contains("upgrade"))
        .unwrap_or(false)
        && req.headers().contains_key(header::UPGRADE)
}

/// Get the upgrade protocol from request headers.
pub fn get_upgrade_protocol<B>(req: &Request<B>) -> Option<String> {
    req.headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_lowercase())
}

/// Check if a response indicates a successful protocol upgrade.
pub fn is_upgrade_response<B>(res: &Response<B>) -> bool {
    res.status() == StatusCode::SWITCHING_PROTOCOLS
}

/// Map hyper_util client errors to ProxyError variants.
///
/// The message carries the whole source chain so the `502` body names the
/// actual cause, not just `client error (Connect)`.
fn map_client_error(e: hyper_util::client::legacy::Error) -> ProxyError {
    let cause = error_chain(&e);

    if e.is_connect() {
        if cause.to_lowercase().contains("connection refused") {
            warn!(error = %cause, "Inspector UI refused connection");
            return ProxyError::ConnectionRefused(format!("Inspector UI refused connection: {cause}"));
        }
        warn!(error = %cause, "Inspector UI connection failed");
        return ProxyError::Connection(format!("Failed to connect to inspector UI: {cause}"));
    }

    warn!(error = %cause, "Inspector UI error");
    ProxyError::Connection(format!("Inspector UI error: {cause}"))
}

fn map_connect_error(e: std::io::Error) -> ProxyError {
    let cause = error_chain(&e);
    if e.kind() == std::io::ErrorKind::ConnectionRefused {
        warn!(error = %cause, "Inspector UI refused upgrade connection");
        ProxyError::ConnectionRefused(format!("Inspector UI refused connection: {cause}"))
    } else {
        warn!(error = %cause, "Inspector UI upgrade connection failed");
        ProxyError::Connection(format!("Failed to connect to inspector UI: {cause}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_hop_by_hop_headers() {
        assert!(is_hop_by_hop_header("keep-alive"));
        assert!(is_hop_by_hop_header("Keep-Alive"));
        assert!(is_hop_by_hop_header("proxy-authorization"));
        assert!(is_hop_by_hop_header("TE"));

        assert!(!is_hop_by_hop_header("content-type"));
        assert!(!is_hop_by_hop_header("authorization"));
        assert!(!is_hop_by_hop_header("connection"));
        assert!(!is_hop_by_hop_header("upgrade"));
        assert!(!is_hop_by_hop_header("transfer-encoding"));
    }

    #[test]
    fn test_upgrade_detection() {
        let ws = Request::builder()
            .method(Method::GET)
            .uri("/sse")
            .header("connection", "keep-alive, Upgrade")
            .header("upgrade", "websocket")
            .body(())
            .unwrap();
        assert!(is_upgrade_request(&ws));
        assert_eq!(get_upgrade_protocol(&ws), Some("websocket".to_string()));

        let plain = Request::builder()
            .uri("/")
            .header("connection", "keep-alive")
            .body(())
            .unwrap();
        assert!(!is_upgrade_request(&plain));

        let upgrade_without_header = Request::builder()
            .uri("/")
            .header("connection", "upgrade")
            .body(())
            .unwrap();
        assert!(!is_upgrade_request(&upgrade_without_header));
    }

    #[test]
    fn test_upgrade_response_detection() {
        let switching = Response::builder()
            .status(StatusCode::SWITCHING_PROTOCOLS)
            .body(())
            .unwrap();
        assert!(is_upgrade_response(&switching));

        let ok = Response::builder().status(StatusCode::OK).body(()).unwrap();
        assert!(!is_upgrade_response(&ok));
    }

    #[tokio::test]
    async fn test_target_uri_and_host_rewrite() {
        let service = ForwardingService::new(
            9123,
            test_params(),
            CancellationToken::new(),
        );
        let req = Request::builder()
            .uri("/assets/app.js?v=2")
            .header("host", "localhost:5173")
            .body(())
            .unwrap();

        assert_eq!(
            service.target_uri(&req).unwrap().to_string(),
            "http://localhost:9123/assets/app.js?v=2"
        );

        let mut source = http::HeaderMap::new();
        source.insert(header::HOST, HeaderValue::from_static("localhost:5173"));
        source.append("x-multi", HeaderValue::from_static("a"));
        source.append("x-multi", HeaderValue::from_static("b"));
        source.insert("keep-alive", HeaderValue::from_static("timeout=5"));

        let mut target = http::HeaderMap::new();
        service.copy_headers(source, &mut target).unwrap();

        assert_eq!(target.get(header::HOST).unwrap(), "localhost:9123");
        assert_eq!(target.get_all("x-multi").iter().count(), 2);
        assert!(!target.contains_key("keep-alive"));
    }

    fn test_params() -> LaunchParams {
        let config = mcp_dev_core::LaunchConfig {
            server_port: 10001,
            client_port: 9123,
            external_port: 5173,
            session_token: mcp_dev_core::SessionToken::from_hex("00".repeat(32)),
        };
        LaunchParams::new(&config, std::path::Path::new("/tmp"))
    }
}
