//! Error types for the inspector forwarding layer.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode, header};
use thiserror::Error;

/// Errors that can occur while forwarding a single request.
///
/// They are local to the request: the forwarder keeps serving afterwards.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Invalid URI or target (maps to 400 Bad Request)
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// Connection error to the inspector UI (maps to 502 Bad Gateway)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Connection refused by the inspector UI (maps to 502 Bad Gateway)
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// Protocol upgrade handshake failed (maps to 502 Bad Gateway)
    #[error("Upgrade failed: {0}")]
    Upgrade(String),
}

impl ProxyError {
    /// Convert error to HTTP response with appropriate status code.
    ///
    /// Forwarding failures answer `502` with a plain-text body of the form
    /// `Proxy error: <message>`.
    pub fn to_response(&self) -> Response<Full<Bytes>> {
        let status = match self {
            ProxyError::InvalidUri(_) => StatusCode::BAD_REQUEST,
            ProxyError::Connection(_)
            | ProxyError::ConnectionRefused(_)
            | ProxyError::Upgrade(_) => StatusCode::BAD_GATEWAY,
        };

        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Full::new(Bytes::from(format!("Proxy error: {self}"))))
            .unwrap_or_else(|_| {
                let mut resp = Response::new(Full::new(Bytes::from("500 Internal Server Error")));
                *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                resp
            })
    }
}

/// Result type alias for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Render `err` and every error in its `source()` chain, joined with `: `.
///
/// hyper-util's client errors only name their kind (`client error (Connect)`);
/// the cause that belongs in the `502` body sits further down the chain.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        // Some errors already embed their source in their own message.
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
