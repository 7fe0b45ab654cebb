//! Mock inspector UI for integration testing.
//!
//! The HTTP mock echoes method, path+query, `Host` and body so tests can see
//! exactly what the forwarder sent. The upgrade mock speaks just enough
//! HTTP/1.1 to accept an upgrade and then echoes raw bytes.

use std::net::SocketAddr;
use std::path::Path;

use axum::Router;
use axum::http::{HeaderMap, Method, Uri};
use mcp_dev_core::{LaunchConfig, SessionToken};
use mcp_dev_proxy::{Forwarder, ForwardingService, LaunchParams};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

/// Token used by every test forwarder.
pub const TEST_TOKEN: &str = "5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed";

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> String {
    let host = headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    format!("{method} {uri} host={host} body={body}")
}

/// Start the echo server on loopback; returns its port.
pub async fn start_echo_upstream() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let app = Router::new().fallback(echo);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

/// Start an endpoint that answers any request with `101 Switching Protocols`
/// and then echoes every byte it receives.
pub async fn start_upgrade_upstream() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                if read_head(&mut stream).await.is_none() {
                    return;
                }
                stream
                    .write_all(
                        b"HTTP/1.1 101 Switching Protocols\r\n\
                          Connection: Upgrade\r\n\
                          Upgrade: websocket\r\n\r\n",
                    )
                    .await
                    .unwrap();
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    port
}

/// Start an endpoint that reads each request head and closes the connection
/// without answering.
pub async fn start_hangup_upstream() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let _ = read_head(&mut stream).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    port
}

/// Read an HTTP head (up to and including the blank line).
pub async fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte).await {
            Ok(0) | Err(_) => return None,
            Ok(_) => head.push(byte[0]),
        }
    }
    String::from_utf8(head).ok()
}

/// A port with nothing listening on it.
pub async fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub fn test_params(client_port: u16) -> LaunchParams {
    let config = LaunchConfig {
        server_port: 10777,
        client_port,
        external_port: 5777,
        session_token: SessionToken::from_hex(TEST_TOKEN),
    };
    LaunchParams::new(&config, Path::new("/srv/workshop"))
}

/// Start a forwarder on an ephemeral loopback port targeting `client_port`.
pub async fn start_forwarder(client_port: u16) -> Forwarder {
    let service = ForwardingService::new(
        client_port,
        test_params(client_port),
        CancellationToken::new(),
    );
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    Forwarder::bind(addr, service).await.unwrap()
}

/// HTTP client that does not follow redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
