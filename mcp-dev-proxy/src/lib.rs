//! HTTP side of the MCP Inspector dev launcher.
//!
//! A reverse proxy that redirects root requests to a URL carrying the launch
//! parameters and forwards everything else, WebSocket upgrades included, to
//! the inspector UI.

pub mod error;
pub mod proxy_service;
pub mod rewrite;
pub mod server;

pub use error::{ProxyError, ProxyResult};
pub use proxy_service::{ForwardingService, UnifiedBody};
pub use rewrite::LaunchParams;
pub use server::Forwarder;
