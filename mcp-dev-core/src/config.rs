//! Launch configuration and the fixed constants of the inspector contract.
//!
//! `LaunchConfig` is computed once at startup and never mutated. Everything
//! that the sidecar and the proxy need to agree on (ports, session token,
//! allowed origins) is derived from it.

use std::time::Duration;

use crate::error::LaunchResult;
use crate::ports::{PortRange, find_available_port};
use crate::token::SessionToken;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Candidate range for the inspector's internal proxy server port.
pub const SERVER_PORT_RANGE: PortRange = PortRange::new(10000, 10999);

/// Candidate range for the inspector's web UI port.
pub const CLIENT_PORT_RANGE: PortRange = PortRange::new(9000, 9999);

/// Stdout marker printed once the inspector UI is serving.
pub const READY_MARKER: &str = "MCP Inspector is up and running";

/// Stdout marker printed by the inspector's internal proxy. Suppressed from
/// the relay because the launcher prints its own summary.
pub const LISTENING_MARKER: &str = "Proxy server listening on port";

/// How long to wait for [`READY_MARKER`] before giving up.
pub const READINESS_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Grace period between SIGTERM and SIGKILL when stopping the sidecar.
pub const TERMINATION_GRACE: Duration = Duration::from_secs(2);

/// Upper bound on a single inspector request, in milliseconds.
pub const REQUEST_MAX_TOTAL_TIMEOUT_MS: u64 = 900_000;

/// Per-request timeout toward the MCP server, in milliseconds.
pub const SERVER_REQUEST_TIMEOUT_MS: u64 = 300_000;

// Sidecar environment contract.
pub const ENV_SERVER_PORT: &str = "SERVER_PORT";
pub const ENV_CLIENT_PORT: &str = "CLIENT_PORT";
pub const ENV_PROXY_TOKEN: &str = "MCP_PROXY_TOKEN";
pub const ENV_AUTO_OPEN: &str = "MCP_AUTO_OPEN_ENABLED";
pub const ENV_ALLOWED_ORIGINS: &str = "ALLOWED_ORIGINS";

// ─────────────────────────────────────────────────────────────────────────────
// LaunchConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Ports and credentials shared by the launcher, the sidecar and the proxy.
///
/// All three ports are mutually distinct and were free when probed. Another
/// process can still grab one between the probe and the sidecar's bind; that
/// race is accepted.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Port of the inspector's internal proxy server.
    pub server_port: u16,
    /// Port of the inspector's web UI; the forwarding target.
    pub client_port: u16,
    /// Port this launcher listens on.
    pub external_port: u16,
    /// Secret shared between the browser session and the inspector proxy.
    pub session_token: SessionToken,
}

impl LaunchConfig {
    /// Allocate both sidecar ports and a fresh session token.
    ///
    /// The server port is drawn from [`SERVER_PORT_RANGE`] excluding
    /// `external_port`; the client port from [`CLIENT_PORT_RANGE`] excluding
    /// both `external_port` and the server port.
    ///
    /// # Errors
    ///
    /// `LaunchError::Allocation` if either range is exhausted,
    /// `LaunchError::Entropy` if the token cannot be generated.
    pub async fn allocate(external_port: u16) -> LaunchResult<Self> {
        let server_port =
            find_available_port(SERVER_PORT_RANGE, &[external_port], SERVER_PORT_RANGE.len())
                .await?;
        let client_port = find_available_port(
            CLIENT_PORT_RANGE,
            &[external_port, server_port],
            CLIENT_PORT_RANGE.len(),
        )
        .await?;
        let session_token = SessionToken::generate()?;

        tracing::debug!(
            server_port,
            client_port,
            external_port,
            "allocated launch ports"
        );

        Ok(Self {
            server_port,
            client_port,
            external_port,
            session_token,
        })
    }

    /// Origins the inspector must accept: the UI port and the external port,
    /// each under both `localhost` and `127.0.0.1`.
    pub fn allowed_origins(&self) -> [String; 4] {
        [
            format!("http://localhost:{}", self.client_port),
            format!("http://127.0.0.1:{}", self.client_port),
            format!("http://localhost:{}", self.external_port),
            format!("http://127.0.0.1:{}", self.external_port),
        ]
    }

    /// Address the browser uses to reach the inspector's proxy server.
    pub fn proxy_full_address(&self) -> String {
        format!("http://localhost:{}", self.server_port)
    }

    /// Environment variables layered over the host environment at spawn.
    pub fn sidecar_env(&self) -> Vec<(&'static str, String)> {
        vec![
            (ENV_SERVER_PORT, self.server_port.to_string()),
            (ENV_CLIENT_PORT, self.client_port.to_string()),
            (ENV_PROXY_TOKEN, self.session_token.as_str().to_string()),
            (ENV_AUTO_OPEN, "false".to_string()),
            (ENV_ALLOWED_ORIGINS, self.allowed_origins().join(",")),
        ]
    }
}
