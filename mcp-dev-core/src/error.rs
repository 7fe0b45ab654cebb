//! Error taxonomy for launching and supervising the inspector sidecar.
//!
//! Every variant here is fatal to the launcher: there are no retries. The
//! binary maps them to exit status 1 after printing a diagnostic.

use std::time::Duration;

use thiserror::Error;

use crate::sidecar::Platform;

/// Errors raised while preparing, spawning or waiting on the sidecar.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// No free port was found in the candidate range.
    #[error("no available port in range {start}-{end}")]
    Allocation {
        /// First port of the exhausted range.
        start: u16,
        /// Last port of the exhausted range (inclusive).
        end: u16,
    },

    /// The operating system entropy source could not be read.
    #[error("failed to read OS entropy for session token: {reason}")]
    Entropy { reason: String },

    /// The sidecar executable could not be started.
    #[error("failed to spawn '{command}': {reason}")]
    Spawn {
        command: String,
        reason: String,
        platform: Platform,
    },

    /// The readiness marker did not appear in time.
    #[error("MCP Inspector failed to start within {} seconds", .timeout.as_secs())]
    ReadinessTimeout { timeout: Duration },

    /// The sidecar exited before it reported readiness.
    #[error("MCP Inspector exited with code {}", display_code(.code))]
    ProcessExited { code: Option<i32> },

    /// The sidecar exited while the proxy was serving traffic.
    #[error("MCP Inspector stopped unexpectedly with code {}", display_code(.code))]
    SidecarStopped { code: Option<i32> },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LaunchError {
    /// Platform-specific troubleshooting tips for this error.
    ///
    /// Only spawn failures carry hints; every other variant returns an empty
    /// list.
    pub fn remediation_hints(&self) -> &'static [&'static str] {
        match self {
            LaunchError::Spawn { platform, .. } => platform.remediation_hints(),
            _ => &[],
        }
    }
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

/// Result alias for launcher operations.
pub type LaunchResult<T> = Result<T, LaunchError>;
