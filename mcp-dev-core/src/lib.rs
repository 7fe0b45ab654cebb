//! Core of the MCP Inspector dev launcher.
//!
//! Port allocation, the session token, the sidecar process with its output
//! relays, and the readiness gate. The HTTP side lives in `mcp-dev-proxy`.

pub mod config;
pub mod error;
pub mod ports;
pub mod readiness;
pub mod sidecar;
pub mod token;

pub use config::LaunchConfig;
pub use error::{LaunchError, LaunchResult};
pub use readiness::wait_for_ready;
pub use sidecar::{
    InspectorCommand, Platform, SidecarEvent, SidecarEvents, SidecarHandle, SidecarOptions,
    SidecarState, spawn_sidecar,
};
pub use token::SessionToken;
