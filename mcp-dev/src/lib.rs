//! MCP Inspector dev launcher.
//!
//! Starts the inspector as a sidecar, waits until it is ready, then serves it
//! behind a proxy that redirects the root page to a URL pre-filled with the
//! project's launch settings.

pub mod banner;
pub mod cli;
pub mod orchestrator;
pub mod shutdown;
pub mod signals;

pub use orchestrator::{OrchestratorConfig, run};
pub use shutdown::{ShutdownCoordinator, ShutdownReport};
