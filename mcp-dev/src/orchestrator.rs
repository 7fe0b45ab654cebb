//! Startup sequence and run loop.
//!
//! ```text
//! allocate ports + token ─► spawn sidecar ─► readiness gate ─► bind forwarder ─► serve
//!                                                                                 │
//!            SIGINT / SIGTERM / sidecar exit / startup error ──► ShutdownCoordinator
//! ```
//!
//! Every path out of [`run`] goes through [`ShutdownCoordinator::shutdown`].

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use mcp_dev_core::{
    InspectorCommand, LaunchConfig, LaunchError, LaunchResult, Platform, SidecarEvent,
    SidecarOptions, spawn_sidecar, wait_for_ready,
};
use mcp_dev_proxy::{ForwardingService, Forwarder, LaunchParams};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::banner;
use crate::cli::DevArgs;
use crate::shutdown::ShutdownCoordinator;
use crate::signals::SignalListener;

/// Everything the launcher needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Port the forwarder listens on.
    pub external_port: u16,
    /// Address the forwarder binds to.
    pub bind: IpAddr,
    pub command: InspectorCommand,
    /// Directory passed to `npm --prefix` in the launch parameters.
    pub project_dir: PathBuf,
    pub sidecar: SidecarOptions,
}

impl OrchestratorConfig {
    /// Resolve the config from parsed arguments.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError::Io` if no project directory was given and the
    /// current directory cannot be read.
    pub fn from_args(args: &DevArgs) -> LaunchResult<Self> {
        let project_dir = match &args.project_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };

        Ok(Self {
            external_port: args.port,
            bind: args.bind,
            command: args.inspector_command(),
            project_dir,
            sidecar: SidecarOptions::default(),
        })
    }
}

/// Run the launcher until a signal arrives or something fails.
///
/// Returns `Ok(())` after a signal-initiated shutdown. Any error is returned
/// only after shutdown has completed.
///
/// # Errors
///
/// Propagates the first fatal [`LaunchError`]: allocation, spawn, readiness,
/// bind, or the sidecar stopping while serving.
pub async fn run(config: OrchestratorConfig) -> LaunchResult<()> {
    let mut signals = SignalListener::install()?;
    let coordinator = ShutdownCoordinator::new();

    let outcome = tokio::select! {
        result = launch(&config, &coordinator) => result,
        signal = signals.recv() => {
            info!(%signal, "received signal, shutting down");
            Ok(())
        }
    };

    if let Err(e) = &outcome {
        error!(error = %e, "launcher failed");
    }

    coordinator.shutdown().await;
    outcome
}

async fn launch(config: &OrchestratorConfig, coordinator: &ShutdownCoordinator) -> LaunchResult<()> {
    let launch = LaunchConfig::allocate(config.external_port).await?;
    info!(
        server_port = launch.server_port,
        client_port = launch.client_port,
        external_port = launch.external_port,
        "ports allocated"
    );

    let platform = Platform::current();
    banner::starting(platform, &config.command);

    let (sidecar, mut events) = spawn_sidecar(&launch, &config.command, &config.sidecar)?;
    if let Some(mut sidecar) = coordinator.attach_sidecar(sidecar) {
        sidecar.terminate().await;
        return Ok(());
    }

    wait_for_ready(&mut events, config.sidecar.readiness_timeout).await?;
    banner::ready();

    let params = LaunchParams::new(&launch, &config.project_dir);
    let service = ForwardingService::new(launch.client_port, params, CancellationToken::new());
    let addr = SocketAddr::new(config.bind, launch.external_port);
    let forwarder = Forwarder::bind(addr, service).await.map_err(|e| {
        error!(%addr, error = %e, "failed to bind proxy listener");
        LaunchError::Io(e)
    })?;
    if let Some(forwarder) = coordinator.attach_forwarder(forwarder) {
        forwarder.close_engine();
        forwarder.close_listener().await;
        return Ok(());
    }

    banner::running(&launch, platform);

    loop {
        match events.next().await {
            Some(SidecarEvent::Exited { code }) => {
                warn!(code, "inspector exited while serving");
                return Err(LaunchError::SidecarStopped { code });
            }
            Some(SidecarEvent::Ready) => debug!("duplicate ready event ignored"),
            None => return Err(LaunchError::SidecarStopped { code: None }),
        }
    }
}
