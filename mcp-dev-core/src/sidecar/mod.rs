//! Inspector sidecar process management.
//!
//! [`spawn_sidecar`] starts the inspector with the launch environment, wires
//! its output through the line relays, and hands ownership of the child to a
//! supervisor task. The returned [`SidecarHandle`] is the only way to stop it;
//! the returned [`SidecarEvents`] stream feeds the readiness gate.
//!
//! ```text
//! spawn_sidecar ──► Child ──► supervisor task ─── wait() / terminate ──► Exited event
//!                    │
//!                    ├── stdout ──► relay_stdout ──► Ready event
//!                    └── stderr ──► relay_stderr
//! ```

pub mod lifecycle;
pub mod output;

use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{LaunchConfig, READINESS_TIMEOUT, TERMINATION_GRACE};
use crate::error::{LaunchError, LaunchResult};

pub use lifecycle::{SidecarEvent, SidecarEvents, SidecarState, SidecarStatus};

/// How long the supervisor waits for the stdout relay to drain after exit.
const RELAY_DRAIN: Duration = Duration::from_secs(1);

// ─────────────────────────────────────────────────────────────────────────────
// Platform and command selection
// ─────────────────────────────────────────────────────────────────────────────

/// Host platform, as far as launching the inspector is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// The inspector has to go through `npx`.
    Windows,
    /// The `mcp-inspector` binary is invoked directly.
    Unix,
}

const WINDOWS_HINTS: &[&str] = &[
    "Ensure Node.js is installed and in PATH",
    "Try running: npm install -g @modelcontextprotocol/inspector",
    "Check if Windows Defender is blocking the process",
];

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    /// Troubleshooting tips printed when the inspector fails to spawn.
    pub fn remediation_hints(&self) -> &'static [&'static str] {
        match self {
            Platform::Windows => WINDOWS_HINTS,
            Platform::Unix => &[],
        }
    }
}

/// Program and arguments used to start the inspector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectorCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl InspectorCommand {
    /// Default launcher for `platform`.
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Windows => Self {
                program: "npx".to_string(),
                args: vec!["@modelcontextprotocol/inspector".to_string()],
            },
            Platform::Unix => Self {
                program: "mcp-inspector".to_string(),
                args: Vec::new(),
            },
        }
    }

    /// A user-supplied program, run without arguments.
    pub fn custom(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }
}

impl fmt::Display for InspectorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Timing knobs for the sidecar.
#[derive(Debug, Clone)]
pub struct SidecarOptions {
    /// Bound on the wait for the readiness marker.
    pub readiness_timeout: Duration,
    /// Time between SIGTERM and SIGKILL on termination.
    pub termination_grace: Duration,
}

impl Default for SidecarOptions {
    fn default() -> Self {
        Self {
            readiness_timeout: READINESS_TIMEOUT,
            termination_grace: TERMINATION_GRACE,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Spawn
// ─────────────────────────────────────────────────────────────────────────────

/// Start the inspector sidecar.
///
/// The host environment is inherited and overlaid with
/// [`LaunchConfig::sidecar_env`]. stdin is inherited; stdout and stderr are
/// relayed to this process's own streams. On Unix the child leads its own
/// process group so termination reaches the whole inspector tree.
///
/// # Errors
///
/// `LaunchError::Spawn` if the program cannot be started.
pub fn spawn_sidecar(
    config: &LaunchConfig,
    command: &InspectorCommand,
    options: &SidecarOptions,
) -> LaunchResult<(SidecarHandle, SidecarEvents)> {
    let (status, events) = SidecarStatus::new();

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .envs(config.sidecar_env())
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let spawn_error = |reason: String| {
        status.mark_failed(reason.clone());
        LaunchError::Spawn {
            command: command.to_string(),
            reason,
            platform: Platform::current(),
        }
    };

    let mut child = cmd.spawn().map_err(|e| spawn_error(e.to_string()))?;
    let pid = child.id();

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| spawn_error("failed to capture inspector stdout".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| spawn_error("failed to capture inspector stderr".to_string()))?;

    status.mark_running();
    tracing::info!(command = %command, pid, "inspector spawned");

    let stdout_relay = tokio::spawn({
        let status = status.clone();
        async move {
            if let Err(e) = output::relay_stdout(stdout, tokio::io::stdout(), status).await {
                tracing::warn!(error = %e, "inspector stdout relay failed");
            }
        }
    });
    tokio::spawn(async move {
        if let Err(e) = output::relay_stderr(stderr, tokio::io::stderr()).await {
            tracing::warn!(error = %e, "inspector stderr relay failed");
        }
    });

    let terminate = CancellationToken::new();
    let supervisor = tokio::spawn(supervise(
        child,
        stdout_relay,
        status.clone(),
        terminate.clone(),
        options.termination_grace,
    ));

    let handle = SidecarHandle {
        pid,
        status,
        terminate,
        supervisor: Some(supervisor),
    };
    Ok((handle, events))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Owner-side handle to a running sidecar.
#[derive(Debug)]
pub struct SidecarHandle {
    pid: Option<u32>,
    status: SidecarStatus,
    terminate: CancellationToken,
    supervisor: Option<JoinHandle<Option<i32>>>,
}

impl SidecarHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> SidecarState {
        self.status.state()
    }

    pub fn status(&self) -> &SidecarStatus {
        &self.status
    }

    /// Stop the sidecar and wait for it to be reaped.
    ///
    /// Returns the exit code when one was observed. Safe to call more than
    /// once; later calls return `None` without signalling again.
    pub async fn terminate(&mut self) -> Option<i32> {
        self.terminate.cancel();
        let supervisor = self.supervisor.take()?;
        match supervisor.await {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(error = %e, "sidecar supervisor task failed");
                None
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Supervisor
// ─────────────────────────────────────────────────────────────────────────────

/// Own the child until it exits or termination is requested.
///
/// The exit event is published only after the stdout relay drained (bounded by
/// [`RELAY_DRAIN`]), so a marker printed just before exit is seen first.
async fn supervise(
    mut child: Child,
    stdout_relay: JoinHandle<()>,
    status: SidecarStatus,
    terminate: CancellationToken,
    grace: Duration,
) -> Option<i32> {
    let exit = tokio::select! {
        result = child.wait() => result,
        () = terminate.cancelled() => stop_child(&mut child, grace).await,
    };

    let code = match exit {
        Ok(exit_status) => exit_status.code(),
        Err(e) => {
            tracing::error!(error = %e, "failed to collect inspector exit status");
            None
        }
    };

    if tokio::time::timeout(RELAY_DRAIN, stdout_relay).await.is_err() {
        tracing::debug!("inspector stdout still open after exit");
    }

    tracing::info!(code, "inspector exited");
    status.mark_exited(code);
    code
}

/// SIGTERM the process group, wait `grace`, then SIGKILL and reap.
async fn stop_child(child: &mut Child, grace: Duration) -> std::io::Result<ExitStatus> {
    let Some(pid) = child.id() else {
        // Already reaped.
        return child.wait().await;
    };

    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        tracing::info!(pid, "sending SIGTERM to inspector process group");
        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            tracing::warn!(pid, error = ?e, "killpg SIGTERM failed");
        }

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(result) => return result,
            Err(_) => tracing::warn!(pid, "inspector did not exit within grace period"),
        }

        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            tracing::debug!(pid, error = ?e, "killpg SIGKILL failed");
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    tracing::warn!(pid, "killing inspector");
    if let Err(e) = child.kill().await {
        tracing::debug!(pid, error = %e, "kill failed");
    }
    child.wait().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_for_platform() {
        let windows = InspectorCommand::for_platform(Platform::Windows);
        assert_eq!(windows.to_string(), "npx @modelcontextprotocol/inspector");

        let unix = InspectorCommand::for_platform(Platform::Unix);
        assert_eq!(unix.to_string(), "mcp-inspector");
        assert!(unix.args.is_empty());
    }

    #[test]
    fn test_windows_hints() {
        let hints = Platform::Windows.remediation_hints();
        assert_eq!(hints.len(), 3);
        assert!(hints[1].contains("npm install -g @modelcontextprotocol/inspector"));
        assert!(Platform::Unix.remediation_hints().is_empty());
    }

    #[test]
    fn test_sidecar_options_defaults() {
        let options = SidecarOptions::default();
        assert_eq!(options.readiness_timeout, Duration::from_secs(30));
        assert_eq!(options.termination_grace, Duration::from_secs(2));
    }
}
