//! Lifecycle state and events of the inspector sidecar.
//!
//! The state lives in a `watch` channel so any task can observe it. Events go
//! over an unbounded mpsc channel to whoever drives startup: `Ready` at most
//! once, then `Exited` exactly once.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

/// State of the inspector sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidecarState {
    /// Spawn requested, not yet confirmed.
    Starting,
    /// Process spawned, output relays active.
    Running,
    /// The readiness marker was observed on stdout.
    Ready,
    /// Startup failed (spawn error or readiness timeout).
    Failed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// Process terminated.
    Exited {
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
    },
}

impl SidecarState {
    /// Whether the process can no longer become ready.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SidecarState::Failed { .. } | SidecarState::Exited { .. })
    }
}

/// Notifications published by the output relay and the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidecarEvent {
    /// The readiness marker appeared. Sent at most once.
    Ready,
    /// The process exited. Sent exactly once, after the stdout relay drained.
    Exited { code: Option<i32> },
}

/// Shared writer side of the sidecar lifecycle.
///
/// Cloned into the stdout relay and the supervisor task.
#[derive(Debug, Clone)]
pub struct SidecarStatus {
    state: Arc<watch::Sender<SidecarState>>,
    events: mpsc::UnboundedSender<SidecarEvent>,
}

/// Receiver side of the sidecar event stream.
///
/// Holds no event sender, so [`SidecarEvents::next`] yields `None` once the
/// relay and supervisor are gone.
#[derive(Debug)]
pub struct SidecarEvents {
    rx: mpsc::UnboundedReceiver<SidecarEvent>,
    state: Arc<watch::Sender<SidecarState>>,
}

impl SidecarStatus {
    /// Create a status in `Starting` and the matching event receiver.
    pub fn new() -> (Self, SidecarEvents) {
        let (state, _) = watch::channel(SidecarState::Starting);
        let (tx, rx) = mpsc::unbounded_channel();
        let status = Self {
            state: Arc::new(state),
            events: tx,
        };
        let events = SidecarEvents {
            rx,
            state: status.state.clone(),
        };
        (status, events)
    }

    pub fn state(&self) -> SidecarState {
        self.state.borrow().clone()
    }

    pub(crate) fn mark_running(&self) {
        self.state.send_replace(SidecarState::Running);
    }

    /// Move `Running` to `Ready` and publish [`SidecarEvent::Ready`].
    ///
    /// Returns `false` (and publishes nothing) if the sidecar was not in
    /// `Running`, so repeated markers resolve readiness only once.
    pub(crate) fn mark_ready(&self) -> bool {
        let transitioned = self.state.send_if_modified(|state| {
            if *state == SidecarState::Running {
                *state = SidecarState::Ready;
                true
            } else {
                false
            }
        });
        if transitioned {
            let _ = self.events.send(SidecarEvent::Ready);
        }
        transitioned
    }

    /// Record a startup failure. Terminal states are left untouched.
    pub fn mark_failed(&self, reason: impl Into<String>) {
        set_failed(&self.state, reason.into());
    }

    /// Record process exit and publish [`SidecarEvent::Exited`].
    ///
    /// A prior `Failed` state is kept; the event is published regardless.
    pub(crate) fn mark_exited(&self, code: Option<i32>) {
        self.state.send_if_modified(|state| {
            if matches!(state, SidecarState::Failed { .. }) {
                false
            } else {
                *state = SidecarState::Exited { code };
                true
            }
        });
        let _ = self.events.send(SidecarEvent::Exited { code });
    }
}

impl SidecarEvents {
    /// Next lifecycle event, or `None` once every publisher is gone.
    pub async fn next(&mut self) -> Option<SidecarEvent> {
        self.rx.recv().await
    }

    pub fn state(&self) -> SidecarState {
        self.state.borrow().clone()
    }

    /// Record a startup failure. Terminal states are left untouched.
    pub fn mark_failed(&self, reason: impl Into<String>) {
        set_failed(&self.state, reason.into());
    }
}

fn set_failed(state: &watch::Sender<SidecarState>, reason: String) {
    state.send_if_modified(|current| {
        if current.is_terminal() {
            false
        } else {
            *current = SidecarState::Failed { reason };
            true
        }
    });
}
