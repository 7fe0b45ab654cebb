//! Single, idempotent teardown of the sidecar and the forwarder.
//!
//! Every exit path (signal, fatal startup error, sidecar death, normal return)
//! calls [`ShutdownCoordinator::shutdown`]. The first call performs the
//! teardown; concurrent and later calls wait for it and return.
//!
//! Order:
//! 1. terminate the sidecar if it is still alive
//! 2. close the proxy engine (open connections, upgrade tunnels)
//! 3. close the listening socket

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use mcp_dev_core::SidecarHandle;
use mcp_dev_proxy::Forwarder;
use tokio::sync::OnceCell;

/// What the teardown released.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// A sidecar was registered and has been terminated.
    pub sidecar_terminated: bool,
    /// Exit code observed when the sidecar was reaped.
    pub sidecar_exit_code: Option<i32>,
    /// The proxy engine was closed.
    pub engine_closed: bool,
    /// The listening socket was closed.
    pub listener_closed: bool,
}

#[derive(Default)]
struct Resources {
    closing: bool,
    sidecar: Option<SidecarHandle>,
    forwarder: Option<Forwarder>,
}

/// Owner of everything that must be released on exit.
#[derive(Default)]
pub struct ShutdownCoordinator {
    resources: Mutex<Resources>,
    report: OnceCell<ShutdownReport>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the sidecar for teardown.
    ///
    /// Returns the handle back if shutdown already started; the caller must
    /// terminate it.
    #[must_use]
    pub fn attach_sidecar(&self, sidecar: SidecarHandle) -> Option<SidecarHandle> {
        let mut resources = self.lock();
        if resources.closing {
            return Some(sidecar);
        }
        resources.sidecar = Some(sidecar);
        None
    }

    /// Register the forwarder for teardown.
    ///
    /// Returns the forwarder back if shutdown already started; the caller
    /// must close it.
    #[must_use]
    pub fn attach_forwarder(&self, forwarder: Forwarder) -> Option<Forwarder> {
        let mut resources = self.lock();
        if resources.closing {
            return Some(forwarder);
        }
        resources.forwarder = Some(forwarder);
        None
    }

    /// Run the teardown once.
    ///
    /// Returns `true` for the call that performed it, `false` for every other
    /// call. All callers return only after the teardown finished.
    pub async fn shutdown(&self) -> bool {
        let performed = &AtomicBool::new(false);
        self.report
            .get_or_init(|| async move {
                performed.store(true, Ordering::Relaxed);
                self.release().await
            })
            .await;
        performed.load(Ordering::Relaxed)
    }

    /// What the teardown released, once it has finished.
    pub fn report(&self) -> Option<&ShutdownReport> {
        self.report.get()
    }

    async fn release(&self) -> ShutdownReport {
        let (sidecar, forwarder) = {
            let mut resources = self.lock();
            resources.closing = true;
            (resources.sidecar.take(), resources.forwarder.take())
        };

        tracing::info!(
            sidecar = sidecar.is_some(),
            forwarder = forwarder.is_some(),
            "shutting down"
        );

        let mut report = ShutdownReport::default();

        if let Some(mut sidecar) = sidecar {
            report.sidecar_exit_code = sidecar.terminate().await;
            report.sidecar_terminated = true;
        }

        if let Some(forwarder) = forwarder {
            forwarder.close_engine();
            report.engine_closed = true;
            forwarder.close_listener().await;
            report.listener_closed = true;
        }

        tracing::debug!(?report, "shutdown complete");
        report
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Resources> {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_empty_shutdown_is_idempotent() {
        let coordinator = ShutdownCoordinator::new();

        assert!(coordinator.report().is_none());
        assert!(coordinator.shutdown().await);
        assert!(!coordinator.shutdown().await);
        assert_eq!(coordinator.report(), Some(&ShutdownReport::default()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_calls_run_teardown_once() {
        let coordinator = Arc::new(ShutdownCoordinator::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.shutdown().await })
            })
            .collect();

        let mut performed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                performed += 1;
            }
        }
        assert_eq!(performed, 1);
    }
}
