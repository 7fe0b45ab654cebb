//! Readiness gate for the inspector sidecar.
//!
//! Exactly one outcome fires: the marker was seen, the process exited first, or
//! the timeout elapsed. The gate never kills the process; on failure the
//! caller hands it to shutdown.

use std::time::Duration;

use crate::error::{LaunchError, LaunchResult};
use crate::sidecar::{SidecarEvent, SidecarEvents};

/// Wait until the sidecar reports readiness.
///
/// # Errors
///
/// - `LaunchError::ReadinessTimeout` if no marker arrived within `timeout`.
/// - `LaunchError::ProcessExited` if the process exited before the marker,
///   whatever its exit code.
pub async fn wait_for_ready(events: &mut SidecarEvents, timeout: Duration) -> LaunchResult<()> {
    let outcome = tokio::time::timeout(timeout, async {
        match events.next().await {
            Some(SidecarEvent::Ready) => Ok(()),
            Some(SidecarEvent::Exited { code }) => Err(LaunchError::ProcessExited { code }),
            // Publishers gone without an exit event: the supervisor died.
            None => Err(LaunchError::ProcessExited { code: None }),
        }
    })
    .await;

    match outcome {
        Ok(result) => {
            if let Err(e) = &result {
                tracing::warn!(error = %e, "inspector exited before becoming ready");
            }
            result
        }
        Err(_) => {
            let err = LaunchError::ReadinessTimeout { timeout };
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "readiness timed out");
            events.mark_failed(err.to_string());
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sidecar::{SidecarState, SidecarStatus};

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_and_marks_failed() {
        let (status, mut events) = SidecarStatus::new();
        status.mark_running();

        let err = wait_for_ready(&mut events, Duration::from_millis(30_000))
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::ReadinessTimeout { .. }));
        assert!(matches!(status.state(), SidecarState::Failed { .. }));
        drop(status);
    }

    #[tokio::test]
    async fn test_ready_resolves() {
        let (status, mut events) = SidecarStatus::new();
        status.mark_running();
        status.mark_ready();

        wait_for_ready(&mut events, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(status.state(), SidecarState::Ready);
    }

    #[tokio::test]
    async fn test_clean_exit_before_ready_is_failure() {
        let (status, mut events) = SidecarStatus::new();
        status.mark_running();
        status.mark_exited(Some(0));

        let err = wait_for_ready(&mut events, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::ProcessExited { code: Some(0) }));
    }

    #[tokio::test]
    async fn test_ready_then_exit_resolves_ready() {
        let (status, mut events) = SidecarStatus::new();
        status.mark_running();
        status.mark_ready();
        status.mark_exited(Some(1));

        wait_for_ready(&mut events, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(
            events.next().await,
            Some(SidecarEvent::Exited { code: Some(1) })
        );
    }
}
