//! Line relays for the sidecar's stdout and stderr.
//!
//! Lines are read as raw bytes so non-UTF-8 output is passed through intact.
//! Marker matching runs on a lossy decoding of each line.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::config::{LISTENING_MARKER, READY_MARKER};

use super::lifecycle::SidecarStatus;

/// Prefix applied to every relayed stderr line.
pub const STDERR_PREFIX: &[u8] = b"Inspector stderr: ";

/// What the stdout relay does with one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDisposition {
    /// Write the line through unchanged.
    Relay,
    /// Drop the line.
    Suppress,
    /// Drop the line and resolve readiness.
    Ready,
}

/// Classify a stdout line by the markers it contains.
pub fn classify_stdout_line(line: &str) -> LineDisposition {
    if line.contains(READY_MARKER) {
        LineDisposition::Ready
    } else if line.contains(LISTENING_MARKER) {
        LineDisposition::Suppress
    } else {
        LineDisposition::Relay
    }
}

/// Copy sidecar stdout to `out`, filtering marker lines.
///
/// Runs until EOF. The first readiness marker moves `status` to `Ready`.
pub async fn relay_stdout<R, W>(reader: R, mut out: W, status: SidecarStatus) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            tracing::debug!("sidecar stdout EOF");
            return Ok(());
        }

        match classify_stdout_line(&String::from_utf8_lossy(&line)) {
            LineDisposition::Ready => {
                if status.mark_ready() {
                    tracing::info!("inspector reported ready");
                }
            }
            LineDisposition::Suppress => {
                tracing::trace!("suppressed inspector listening line");
            }
            LineDisposition::Relay => {
                out.write_all(&line).await?;
                out.flush().await?;
            }
        }
    }
}

/// Copy sidecar stderr to `out`, prefixing each line with [`STDERR_PREFIX`].
///
/// Nothing is suppressed. A final line without a newline gets one.
pub async fn relay_stderr<R, W>(reader: R, mut out: W) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(());
        }
        if !line.ends_with(b"\n") {
            line.push(b'\n');
        }

        out.write_all(STDERR_PREFIX).await?;
        out.write_all(&line).await?;
        out.flush().await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sidecar::lifecycle::{SidecarEvent, SidecarState};

    #[test]
    fn test_classify_markers() {
        assert_eq!(
            classify_stdout_line("🔍 MCP Inspector is up and running at http://127.0.0.1:9001 🚀\n"),
            LineDisposition::Ready
        );
        assert_eq!(
            classify_stdout_line("⚙️ Proxy server listening on port 10001\n"),
            LineDisposition::Suppress
        );
        assert_eq!(
            classify_stdout_line("Starting MCP inspector...\n"),
            LineDisposition::Relay
        );
    }

    #[test]
    fn test_markers_are_case_sensitive() {
        assert_eq!(
            classify_stdout_line("mcp inspector is up and running"),
            LineDisposition::Relay
        );
    }

    #[tokio::test]
    async fn test_stdout_relay_filters_and_signals_ready() {
        let (status, mut events) = SidecarStatus::new();
        status.mark_running();

        let input: &[u8] = b"Starting MCP inspector...\n\
            Proxy server listening on port 10001\n\
            MCP Inspector is up and running at http://127.0.0.1:9001\n\
            New connection\n\
            trailing without newline";
        let mut out = Vec::new();

        relay_stdout(input, &mut out, status.clone()).await.unwrap();

        assert_eq!(
            out,
            b"Starting MCP inspector...\nNew connection\ntrailing without newline".to_vec()
        );
        assert_eq!(status.state(), SidecarState::Ready);
        assert_eq!(events.next().await, Some(SidecarEvent::Ready));
    }

    #[tokio::test]
    async fn test_stdout_relay_passes_invalid_utf8() {
        let (status, _events) = SidecarStatus::new();
        let input: &[u8] = b"\xff\xfe raw\n";
        let mut out = Vec::new();

        relay_stdout(input, &mut out, status).await.unwrap();

        assert_eq!(out, input.to_vec());
    }

    #[tokio::test]
    async fn test_stderr_relay_prefixes_every_line() {
        let input: &[u8] = b"warn one\nMCP Inspector is up and running\nlast";
        let mut out = Vec::new();

        relay_stderr(input, &mut out).await.unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Inspector stderr: warn one\n\
             Inspector stderr: MCP Inspector is up and running\n\
             Inspector stderr: last\n"
        );
    }
}
