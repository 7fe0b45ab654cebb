//! Local port allocation for the inspector sidecar.
//!
//! Ports are probed by binding a listener and dropping it straight away, on
//! both the loopback and the wildcard address. The port is free at the moment
//! of the probe only; nothing reserves it for the sidecar.

use std::net::Ipv4Addr;

use tokio::net::TcpListener;

use crate::error::{LaunchError, LaunchResult};

/// Addresses a candidate port must be bindable on.
const PROBE_HOSTS: [Ipv4Addr; 2] = [Ipv4Addr::LOCALHOST, Ipv4Addr::UNSPECIFIED];

/// Inclusive range of candidate ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    /// Create a range covering `start..=end`.
    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub const fn start(&self) -> u16 {
        self.start
    }

    pub const fn end(&self) -> u16 {
        self.end
    }

    /// Number of ports in the range.
    pub const fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start) as usize + 1
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn contains(&self, port: u16) -> bool {
        port >= self.start && port <= self.end
    }

    fn ports(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }
}

/// Find the first available port in `range` that is not in `excluded`.
///
/// Candidates are probed in ascending order. At most `max_probes` candidates
/// are probed; excluded ports do not count toward the limit.
///
/// # Errors
///
/// `LaunchError::Allocation` when no candidate is available.
pub async fn find_available_port(
    range: PortRange,
    excluded: &[u16],
    max_probes: usize,
) -> LaunchResult<u16> {
    let candidates = range
        .ports()
        .filter(|port| !excluded.contains(port))
        .take(max_probes);

    for port in candidates {
        if is_port_available(port).await {
            return Ok(port);
        }
        tracing::trace!(port, "port unavailable, trying next");
    }

    Err(LaunchError::Allocation {
        start: range.start,
        end: range.end,
    })
}

/// Check whether `port` can be bound on every probe host.
pub async fn is_port_available(port: u16) -> bool {
    for host in PROBE_HOSTS {
        // Each listener is dropped before the next bind; binding the wildcard
        // while loopback is held would fail on Linux.
        match TcpListener::bind((host, port)).await {
            Ok(listener) => drop(listener),
            Err(_) => return false,
        }
    }
    true
}
