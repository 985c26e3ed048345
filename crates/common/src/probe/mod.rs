//! Active subnet discovery
//!
//! Peers that never talk to the relay can still be seen by probing the local
//! /24 directly. A `Probe` is one single-shot reachability check with its own
//! timeout; the `SubnetProber` fans probes out over every candidate address,
//! gathers the ones that answered and publishes them as one snapshot.
//!
//! A failed probe means "not reachable right now", nothing more. `ProbeError`
//! never escapes a scan.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;

mod icmp;
mod subnet;
mod tcp;

pub use icmp::IcmpProbe;
pub use subnet::{candidate_addresses, local_ipv4, SubnetProber, DEFAULT_SCAN_PERIOD};
pub use tcp::TcpConnectProbe;

/// Per-probe timeout used when nothing else is configured
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("probe timed out")]
    Timeout,
    #[error("host unreachable: {0}")]
    Unreachable(String),
    #[error("probe socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not determine local IPv4 address: {0}")]
    LocalAddress(String),
}

#[async_trait]
pub trait Probe: Send + Sync {
    /// Check once whether `addr` answers. Must give up after `timeout()`.
    async fn probe(&self, addr: Ipv4Addr) -> Result<(), ProbeError>;

    fn timeout(&self) -> Duration;
}
