use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time::Instant;

use super::{Probe, ProbeError};
use crate::identity::PeerIdentity;

/// Scan period used when nothing else is configured
pub const DEFAULT_SCAN_PERIOD: Duration = Duration::from_secs(10);

/// Headroom on top of the probe timeout before a scan stops waiting
const GATHER_SLACK: Duration = Duration::from_millis(50);

/// Usable host addresses of the /24 around `local`, minus `local` itself
pub fn candidate_addresses(local: Ipv4Addr) -> Vec<Ipv4Addr> {
    let [a, b, c, _] = local.octets();
    (1..=254u8)
        .map(|d| Ipv4Addr::new(a, b, c, d))
        .filter(|addr| *addr != local)
        .collect()
}

/// The address this host uses on its primary interface
pub fn local_ipv4() -> Result<Ipv4Addr, ProbeError> {
    match local_ip_address::local_ip() {
        Ok(IpAddr::V4(addr)) => Ok(addr),
        Ok(IpAddr::V6(addr)) => Err(ProbeError::LocalAddress(format!(
            "primary address {} is not IPv4",
            addr
        ))),
        Err(e) => Err(ProbeError::LocalAddress(e.to_string())),
    }
}

type LocalResolver = Arc<dyn Fn() -> Result<Ipv4Addr, ProbeError> + Send + Sync>;

/// Sweeps the local /24 and keeps the latest set of responders
///
/// The snapshot is swapped as a whole under a write lock, so readers see either
/// the previous scan or the new one, never a mix.
#[derive(Clone)]
pub struct SubnetProber {
    probe: Arc<dyn Probe>,
    max_in_flight: usize,
    /// Where each scan gets its local address; `local_ipv4` unless pinned
    resolve_local: LocalResolver,
    snapshot: Arc<RwLock<Vec<PeerIdentity>>>,
}

impl std::fmt::Debug for SubnetProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubnetProber")
            .field("max_in_flight", &self.max_in_flight)
            .field("snapshot", &self.snapshot.read().len())
            .finish()
    }
}

impl SubnetProber {
    pub fn new(probe: Arc<dyn Probe>, max_in_flight: usize) -> Self {
        Self {
            probe,
            max_in_flight: max_in_flight.max(1),
            resolve_local: Arc::new(local_ipv4),
            snapshot: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Responders from the last completed scan, sorted
    pub fn snapshot(&self) -> Vec<PeerIdentity> {
        self.snapshot.read().clone()
    }

    /// Longest a scan of `candidates` addresses is allowed to wait
    fn gather_deadline(&self, candidates: usize) -> Duration {
        let waves = candidates.div_ceil(self.max_in_flight).max(1) as u32;
        self.probe.timeout() * waves + GATHER_SLACK
    }

    /// Probe every candidate of `local`'s /24 concurrently and collect responders
    ///
    /// Does not touch the snapshot.
    pub async fn scan_prefix(&self, local: Ipv4Addr) -> Vec<PeerIdentity> {
        let candidates = candidate_addresses(local);
        let deadline = tokio::time::sleep(self.gather_deadline(candidates.len()));

        let mut found: Vec<Ipv4Addr> = stream::iter(candidates)
            .map(|addr| {
                let probe = self.probe.clone();
                async move {
                    match probe.probe(addr).await {
                        Ok(()) => Some(addr),
                        Err(e) => {
                            tracing::trace!(%addr, error = %e, "probe failed");
                            None
                        }
                    }
                }
            })
            .buffer_unordered(self.max_in_flight)
            .take_until(deadline)
            .filter_map(|addr| async move { addr })
            .collect()
            .await;

        found.sort();
        found
            .into_iter()
            .map(|addr| PeerIdentity::from(IpAddr::V4(addr)))
            .collect()
    }

    /// Resolve the local address, scan, and publish the result
    pub async fn scan_once(&self) -> Result<Vec<PeerIdentity>, ProbeError> {
        let local = (self.resolve_local)()?;

        let started = Instant::now();
        let found = self.scan_prefix(local).await;
        tracing::debug!(
            %local,
            responders = found.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "subnet scan complete"
        );

        *self.snapshot.write() = found.clone();
        Ok(found)
    }

    /// Scan every `period` until the shutdown signal fires
    pub async fn run(self, period: Duration, mut shutdown_rx: watch::Receiver<()>) {
        tracing::info!(
            period_secs = period.as_secs_f64(),
            max_in_flight = self.max_in_flight,
            "subnet prober started"
        );
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.scan_once().await {
                        tracing::warn!(error = %e, "subnet scan skipped, retrying next period");
                    }
                }
                _ = shutdown_rx.changed() => {
                    break;
                }
            }
        }

        tracing::info!("subnet prober stopped");
    }
}
