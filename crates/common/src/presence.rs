//! Heartbeat presence registry
//!
//! Every inbound request refreshes its sender's entry. A peer is *active* while
//! `now - last_seen <= ttl`. Eviction happens on two independent paths:
//! - `list_active` filters by TTL on every read, and
//! - `sweep` (run periodically by `run_sweeper`) deletes stale entries.
//!
//! Both paths apply the TTL themselves, so a TTL much shorter than the sweep
//! period is still honoured by readers. All operations go through the one mutex
//! of the registry instance; no reader can observe a half-evicted map.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::identity::PeerIdentity;

/// TTL used when nothing else is configured
pub const DEFAULT_PRESENCE_TTL: Duration = Duration::from_secs(30);
/// Sweep period used when nothing else is configured
pub const DEFAULT_SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct PresenceRegistry {
    inner: Arc<Mutex<HashMap<PeerIdentity, Instant>>>,
    ttl: Duration,
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_PRESENCE_TTL)
    }
}

impl PresenceRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Record activity from `identity` now
    pub fn touch(&self, identity: &PeerIdentity) {
        self.inner.lock().insert(identity.clone(), Instant::now());
    }

    /// Identities seen within the TTL, sorted for stable output
    pub fn list_active(&self) -> Vec<PeerIdentity> {
        let now = Instant::now();
        let entries = self.inner.lock();
        let mut active: Vec<PeerIdentity> = entries
            .iter()
            .filter(|(_, last_seen)| now.duration_since(**last_seen) <= self.ttl)
            .map(|(identity, _)| identity.clone())
            .collect();
        drop(entries);
        active.sort();
        active
    }

    pub fn is_active(&self, identity: &PeerIdentity) -> bool {
        let now = Instant::now();
        self.inner
            .lock()
            .get(identity)
            .is_some_and(|last_seen| now.duration_since(*last_seen) <= self.ttl)
    }

    /// How long ago `identity` was last seen, if it still has an entry
    pub fn last_seen(&self, identity: &PeerIdentity) -> Option<Duration> {
        let now = Instant::now();
        self.inner
            .lock()
            .get(identity)
            .map(|last_seen| now.duration_since(*last_seen))
    }

    /// Delete every entry older than the TTL, returning how many were removed
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.inner.lock();
        let before = entries.len();
        entries.retain(|_, last_seen| now.duration_since(*last_seen) <= self.ttl);
        before - entries.len()
    }

    /// Number of entries, stale ones included until the next sweep
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Sweep every `period` until the shutdown signal fires
    pub async fn run_sweeper(self, period: Duration, mut shutdown_rx: watch::Receiver<()>) {
        tracing::info!(
            ttl_secs = self.ttl.as_secs_f64(),
            period_secs = period.as_secs_f64(),
            "presence sweeper started"
        );
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep();
                    tracing::debug!(
                        removed,
                        active = ?self.list_active(),
                        "presence sweep complete"
                    );
                }
                _ = shutdown_rx.changed() => {
                    break;
                }
            }
        }

        tracing::info!("presence sweeper stopped");
    }
}
