use std::sync::Arc;
use std::time::Duration;

use common::prelude::{ObjectCatalog, PresenceRegistry, Probe, SubnetProber};
use common::probe::{IcmpProbe, TcpConnectProbe};

use crate::relay::{BlobStore, FileRelay, StorageError};
use crate::service_config::{Config, DiscoveryMode, ProbeKind};

/// Main service state, shared by every request handler and background task
#[derive(Debug, Clone)]
pub struct State {
    relay: FileRelay,
    prober: Option<SubnetProber>,
}

impl State {
    pub fn new(relay: FileRelay, prober: Option<SubnetProber>) -> Self {
        let relay = match &prober {
            Some(prober) => relay.with_subnet_prober(prober.clone()),
            None => relay,
        };
        Self { relay, prober }
    }

    /// Must be called from within a tokio runtime; the ICMP socket binds to it.
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        let store = BlobStore::open(&config.upload_dir)?;
        tracing::info!(path = %store.root().display(), "upload directory ready");

        let relay = FileRelay::new(
            store,
            ObjectCatalog::new(),
            PresenceRegistry::new(config.presence_ttl),
            config.shared_key.clone(),
        );

        let prober = match config.discovery {
            DiscoveryMode::Presence => None,
            DiscoveryMode::Subnet => {
                let probe = build_probe(config.probe, config.probe_timeout, config.listen_addr.port());
                Some(SubnetProber::new(probe, config.max_in_flight_probes))
            }
        };

        tracing::info!(
            discovery = ?config.discovery,
            ttl_secs = config.presence_ttl.as_secs(),
            "service state ready"
        );
        Ok(Self::new(relay, prober))
    }

    pub fn relay(&self) -> &FileRelay {
        &self.relay
    }

    pub fn presence(&self) -> &PresenceRegistry {
        self.relay.presence()
    }

    pub fn prober(&self) -> Option<&SubnetProber> {
        self.prober.as_ref()
    }
}

impl AsRef<FileRelay> for State {
    fn as_ref(&self) -> &FileRelay {
        &self.relay
    }
}

/// ICMP needs socket privileges; without them, fall back to TCP connects on
/// the relay's own port, which every other relay on the LAN also listens on.
fn build_probe(kind: ProbeKind, timeout: Duration, fallback_port: u16) -> Arc<dyn Probe> {
    match kind {
        ProbeKind::Tcp(port) => Arc::new(TcpConnectProbe::new(port, timeout)),
        ProbeKind::Icmp => match IcmpProbe::new(timeout) {
            Ok(probe) => Arc::new(probe),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    port = fallback_port,
                    "ICMP probes unavailable, falling back to TCP connect probes"
                );
                Arc::new(TcpConnectProbe::new(fallback_port, timeout))
            }
        },
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("storage setup failed: {0}")]
    Storage(#[from] StorageError),
}
