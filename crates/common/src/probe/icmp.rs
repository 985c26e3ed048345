use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use async_trait::async_trait;
use surge_ping::{Client, Config, PingIdentifier, PingSequence};

use super::{Probe, ProbeError};

const PAYLOAD: [u8; 8] = [0; 8];

/// One ICMP echo per probe
///
/// Needs either raw-socket privileges or unprivileged ICMP sockets
/// (`net.ipv4.ping_group_range`); construction fails otherwise.
#[derive(Clone)]
pub struct IcmpProbe {
    client: Client,
    timeout: Duration,
}

impl std::fmt::Debug for IcmpProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IcmpProbe")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl IcmpProbe {
    /// Open the ICMP socket. Must be called from within a tokio runtime.
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::new(&Config::default())?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl Probe for IcmpProbe {
    async fn probe(&self, addr: Ipv4Addr) -> Result<(), ProbeError> {
        let mut pinger = self
            .client
            .pinger(IpAddr::V4(addr), PingIdentifier(rand::random()))
            .await;
        pinger.timeout(self.timeout);

        match pinger.ping(PingSequence(0), &PAYLOAD).await {
            Ok(_) => Ok(()),
            Err(surge_ping::SurgeError::Timeout { .. }) => Err(ProbeError::Timeout),
            Err(e) => Err(ProbeError::Unreachable(e.to_string())),
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
