use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use super::{Probe, ProbeError};

/// Reachability via a TCP connect attempt
///
/// Works without any socket privileges. A refused connection still counts as
/// reachable: the host had to be up to send the reset.
#[derive(Debug, Clone)]
pub struct TcpConnectProbe {
    port: u16,
    timeout: Duration,
}

impl TcpConnectProbe {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

#[async_trait]
impl Probe for TcpConnectProbe {
    async fn probe(&self, addr: Ipv4Addr) -> Result<(), ProbeError> {
        let target = SocketAddrV4::new(addr, self.port);
        match tokio::time::timeout(self.timeout, TcpStream::connect(target)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => Ok(()),
            Ok(Err(e)) => Err(ProbeError::Unreachable(e.to_string())),
            Err(_) => Err(ProbeError::Timeout),
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
