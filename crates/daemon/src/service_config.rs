use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use common::prelude::SharedKey;

#[derive(Debug)]
pub struct Config {
    // http server configuration
    /// address the relay's HTTP server binds to
    pub listen_addr: SocketAddr,
    /// largest request body accepted on upload
    pub max_upload_bytes: usize,

    // storage configuration
    /// directory holding one ciphertext file per stored object
    pub upload_dir: PathBuf,
    /// pre-shared key every upload is encrypted under
    pub shared_key: SharedKey,

    // presence configuration
    /// how long a peer stays active after its last request
    pub presence_ttl: Duration,
    /// how often stale presence entries are evicted
    pub sweep_period: Duration,

    // discovery configuration
    /// where `/get_ips` gets its answer from
    pub discovery: DiscoveryMode,
    pub scan_period: Duration,
    pub probe: ProbeKind,
    pub probe_timeout: Duration,
    /// cap on concurrent probes during one scan
    pub max_in_flight_probes: usize,

    // logging
    pub log_level: tracing::Level,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}

/// Source of truth for the active peer list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
    /// peers that talked to the relay within the TTL
    #[default]
    Presence,
    /// hosts on the local /24 that answered the last scan
    Subnet,
}

/// How the subnet prober checks one address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProbeKind {
    #[default]
    Icmp,
    Tcp(u16),
}

impl FromStr for ProbeKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("icmp") {
            return Ok(ProbeKind::Icmp);
        }
        match s.split_once(':') {
            Some((kind, port)) if kind.eq_ignore_ascii_case("tcp") => port
                .parse::<u16>()
                .ok()
                .filter(|port| *port != 0)
                .map(ProbeKind::Tcp)
                .ok_or_else(|| ConfigError::InvalidProbe(s.to_string())),
            _ => Err(ConfigError::InvalidProbe(s.to_string())),
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeKind::Icmp => write!(f, "icmp"),
            ProbeKind::Tcp(port) => write!(f, "tcp:{}", port),
        }
    }
}

impl TryFrom<String> for ProbeKind {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProbeKind> for String {
    fn from(kind: ProbeKind) -> Self {
        kind.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid probe {0:?}, expected `icmp` or `tcp:<port>`")]
    InvalidProbe(String),
}
