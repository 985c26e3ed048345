//! Peer identity and recipient capability
//!
//! A peer is whoever sends from a given network address. There is no
//! cryptographic authentication behind that: anyone able to source traffic from
//! an address *is* that peer as far as the relay is concerned. The same value is
//! used as the presence key and as the subject of the download access check.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Sentinel recipient meaning "any identity may read this object".
pub const EVERYONE: &str = "Everyone";

/// Opaque peer identity, compared by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerIdentity(String);

impl PeerIdentity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IpAddr> for PeerIdentity {
    fn from(addr: IpAddr) -> Self {
        // v4-mapped v6 addresses show up on dual-stack listeners
        let addr = match addr {
            IpAddr::V6(v6) => v6
                .to_ipv4_mapped()
                .map(IpAddr::V4)
                .unwrap_or(IpAddr::V6(v6)),
            v4 => v4,
        };
        Self(addr.to_string())
    }
}

impl From<&str> for PeerIdentity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who a stored object is earmarked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Recipient {
    #[default]
    Everyone,
    Peer(PeerIdentity),
}

impl Recipient {
    /// Parse a form value. Blank input and the sentinel both mean everyone.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value == EVERYONE {
            Recipient::Everyone
        } else {
            Recipient::Peer(PeerIdentity::new(value))
        }
    }

    /// The access rule: granted iff addressed to the requester or to everyone.
    pub fn admits(&self, requester: &PeerIdentity) -> bool {
        match self {
            Recipient::Everyone => true,
            Recipient::Peer(peer) => peer == requester,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Recipient::Everyone => EVERYONE,
            Recipient::Peer(peer) => peer.as_str(),
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Recipient {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Recipient {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Recipient::parse(&value))
    }
}
