/**
 * Access-control and presence catalog of uploaded
 *  objects. Append-only, memory resident.
 */
pub mod catalog;
/**
 * Cryptographic types and operations.
 *  - Pre-shared relay key
 *  - IV-prefixed AES-256-CBC blob codec
 */
pub mod crypto;
/**
 * Peer identities and the recipient capability
 *  attached to every stored object.
 */
pub mod identity;
/**
 * Heartbeat registry of peers seen recently,
 *  with TTL eviction.
 */
pub mod presence;
/**
 * Active reachability probing of the local /24,
 *  for peers that never report in themselves.
 */
pub mod probe;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::catalog::{CatalogError, ObjectCatalog, StoredObject};
    pub use crate::crypto::{CipherError, SharedKey};
    pub use crate::identity::{PeerIdentity, Recipient};
    pub use crate::presence::PresenceRegistry;
    pub use crate::probe::{Probe, ProbeError, SubnetProber};
    pub use crate::version::{build_info, BuildInfo};
}
