//! In-memory catalog of stored objects
//!
//! The catalog only knows *who* an object is for; it does not enforce anything.
//! The relay checks `Recipient::admits` at download time. Entries are appended,
//! never updated or removed, and live until the process exits.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::identity::{PeerIdentity, Recipient};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Collision-resistant name of the blob on disk
    pub object_id: String,
    /// Name the sender uploaded the file under
    pub original_name: String,
    /// Size of the stored blob in bytes
    pub size_bytes: u64,
    pub sender: PeerIdentity,
    pub recipient: Recipient,
    pub created_at: DateTime<Utc>,
}

impl StoredObject {
    pub fn is_visible_to(&self, requester: &PeerIdentity) -> bool {
        self.recipient.admits(requester)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("object already recorded: {0}")]
    DuplicateObject(String),
}

#[derive(Debug, Clone, Default)]
pub struct ObjectCatalog {
    entries: Arc<RwLock<Vec<StoredObject>>>,
}

impl ObjectCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Each object id can be recorded once.
    pub fn record(&self, entry: StoredObject) -> Result<(), CatalogError> {
        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.object_id == entry.object_id) {
            return Err(CatalogError::DuplicateObject(entry.object_id));
        }
        entries.push(entry);
        Ok(())
    }

    /// Entries addressed to `identity` or to everyone, in insertion order
    pub fn list_for(&self, identity: &PeerIdentity) -> Vec<StoredObject> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.is_visible_to(identity))
            .cloned()
            .collect()
    }

    pub fn resolve(&self, object_id: &str) -> Option<StoredObject> {
        self.entries
            .read()
            .iter()
            .find(|e| e.object_id == object_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
