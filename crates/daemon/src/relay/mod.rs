//! The file relay: accepts uploads, lists what a peer may see, and hands out
//! ciphertext to the peers an object is addressed to.
//!
//! Every entry point touches the presence registry with the caller's identity
//! before doing anything else, including calls that end in an error.

use std::io;

use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use common::prelude::{
    CatalogError, CipherError, ObjectCatalog, PeerIdentity, PresenceRegistry, Recipient,
    SharedKey, StoredObject, SubnetProber,
};

pub mod listing;
pub mod storage;

pub use listing::{FileListing, ListQuery, SortKey, SortOrder};
pub use storage::{BlobMetadata, BlobStore, StorageError};

/// Size of each chunk a download is streamed in
pub const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;
/// Hex characters of randomness appended to every object id
const OBJECT_ID_SUFFIX_LEN: usize = 8;
const OBJECT_ID_ATTEMPTS: usize = 3;
/// Byte budget for the name part of an object id; the suffix and `.enc` still
/// fit under the usual 255-byte file name limit.
const MAX_NAME_BYTES: usize = 200;

/// An upload as it arrives from the transport layer
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub file_name: Option<String>,
    pub data: Option<Bytes>,
    pub recipient: Recipient,
}

/// Ciphertext of one object, ready to be streamed out
pub struct Download {
    pub object: StoredObject,
    /// Size of the ciphertext in bytes
    pub size: u64,
    pub body: BoxStream<'static, io::Result<Bytes>>,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("object", &self.object)
            .field("size", &self.size)
            .finish()
    }
}

/// Where `active_peers` gets its answer from
#[derive(Debug, Clone)]
enum PeerSource {
    Presence,
    Subnet(SubnetProber),
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("{requester} is not a recipient of {object_id}")]
    AccessDenied {
        object_id: String,
        requester: PeerIdentity,
    },
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone)]
pub struct FileRelay {
    store: BlobStore,
    catalog: ObjectCatalog,
    presence: PresenceRegistry,
    key: SharedKey,
    peer_source: PeerSource,
}

impl FileRelay {
    pub fn new(
        store: BlobStore,
        catalog: ObjectCatalog,
        presence: PresenceRegistry,
        key: SharedKey,
    ) -> Self {
        Self {
            store,
            catalog,
            presence,
            key,
            peer_source: PeerSource::Presence,
        }
    }

    /// Answer peer queries from the prober's snapshot instead of the registry
    pub fn with_subnet_prober(mut self, prober: SubnetProber) -> Self {
        self.peer_source = PeerSource::Subnet(prober);
        self
    }

    pub fn store(&self) -> &BlobStore {
        &self.store
    }

    pub fn catalog(&self) -> &ObjectCatalog {
        &self.catalog
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    /// Encrypt and store an upload addressed to `request.recipient`
    pub async fn upload(
        &self,
        sender: &PeerIdentity,
        request: UploadRequest,
    ) -> Result<FileListing, RelayError> {
        self.presence.touch(sender);

        let file_name = request
            .file_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| RelayError::BadRequest("no file selected".into()))?;
        let data = request
            .data
            .filter(|data| !data.is_empty())
            .ok_or_else(|| RelayError::BadRequest("file is empty".into()))?;
        let clean_name = sanitize_file_name(&file_name)
            .ok_or_else(|| RelayError::BadRequest(format!("invalid file name: {:?}", file_name)))?;

        let key = self.key.clone();
        let blob = tokio::task::spawn_blocking(move || key.encrypt(&data))
            .await
            .map_err(|e| RelayError::Internal(e.to_string()))??;

        let object_id = self.put_unique(&clean_name, &blob).await?;

        let object = StoredObject {
            object_id: object_id.clone(),
            original_name: file_name,
            size_bytes: blob.len() as u64,
            sender: sender.clone(),
            recipient: request.recipient,
            created_at: Utc::now(),
        };
        self.catalog.record(object.clone())?;

        tracing::info!(
            object_id = %object.object_id,
            sender = %object.sender,
            recipient = %object.recipient,
            size = object.size_bytes,
            "stored upload"
        );

        let meta = self.store.metadata(&object_id).await?;
        Ok(FileListing::new(&object, &meta))
    }

    async fn put_unique(&self, clean_name: &str, blob: &[u8]) -> Result<String, RelayError> {
        let mut last_err = None;
        for _ in 0..OBJECT_ID_ATTEMPTS {
            let object_id = object_id_for(clean_name);
            match self.store.put(&object_id, blob).await {
                Ok(_) => return Ok(object_id),
                Err(e @ StorageError::AlreadyExists(_)) => {
                    tracing::debug!(%object_id, "object id collision, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(last_err
            .map(RelayError::from)
            .unwrap_or_else(|| RelayError::Internal("no object id attempted".into())))
    }

    /// Objects visible to `requester`, with on-disk metadata, sorted per `query`
    pub async fn list(
        &self,
        requester: &PeerIdentity,
        query: &ListQuery,
    ) -> Result<Vec<FileListing>, RelayError> {
        self.presence.touch(requester);

        let mut listings = Vec::new();
        for object in self.catalog.list_for(requester) {
            match self.store.metadata(&object.object_id).await {
                Ok(meta) => listings.push(FileListing::new(&object, &meta)),
                Err(StorageError::Missing(_)) => {
                    tracing::warn!(object_id = %object.object_id, "blob missing from upload directory, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }

        listing::sort_listings(
            &mut listings,
            SortKey::parse(query.sort.as_deref()),
            SortOrder::parse(query.order.as_deref()),
        );
        Ok(listings)
    }

    /// Resolve `object_id` and, if `requester` may have it, open its ciphertext
    ///
    /// Unknown ids fail with `NotFound` before the recipient is checked.
    pub async fn download(
        &self,
        requester: &PeerIdentity,
        object_id: &str,
    ) -> Result<Download, RelayError> {
        self.presence.touch(requester);

        let object = self
            .catalog
            .resolve(object_id)
            .ok_or_else(|| RelayError::NotFound(object_id.to_string()))?;

        if !object.is_visible_to(requester) {
            tracing::warn!(
                object_id,
                requester = %requester,
                recipient = %object.recipient,
                "download refused"
            );
            return Err(RelayError::AccessDenied {
                object_id: object_id.to_string(),
                requester: requester.clone(),
            });
        }

        let file = match self.store.open_blob(object_id).await {
            Ok(file) => file,
            Err(StorageError::Missing(_)) => {
                return Err(RelayError::NotFound(object_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let size = file
            .metadata()
            .await
            .map_err(|source| StorageError::Io {
                object_id: object_id.to_string(),
                source,
            })?
            .len();

        tracing::info!(object_id, requester = %requester, size, "serving download");

        let body = stream::try_unfold(file, |mut file| async move {
            let mut chunk = BytesMut::with_capacity(DOWNLOAD_CHUNK_SIZE);
            let next = match file.read_buf(&mut chunk).await? {
                0 => None,
                _ => Some((chunk.freeze(), file)),
            };
            Ok::<_, io::Error>(next)
        })
        .boxed();

        Ok(Download { object, size, body })
    }

    /// Peers currently believed to be up, sorted
    pub fn active_peers(&self, requester: &PeerIdentity) -> Vec<PeerIdentity> {
        self.presence.touch(requester);
        match &self.peer_source {
            PeerSource::Presence => self.presence.list_active(),
            PeerSource::Subnet(prober) => prober.snapshot(),
        }
    }
}

/// Reduce an uploaded name to something safe to embed in a file name
///
/// Keeps only the last path component, drops control characters and cuts it
/// to `MAX_NAME_BYTES` on a char boundary. `None` when nothing usable is left.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut clean = String::new();
    for c in last.chars().filter(|c| !c.is_control()) {
        if clean.len() + c.len_utf8() > MAX_NAME_BYTES {
            break;
        }
        clean.push(c);
    }
    let clean = clean.trim();

    match clean {
        "" | "." | ".." => None,
        _ => Some(clean.to_string()),
    }
}

fn object_id_for(clean_name: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}.enc", clean_name, &suffix[..OBJECT_ID_SUFFIX_LEN])
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::TryStreamExt;
    use tempfile::TempDir;

    use super::*;

    fn relay() -> (FileRelay, SharedKey, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let key = SharedKey::generate();
        let relay = FileRelay::new(
            BlobStore::open(dir.path().join("uploads")).unwrap(),
            ObjectCatalog::new(),
            PresenceRegistry::new(Duration::from_secs(30)),
            key.clone(),
        );
        (relay, key, dir)
    }

    fn upload_of(name: &str, data: &[u8], recipient: Recipient) -> UploadRequest {
        UploadRequest {
            file_name: Some(name.to_string()),
            data: Some(Bytes::copy_from_slice(data)),
            recipient,
        }
    }

    async fn fetch(relay: &FileRelay, who: &PeerIdentity, id: &str) -> Result<Vec<u8>, RelayError> {
        let download = relay.download(who, id).await?;
        let chunks: Vec<Bytes> = download.body.try_collect().await.unwrap();
        Ok(chunks.concat())
    }

    #[tokio::test]
    async fn test_upload_defaults_to_everyone() {
        let (relay, key, _dir) = relay();
        let x = PeerIdentity::from("10.0.0.1");
        let anyone = PeerIdentity::from("10.0.0.77");

        let stored = relay
            .upload(&x, upload_of("notes.txt", b"hello relay", Recipient::default()))
            .await
            .unwrap();
        assert_eq!(stored.recipient, Recipient::Everyone);
        assert_eq!(stored.original_name, "notes.txt");
        assert!(stored.name.starts_with("notes.txt_"));
        assert!(stored.name.ends_with(".enc"));

        let listed = relay.list(&anyone, &ListQuery::default()).await.unwrap();
        assert_eq!(listed.len(), 1);

        let blob = fetch(&relay, &anyone, &stored.name).await.unwrap();
        assert_ne!(blob, b"hello relay");
        assert_eq!(key.decrypt(&blob).unwrap(), b"hello relay");
    }

    #[tokio::test]
    async fn test_recipient_is_enforced() {
        let (relay, key, _dir) = relay();
        let x = PeerIdentity::from("10.0.0.1");
        let y = PeerIdentity::from("10.0.0.2");
        let z = PeerIdentity::from("10.0.0.3");

        let stored = relay
            .upload(&x, upload_of("plan.pdf", b"for y only", Recipient::Peer(y.clone())))
            .await
            .unwrap();

        let for_y = relay.list(&y, &ListQuery::default()).await.unwrap();
        assert_eq!(for_y.len(), 1);
        let blob = fetch(&relay, &y, &stored.name).await.unwrap();
        assert_eq!(key.decrypt(&blob).unwrap(), b"for y only");

        assert!(relay.list(&z, &ListQuery::default()).await.unwrap().is_empty());
        let err = relay.download(&z, &stored.name).await.unwrap_err();
        assert!(matches!(err, RelayError::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn test_unknown_object_is_not_found() {
        let (relay, _key, _dir) = relay();
        let who = PeerIdentity::from("10.0.0.9");
        let err = relay.download(&who, "missing.enc").await.unwrap_err();
        assert!(matches!(err, RelayError::NotFound(_)));
        // the failed request still counts as activity
        assert!(relay.presence().is_active(&who));
    }

    #[tokio::test]
    async fn test_upload_rejects_missing_parts() {
        let (relay, _key, _dir) = relay();
        let x = PeerIdentity::from("10.0.0.1");

        let no_name = UploadRequest {
            file_name: None,
            data: Some(Bytes::from_static(b"data")),
            recipient: Recipient::Everyone,
        };
        let empty = upload_of("a.txt", b"", Recipient::Everyone);
        let dots = upload_of("../..", b"data", Recipient::Everyone);

        for request in [no_name, empty, dots] {
            let err = relay.upload(&x, request).await.unwrap_err();
            assert!(matches!(err, RelayError::BadRequest(_)), "{:?}", err);
        }
        assert!(relay.catalog().is_empty());
    }

    #[tokio::test]
    async fn test_list_sorts_by_size() {
        let (relay, _key, _dir) = relay();
        let x = PeerIdentity::from("10.0.0.1");

        // ciphertext sizes follow plaintext sizes block for block
        for (name, len) in [("big", 290), ("small", 90), ("mid", 190)] {
            relay
                .upload(&x, upload_of(name, &vec![7u8; len], Recipient::Everyone))
                .await
                .unwrap();
        }

        let query = |sort: &str, order: &str| ListQuery {
            sort: Some(sort.to_string()),
            order: Some(order.to_string()),
        };
        let names = |listings: Vec<FileListing>| {
            listings
                .into_iter()
                .map(|l| l.original_name)
                .collect::<Vec<_>>()
        };

        let asc = relay.list(&x, &query("size", "asc")).await.unwrap();
        assert!(asc.windows(2).all(|w| w[0].size < w[1].size));
        assert_eq!(names(asc), vec!["small", "mid", "big"]);

        let desc = relay.list(&x, &query("size", "desc")).await.unwrap();
        assert_eq!(names(desc), vec!["big", "mid", "small"]);

        let bogus = relay.list(&x, &query("colour", "asc")).await.unwrap();
        let by_name = relay.list(&x, &query("name", "asc")).await.unwrap();
        assert_eq!(bogus, by_name);
    }

    #[tokio::test]
    async fn test_list_skips_vanished_blobs() {
        let (relay, _key, _dir) = relay();
        let x = PeerIdentity::from("10.0.0.1");

        let stored = relay
            .upload(&x, upload_of("gone.txt", b"bye", Recipient::Everyone))
            .await
            .unwrap();
        std::fs::remove_file(relay.store().root().join(&stored.name)).unwrap();

        assert!(relay.list(&x, &ListQuery::default()).await.unwrap().is_empty());
        assert!(matches!(
            relay.download(&x, &stored.name).await.unwrap_err(),
            RelayError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_same_name_uploads_get_distinct_ids() {
        let (relay, _key, _dir) = relay();
        let x = PeerIdentity::from("10.0.0.1");

        let a = relay
            .upload(&x, upload_of("same.txt", b"one", Recipient::Everyone))
            .await
            .unwrap();
        let b = relay
            .upload(&x, upload_of("same.txt", b"two", Recipient::Everyone))
            .await
            .unwrap();
        assert_ne!(a.name, b.name);
        assert_eq!(relay.catalog().len(), 2);
    }

    #[tokio::test]
    async fn test_active_peers_from_presence() {
        let (relay, _key, _dir) = relay();
        let a = PeerIdentity::from("10.0.0.1");
        let b = PeerIdentity::from("10.0.0.2");

        relay.list(&b, &ListQuery::default()).await.unwrap();
        assert_eq!(relay.active_peers(&a), vec![a.clone(), b.clone()]);
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.pdf").as_deref(), Some("report.pdf"));
        assert_eq!(sanitize_file_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_file_name("C:\\Users\\me\\a.txt").as_deref(), Some("a.txt"));
        assert_eq!(sanitize_file_name("bad\u{0}name\n").as_deref(), Some("badname"));
        assert_eq!(sanitize_file_name("dir/"), None);
        assert_eq!(sanitize_file_name(".."), None);
        assert_eq!(sanitize_file_name("   "), None);
    }

    #[test]
    fn test_sanitize_caps_bytes_on_char_boundary() {
        let long = format!("{}.txt", "日".repeat(100));
        let clean = sanitize_file_name(&long).unwrap();
        assert!(clean.len() <= MAX_NAME_BYTES);
        assert!(clean.chars().all(|c| c == '日'));
        assert_eq!(clean.len(), 198);

        let ascii = "a".repeat(300);
        assert_eq!(sanitize_file_name(&ascii).unwrap().len(), MAX_NAME_BYTES);
    }

    #[tokio::test]
    async fn test_long_multibyte_name_uploads() {
        let (relay, key, _dir) = relay();
        let x = PeerIdentity::from("10.0.0.1");
        let name = format!("{}.txt", "日".repeat(100));

        let stored = relay
            .upload(&x, upload_of(&name, b"wide name", Recipient::Everyone))
            .await
            .unwrap();
        assert!(stored.name.len() <= 255);
        assert_eq!(stored.original_name, name);

        let blob = fetch(&relay, &x, &stored.name).await.unwrap();
        assert_eq!(key.decrypt(&blob).unwrap(), b"wide name");
    }
}
