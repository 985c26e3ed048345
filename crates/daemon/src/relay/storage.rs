use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Filesystem facts about one stored blob
#[derive(Debug, Clone, PartialEq)]
pub struct BlobMetadata {
    pub size: u64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub accessed: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("blob already exists: {0}")]
    AlreadyExists(String),
    #[error("blob missing: {0}")]
    Missing(String),
    #[error("storage IO error on {object_id}: {source}")]
    Io {
        object_id: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to prepare upload directory {path:?}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    fn from_io(object_id: &str, source: std::io::Error) -> Self {
        match source.kind() {
            ErrorKind::NotFound => StorageError::Missing(object_id.to_string()),
            ErrorKind::AlreadyExists => StorageError::AlreadyExists(object_id.to_string()),
            _ => StorageError::Io {
                object_id: object_id.to_string(),
                source,
            },
        }
    }
}

/// One flat directory, one file per stored object, named by object id
///
/// Blobs are written once and never rewritten.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Use `root` as the upload directory, creating it if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| StorageError::Setup {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, object_id: &str) -> PathBuf {
        self.root.join(object_id)
    }

    /// Write a new blob; fails if `object_id` is already taken
    pub async fn put(&self, object_id: &str, data: &[u8]) -> Result<u64, StorageError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.blob_path(object_id))
            .await
            .map_err(|e| StorageError::from_io(object_id, e))?;

        file.write_all(data)
            .await
            .map_err(|e| StorageError::from_io(object_id, e))?;
        file.sync_all()
            .await
            .map_err(|e| StorageError::from_io(object_id, e))?;

        Ok(data.len() as u64)
    }

    pub async fn open_blob(&self, object_id: &str) -> Result<File, StorageError> {
        File::open(self.blob_path(object_id))
            .await
            .map_err(|e| StorageError::from_io(object_id, e))
    }

    pub async fn metadata(&self, object_id: &str) -> Result<BlobMetadata, StorageError> {
        let meta = fs::metadata(self.blob_path(object_id))
            .await
            .map_err(|e| StorageError::from_io(object_id, e))?;

        let modified = meta
            .modified()
            .map_err(|e| StorageError::from_io(object_id, e))?;
        // not every filesystem records birth time
        let created = meta.created().unwrap_or(modified);
        let accessed = meta.accessed().unwrap_or(modified);

        Ok(BlobMetadata {
            size: meta.len(),
            created: to_utc(created),
            modified: to_utc(modified),
            accessed: to_utc(accessed),
        })
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    async fn read_back(store: &BlobStore, object_id: &str) -> Vec<u8> {
        let mut data = Vec::new();
        store
            .open_blob(object_id)
            .await
            .unwrap()
            .read_to_end(&mut data)
            .await
            .unwrap();
        data
    }

    #[tokio::test]
    async fn test_put_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path().join("uploads")).unwrap();

        let written = store.put("a.enc", b"ciphertext").await.unwrap();
        assert_eq!(written, 10);
        assert_eq!(read_back(&store, "a.enc").await, b"ciphertext");

        let meta = store.metadata("a.enc").await.unwrap();
        assert_eq!(meta.size, 10);
        assert!(meta.created <= Utc::now());
    }

    #[tokio::test]
    async fn test_put_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();

        store.put("a.enc", b"first").await.unwrap();
        let err = store.put("a.enc", b"second").await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
        assert_eq!(read_back(&store, "a.enc").await, b"first");
    }

    #[tokio::test]
    async fn test_missing_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();

        assert!(matches!(
            store.metadata("nope").await,
            Err(StorageError::Missing(_))
        ));
        assert!(matches!(
            store.open_blob("nope").await,
            Err(StorageError::Missing(_))
        ));
    }
}
