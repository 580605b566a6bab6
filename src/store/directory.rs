//! Filesystem-backed content store.
//!
//! Layout under the store directory:
//!
//! ```text
//! <ref>.blob    one file per blob, named by its SHA-256
//! index.json    { "<len>:<account>:<record>": "<ref>", ... }
//! ```
//!
//! Blob files and the index are written temp-file-then-rename so a
//! crash leaves either the old or the new content.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use super::{BlobRef, ContentStore, StorageKey};
use crate::errors::{Result, TierVaultError};

const INDEX_FILE: &str = "index.json";

type Index = BTreeMap<StorageKey, BlobRef>;

#[derive(Debug)]
pub struct DirectoryStore {
    dir: PathBuf,
    /// Serializes index read-modify-write cycles within this process.
    index_lock: Mutex<()>,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            index_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, blob_ref: &BlobRef) -> PathBuf {
        self.dir.join(format!("{blob_ref}.blob"))
    }

    async fn read_index(&self) -> Result<Index> {
        let path = self.dir.join(INDEX_FILE);
        match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| TierVaultError::Format(format!("store index: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Index::new()),
            Err(e) => Err(unavailable(&e)),
        }
    }

    async fn write_index(&self, index: &Index) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(index)
            .map_err(|e| TierVaultError::Serialization(format!("store index: {e}")))?;
        self.write_file(&self.dir.join(INDEX_FILE), &bytes).await
    }

    async fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| unavailable(&e))?;
        let tmp = self.dir.join(format!(
            ".{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));
        fs::write(&tmp, bytes).await.map_err(|e| unavailable(&e))?;
        fs::rename(&tmp, path).await.map_err(|e| unavailable(&e))
    }
}

#[async_trait]
impl ContentStore for DirectoryStore {
    async fn put(&self, key: &StorageKey, blob: &[u8]) -> Result<BlobRef> {
        let blob_ref = BlobRef::for_blob(blob);
        self.write_file(&self.blob_path(&blob_ref), blob).await?;

        let _guard = self.index_lock.lock().await;
        let mut index = self.read_index().await?;
        index.insert(key.clone(), blob_ref.clone());
        self.write_index(&index).await?;

        debug!(key = %key, blob = %blob_ref, "stored blob");
        Ok(blob_ref)
    }

    async fn get(&self, blob_ref: &BlobRef) -> Result<Vec<u8>> {
        match fs::read(self.blob_path(blob_ref)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TierVaultError::NotFound(format!("blob {blob_ref}")))
            }
            Err(e) => Err(unavailable(&e)),
        }
    }

    async fn delete(&self, blob_ref: &BlobRef) -> Result<()> {
        // Unindex first: a crash in between leaves an orphan file, never
        // an index entry pointing at nothing.
        {
            let _guard = self.index_lock.lock().await;
            let mut index = self.read_index().await?;
            let before = index.len();
            index.retain(|_, r| r != blob_ref);
            if index.len() != before {
                self.write_index(&index).await?;
            }
        }

        match fs::remove_file(self.blob_path(blob_ref)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(unavailable(&e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobRef>> {
        let _guard = self.index_lock.lock().await;
        Ok(self
            .read_index()
            .await?
            .into_iter()
            .filter(|(k, _)| k.as_str().starts_with(prefix))
            .map(|(_, r)| r)
            .collect())
    }

    fn name(&self) -> &'static str {
        "directory"
    }
}

fn unavailable(e: &std::io::Error) -> TierVaultError {
    TierVaultError::RemoteUnavailable(format!("directory store I/O: {e}"))
}
