//! In-process content store.
//!
//! Keeps blobs in a map behind a mutex.  It can be switched offline to
//! exercise degraded mode, and it counts write attempts so callers can
//! observe retry behaviour.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{BlobRef, ContentStore, StorageKey};
use crate::errors::{Result, TierVaultError};

#[derive(Debug, Default)]
struct Inner {
    keys: BTreeMap<StorageKey, BlobRef>,
    blobs: HashMap<BlobRef, Vec<u8>>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    offline: AtomicBool,
    put_attempts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline, every call fails with `RemoteUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of `put` calls seen so far, failed ones included.
    pub fn put_attempts(&self) -> usize {
        self.put_attempts.load(Ordering::SeqCst)
    }

    /// Number of blobs currently held.
    pub fn blob_count(&self) -> usize {
        self.inner.lock().map(|i| i.blobs.len()).unwrap_or(0)
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(TierVaultError::RemoteUnavailable(
                "memory store is offline".into(),
            ))
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| TierVaultError::RemoteUnavailable("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn put(&self, key: &StorageKey, blob: &[u8]) -> Result<BlobRef> {
        self.put_attempts.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let blob_ref = BlobRef::for_blob(blob);
        let mut inner = self.lock()?;
        inner.blobs.insert(blob_ref.clone(), blob.to_vec());
        inner.keys.insert(key.clone(), blob_ref.clone());
        Ok(blob_ref)
    }

    async fn get(&self, blob_ref: &BlobRef) -> Result<Vec<u8>> {
        self.check_online()?;
        self.lock()?
            .blobs
            .get(blob_ref)
            .cloned()
            .ok_or_else(|| TierVaultError::NotFound(format!("blob {blob_ref}")))
    }

    async fn delete(&self, blob_ref: &BlobRef) -> Result<()> {
        self.check_online()?;
        let mut inner = self.lock()?;
        inner.blobs.remove(blob_ref);
        inner.keys.retain(|_, r| r != blob_ref);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobRef>> {
        self.check_online()?;
        Ok(self
            .lock()?
            .keys
            .iter()
            .filter(|(k, _)| k.as_str().starts_with(prefix))
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
