//! Content-addressed backing store.
//!
//! The store is the only component that performs remote I/O.  It is
//! selected when the vault manager is constructed:
//!
//! - `MemoryStore`: in-process map, for tests and embedders,
//! - `DirectoryStore`: blobs on the local filesystem,
//! - `UnavailableStore`: always fails, i.e. explicit offline mode.
//!
//! Every operation is async and fallible.  Callers wrap them in
//! `retry::with_retries` so failures are retried a bounded number of
//! times and never more.

pub mod directory;
pub mod memory;
pub mod retry;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{Result, TierVaultError};

pub use directory::DirectoryStore;
pub use memory::MemoryStore;
pub use retry::{with_retries, RetryPolicy};

/// Namespaced key `{len}:{account_identity}:{record_id}`.
///
/// The byte length of the identity leads the key, so one account's
/// prefix never matches another's even when identities contain `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(account_identity: &str, record_id: &str) -> Self {
        Self(format!(
            "{}{record_id}",
            Self::account_prefix(account_identity)
        ))
    }

    /// Prefix under which every key of an account lives.
    pub fn account_prefix(account_identity: &str) -> String {
        format!("{}:{account_identity}:", account_identity.len())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content address of a stored blob: hex SHA-256 of its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    pub fn for_blob(blob: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(blob)))
    }

    /// Parse a reference, rejecting anything that is not a SHA-256 hex digest.
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(TierVaultError::Format(format!("invalid blob reference '{s}'")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque put/get/delete/list against a backing store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `blob` under `key`, replacing what the key pointed to.
    async fn put(&self, key: &StorageKey, blob: &[u8]) -> Result<BlobRef>;

    /// Fetch a blob; `NotFound` if absent.
    async fn get(&self, blob_ref: &BlobRef) -> Result<Vec<u8>>;

    /// Delete a blob.  Deleting an absent blob succeeds.
    async fn delete(&self, blob_ref: &BlobRef) -> Result<()>;

    /// References of every blob whose key starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<BlobRef>>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T: ContentStore + ?Sized> ContentStore for Arc<T> {
    async fn put(&self, key: &StorageKey, blob: &[u8]) -> Result<BlobRef> {
        (**self).put(key, blob).await
    }

    async fn get(&self, blob_ref: &BlobRef) -> Result<Vec<u8>> {
        (**self).get(blob_ref).await
    }

    async fn delete(&self, blob_ref: &BlobRef) -> Result<()> {
        (**self).delete(blob_ref).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobRef>> {
        (**self).list(prefix).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// A store that is never reachable.  Selecting it runs the vault in
/// degraded (local-only) mode from the start.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

#[async_trait]
impl ContentStore for UnavailableStore {
    async fn put(&self, _key: &StorageKey, _blob: &[u8]) -> Result<BlobRef> {
        Err(offline())
    }

    async fn get(&self, _blob_ref: &BlobRef) -> Result<Vec<u8>> {
        Err(offline())
    }

    async fn delete(&self, _blob_ref: &BlobRef) -> Result<()> {
        Err(offline())
    }

    async fn list(&self, _prefix: &str) -> Result<Vec<BlobRef>> {
        Err(offline())
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}

fn offline() -> TierVaultError {
    TierVaultError::RemoteUnavailable("backing store disabled (offline mode)".into())
}
