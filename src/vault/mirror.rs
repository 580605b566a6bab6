//! Local mirror: the fast, synchronous copy of every account's vault.
//!
//! The mirror is authoritative for reads within a session and when the
//! backing store is degraded.  `save` and `load` move whole vaults, so a
//! partially written vault is never observed.  The master secret is
//! never part of what gets mirrored.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};

use super::format::{write_atomic, Vault};
use crate::errors::{Result, TierVaultError};

/// Synchronous vault persistence keyed by account identity.
pub trait LocalMirror: Send + Sync {
    /// Load the vault for `account_identity`, if one was saved.
    fn load(&self, account_identity: &str) -> Result<Option<Vault>>;

    /// Persist the whole vault, replacing any previous copy.
    fn save(&self, vault: &Vault) -> Result<()>;

    /// Remove the vault for `account_identity`.  Missing vaults are fine.
    fn clear(&self, account_identity: &str) -> Result<()>;
}

impl<T: LocalMirror + ?Sized> LocalMirror for Arc<T> {
    fn load(&self, account_identity: &str) -> Result<Option<Vault>> {
        (**self).load(account_identity)
    }

    fn save(&self, vault: &Vault) -> Result<()> {
        (**self).save(vault)
    }

    fn clear(&self, account_identity: &str) -> Result<()> {
        (**self).clear(account_identity)
    }
}

/// One JSON file per account under a directory.
///
/// File names are the SHA-256 of the account identity so arbitrary
/// identities (wallet addresses, emails) map to safe paths.
#[derive(Debug, Clone)]
pub struct FileMirror {
    dir: PathBuf,
}

impl FileMirror {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the mirror file for an account.
    pub fn path_for(&self, account_identity: &str) -> PathBuf {
        let digest = Sha256::digest(account_identity.as_bytes());
        self.dir
            .join(format!("{}.vault.json", hex::encode(&digest[..16])))
    }
}

impl LocalMirror for FileMirror {
    fn load(&self, account_identity: &str) -> Result<Option<Vault>> {
        let path = self.path_for(account_identity);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        let vault = Vault::from_json(&bytes)?;
        if vault.account_identity != account_identity {
            return Err(TierVaultError::Format(format!(
                "mirror file {} belongs to a different account",
                path.display()
            )));
        }
        Ok(Some(vault))
    }

    fn save(&self, vault: &Vault) -> Result<()> {
        let path = self.path_for(&vault.account_identity);
        write_atomic(&path, &vault.to_json()?)
    }

    fn clear(&self, account_identity: &str) -> Result<()> {
        let path = self.path_for(account_identity);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process mirror.  Vaults are kept serialized so every `load` hands
/// back an independent copy, the same as reading from disk.
#[derive(Debug, Default)]
pub struct MemoryMirror {
    vaults: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.vaults
            .lock()
            .map_err(|_| TierVaultError::Io(std::io::Error::other("memory mirror lock poisoned")))
    }
}

impl LocalMirror for MemoryMirror {
    fn load(&self, account_identity: &str) -> Result<Option<Vault>> {
        let vaults = self.lock()?;
        vaults
            .get(account_identity)
            .map(|bytes| Vault::from_json(bytes))
            .transpose()
    }

    fn save(&self, vault: &Vault) -> Result<()> {
        let bytes = vault.to_json()?;
        self.lock()?.insert(vault.account_identity.clone(), bytes);
        Ok(())
    }

    fn clear(&self, account_identity: &str) -> Result<()> {
        self.lock()?.remove(account_identity);
        Ok(())
    }
}
