//! Persisted vault layout.
//!
//! A vault serializes to a single JSON document:
//!
//! ```text
//! { id, account_identity, records: [StoredRecord], remote_references: {id: ref}, metadata: {...} }
//! ```
//!
//! Timestamps are ISO-8601 (chrono's RFC 3339 serialization), byte
//! fields are base64 strings.  Writes to disk go through
//! `write_atomic` so readers never see a half-written vault.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::StoredRecord;
use crate::crypto::EncryptedPayload;
use crate::errors::{Result, TierVaultError};

/// Current persisted format version.
pub const CURRENT_VERSION: u32 = 1;

/// One account's vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub id: String,
    pub account_identity: String,
    pub records: Vec<StoredRecord>,
    pub remote_references: BTreeMap<String, RemoteReference>,
    pub metadata: VaultMetadata,
}

/// Where a record's blob lives in the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteReference {
    pub storage_key: String,
    pub proof_hash: String,
    pub stored_at: DateTime<Utc>,
}

/// Vault-level bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultMetadata {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub record_count: usize,
    pub proof_enabled: bool,
    /// Master-secret verifier: a constant sealed under the key-check key.
    /// Never the secret itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_check: Option<EncryptedPayload>,
}

impl Vault {
    /// An empty vault for `account_identity`.
    pub fn new(account_identity: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            account_identity: account_identity.to_string(),
            records: Vec::new(),
            remote_references: BTreeMap::new(),
            metadata: VaultMetadata {
                version: CURRENT_VERSION,
                created_at: now,
                updated_at: now,
                record_count: 0,
                proof_enabled: true,
                key_check: None,
            },
        }
    }

    pub fn find(&self, id: &str) -> Option<&StoredRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    /// Refresh `record_count` and `updated_at` after a mutation.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.metadata.record_count = self.records.len();
        self.metadata.updated_at = now;
    }

    /// Reject structurally inconsistent vaults.
    pub fn validate(&self) -> Result<()> {
        if self.metadata.version != CURRENT_VERSION {
            return Err(TierVaultError::Format(format!(
                "unsupported vault version {}, expected {CURRENT_VERSION}",
                self.metadata.version
            )));
        }
        if self.metadata.record_count != self.records.len() {
            return Err(TierVaultError::Format(format!(
                "record_count {} does not match {} records",
                self.metadata.record_count,
                self.records.len()
            )));
        }
        let mut seen = std::collections::BTreeSet::new();
        for record in &self.records {
            if !seen.insert(record.id.as_str()) {
                return Err(TierVaultError::Format(format!(
                    "duplicate record id '{}'",
                    record.id
                )));
            }
            if record.payload.tier != record.privacy_tier {
                return Err(TierVaultError::Format(format!(
                    "record '{}' payload tier does not match its privacy tier",
                    record.id
                )));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| TierVaultError::Serialization(format!("vault: {e}")))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let vault: Vault = serde_json::from_slice(bytes)
            .map_err(|e| TierVaultError::Format(format!("vault JSON: {e}")))?;
        vault.validate()?;
        Ok(vault)
    }
}

/// Write `bytes` to `path` **atomically**.
///
/// Writes to a temp file in the same directory, then renames it over the
/// target; the rename is atomic on the same filesystem.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    if !parent.exists() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    fs::write(&tmp_path, bytes)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded Vec<u8> fields
// ---------------------------------------------------------------------------

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

pub(crate) fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let encoded = BASE64.encode(data);
    serializer.serialize_str(&encoded)
}

pub(crate) fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::Tier;
    use tempfile::TempDir;

    fn stored(id: &str) -> StoredRecord {
        let now = Utc::now();
        StoredRecord {
            id: id.into(),
            title: "t".into(),
            category: "c".into(),
            created_at: now,
            updated_at: now,
            privacy_tier: Tier::Public,
            payload: EncryptedPayload {
                ciphertext: b"{}".to_vec(),
                iv: vec![],
                salt: vec![],
                tier: Tier::Public,
            },
            proof_hash: None,
            remote_ref: None,
        }
    }

    #[test]
    fn json_roundtrip_keeps_everything() {
        let mut vault = Vault::new("0xabc", Utc::now());
        vault.records.push(stored("a"));
        vault.touch(Utc::now());

        let bytes = vault.to_json().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("\"account_identity\": \"0xabc\""));
        assert!(text.contains("\"remote_references\""));

        let back = Vault::from_json(&bytes).unwrap();
        assert_eq!(back, vault);
    }

    #[test]
    fn record_count_mismatch_is_format_error() {
        let mut vault = Vault::new("0xabc", Utc::now());
        vault.records.push(stored("a"));
        let bytes = vault.to_json().unwrap();
        assert!(matches!(
            Vault::from_json(&bytes),
            Err(TierVaultError::Format(_))
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut vault = Vault::new("0xabc", Utc::now());
        vault.records.push(stored("a"));
        vault.records.push(stored("a"));
        vault.touch(Utc::now());
        assert!(vault.validate().is_err());
    }

    #[test]
    fn missing_field_is_format_error() {
        let json = br#"{"id":"x","account_identity":"a","records":[],"metadata":{"version":1}}"#;
        assert!(matches!(
            Vault::from_json(json),
            Err(TierVaultError::Format(_))
        ));
    }

    #[test]
    fn write_atomic_replaces_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("v.json");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
        assert!(!dir.path().join("nested").join(".v.json.tmp").exists());
    }
}
