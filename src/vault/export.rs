//! Export file format.
//!
//! ```text
//! {
//!   "version": 1,
//!   "exported_at": "...",
//!   "vault": { id, account_identity, records: [...], remote_references, metadata },
//!   "encryption_info": { algorithm, key_derivation, sensitive_fields, requires_master_secret }
//! }
//! ```
//!
//! For `private` and `secret` records every sensitive field is replaced
//! by `SENTINEL` and the real values travel in the sibling
//! `encrypted_data` payload, sealed under an export key derived from the
//! master secret.  Public records are exported as-is.
//!
//! Parsing is strict: unknown fields, missing fields, and sentinel /
//! payload mismatches are all `Format` errors.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::format::{RemoteReference, VaultMetadata};
use super::record::{Record, Tier};
use crate::crypto::{EncryptedPayload, ProofHash};
use crate::errors::{Result, TierVaultError};

/// Current export format version.
pub const EXPORT_VERSION: u32 = 1;

/// Placeholder left in place of an exported sensitive field.
pub const SENTINEL: &str = "[ENCRYPTED]";

/// Fields sealed into `encrypted_data` for non-public records.
pub const SENSITIVE_FIELDS: &[&str] = &["username", "secret_value", "notes"];

pub const ALGORITHM: &str = "AES-256-GCM";
pub const KEY_DERIVATION: &str = "Argon2id+HKDF-SHA256";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportFile {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub vault: ExportedVault,
    pub encryption_info: EncryptionInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportedVault {
    pub id: String,
    pub account_identity: String,
    pub records: Vec<ExportedRecord>,
    pub remote_references: BTreeMap<String, RemoteReference>,
    pub metadata: VaultMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportedRecord {
    pub id: String,
    pub title: String,
    pub username: String,
    pub secret_value: String,
    pub url: String,
    pub notes: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub privacy_tier: Tier,
    pub proof_hash: Option<ProofHash>,
    pub remote_ref: Option<String>,
    pub encrypted_data: Option<EncryptedPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncryptionInfo {
    pub algorithm: String,
    pub key_derivation: String,
    pub sensitive_fields: Vec<String>,
    pub requires_master_secret: bool,
}

impl Default for EncryptionInfo {
    fn default() -> Self {
        Self {
            algorithm: ALGORITHM.to_string(),
            key_derivation: KEY_DERIVATION.to_string(),
            sensitive_fields: SENSITIVE_FIELDS.iter().map(|s| (*s).to_string()).collect(),
            requires_master_secret: true,
        }
    }
}

/// The sensitive values of one record, as sealed into `encrypted_data`.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub(crate) struct SensitiveValues {
    pub username: String,
    pub secret_value: String,
    pub notes: String,
}

impl SensitiveValues {
    pub(crate) fn of(record: &Record) -> Self {
        Self {
            username: record.username.clone(),
            secret_value: record.secret_value.clone(),
            notes: record.notes.clone(),
        }
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| TierVaultError::Serialization(format!("export payload: {e}")))
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| TierVaultError::Format(format!("export payload: {e}")))
    }
}

impl ExportedRecord {
    /// Export a record; `sealed` is `Some` exactly for non-public records.
    pub(crate) fn new(record: &Record, sealed: Option<EncryptedPayload>) -> Self {
        let masked = sealed.is_some();
        let field = |value: &str| {
            if masked {
                SENTINEL.to_string()
            } else {
                value.to_string()
            }
        };
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            username: field(&record.username),
            secret_value: field(&record.secret_value),
            url: record.url.clone(),
            notes: field(&record.notes),
            category: record.category.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            privacy_tier: record.privacy_tier,
            proof_hash: record.proof_hash.clone(),
            remote_ref: record.remote_ref.clone(),
            encrypted_data: sealed,
        }
    }

    /// Rebuild the plaintext record from this entry and its opened values.
    pub(crate) fn into_record(self, values: Option<SensitiveValues>) -> Record {
        let mut record = Record {
            id: self.id,
            title: self.title,
            username: self.username,
            secret_value: self.secret_value,
            url: self.url,
            notes: self.notes,
            category: self.category,
            created_at: self.created_at,
            updated_at: self.updated_at,
            privacy_tier: self.privacy_tier,
            proof_hash: None,
            remote_ref: None,
        };
        if let Some(values) = values {
            record.username = values.username.clone();
            record.secret_value = values.secret_value.clone();
            record.notes = values.notes.clone();
        }
        record
    }
}

impl ExportFile {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TierVaultError::Serialization(format!("export: {e}")))
    }

    /// Parse and validate an export document.
    pub fn parse(json: &str) -> Result<Self> {
        let file: ExportFile = serde_json::from_str(json)
            .map_err(|e| TierVaultError::Format(format!("export JSON: {e}")))?;
        file.validate()?;
        Ok(file)
    }

    fn validate(&self) -> Result<()> {
        if self.version != EXPORT_VERSION {
            return Err(TierVaultError::Format(format!(
                "unsupported export version {}, expected {EXPORT_VERSION}",
                self.version
            )));
        }
        if self.encryption_info.algorithm != ALGORITHM {
            return Err(TierVaultError::Format(format!(
                "unsupported export algorithm '{}'",
                self.encryption_info.algorithm
            )));
        }
        if self.vault.metadata.record_count != self.vault.records.len() {
            return Err(TierVaultError::Format(
                "record_count does not match exported records".into(),
            ));
        }

        let mut ids = BTreeSet::new();
        for record in &self.vault.records {
            if !ids.insert(record.id.as_str()) {
                return Err(TierVaultError::Format(format!(
                    "duplicate record id '{}'",
                    record.id
                )));
            }

            let masked = [&record.username, &record.secret_value, &record.notes]
                .iter()
                .all(|v| v.as_str() == SENTINEL);
            match (record.privacy_tier, &record.encrypted_data) {
                (Tier::Public, None) => {}
                (Tier::Private | Tier::Secret, Some(payload)) if masked => {
                    if payload.tier == Tier::Public {
                        return Err(TierVaultError::Format(format!(
                            "record '{}' carries an unencrypted export payload",
                            record.id
                        )));
                    }
                }
                _ => {
                    return Err(TierVaultError::Format(format!(
                        "record '{}' sensitive fields do not match its tier",
                        record.id
                    )));
                }
            }
        }
        Ok(())
    }
}
