//! Record types stored inside a vault.
//!
//! - `Record` is the plaintext view handed to callers.
//! - `StoredRecord` is what the mirror and the backing store persist:
//!   the descriptive fields in the clear, everything else inside an
//!   `EncryptedPayload`.
//! - `RecordSummary` is the metadata-only listing row.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{EncryptedPayload, ProofHash};
use crate::errors::{Result, TierVaultError};

/// Privacy tier of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Public,
    Private,
    Secret,
}

impl Tier {
    /// Whether records of this tier are written to the backing store.
    pub fn requires_remote(self) -> bool {
        self == Tier::Secret
    }

    /// Whether payloads of this tier are confidential.
    pub fn is_encrypted(self) -> bool {
        self != Tier::Public
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::Public => "public",
            Tier::Private => "private",
            Tier::Secret => "secret",
        })
    }
}

/// Caller-supplied content for `add` / `update`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordDraft {
    /// Optional caller-chosen id; assigned by the vault when `None`.
    pub id: Option<String>,
    pub title: String,
    pub username: String,
    pub secret_value: String,
    pub url: String,
    pub notes: String,
    pub category: String,
}

/// A decrypted credential record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_hash: Option<ProofHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_ref: Option<String>,
}

impl Record {
    /// Build a record from a draft; `created_at` and `updated_at` both get `now`.
    pub fn from_draft(id: String, draft: RecordDraft, tier: Tier, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            username: draft.username,
            secret_value: draft.secret_value,
            url: draft.url,
            notes: draft.notes,
            category: draft.category,
            created_at: now,
            updated_at: now,
            privacy_tier: tier,
            proof_hash: None,
            remote_ref: None,
        }
    }

    /// The content of this record as a draft (used for re-classification).
    pub fn to_draft(&self) -> RecordDraft {
        RecordDraft {
            id: Some(self.id.clone()),
            title: self.title.clone(),
            username: self.username.clone(),
            secret_value: self.secret_value.clone(),
            url: self.url.clone(),
            notes: self.notes.clone(),
            category: self.category.clone(),
        }
    }

    pub(crate) fn sealed_fields(&self) -> SealedFields {
        SealedFields {
            username: self.username.clone(),
            secret_value: self.secret_value.clone(),
            url: self.url.clone(),
            notes: self.notes.clone(),
        }
    }

    pub(crate) fn from_stored(stored: &StoredRecord, fields: SealedFields) -> Self {
        Self {
            id: stored.id.clone(),
            title: stored.title.clone(),
            username: fields.username.clone(),
            secret_value: fields.secret_value.clone(),
            url: fields.url.clone(),
            notes: fields.notes.clone(),
            category: stored.category.clone(),
            created_at: stored.created_at,
            updated_at: stored.updated_at,
            privacy_tier: stored.privacy_tier,
            proof_hash: stored.proof_hash.clone(),
            remote_ref: stored.remote_ref.clone(),
        }
    }
}

/// The fields that travel inside a record's encrypted payload.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub(crate) struct SealedFields {
    pub username: String,
    pub secret_value: String,
    pub url: String,
    pub notes: String,
}

impl SealedFields {
    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| TierVaultError::Serialization(format!("record payload: {e}")))
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|_| TierVaultError::Decryption)
    }
}

/// A record as persisted in the local mirror and the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub title: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub privacy_tier: Tier,
    pub payload: EncryptedPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_hash: Option<ProofHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_ref: Option<String>,
}

impl StoredRecord {
    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            category: self.category.clone(),
            privacy_tier: self.privacy_tier,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Lightweight metadata about a record (nothing decrypted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSummary {
    pub id: String,
    pub title: String,
    pub category: String,
    pub privacy_tier: Tier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry of `get_all`: either decrypted, or withheld for lack of a proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEntry {
    Open(Record),
    Sealed(RecordSummary),
}

impl VaultEntry {
    pub fn id(&self) -> &str {
        match self {
            Self::Open(r) => &r.id,
            Self::Sealed(s) => &s.id,
        }
    }

    pub fn tier(&self) -> Tier {
        match self {
            Self::Open(r) => r.privacy_tier,
            Self::Sealed(s) => s.privacy_tier,
        }
    }
}
