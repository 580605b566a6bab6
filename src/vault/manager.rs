//! High-level vault operations used by CLI commands and embedders.
//!
//! `VaultManager` owns the session for one account at a time.  It ties
//! together the classifier, the tier cipher, the local mirror and the
//! content-addressed backing store:
//!
//! ```text
//! Locked --unlock--> Unlocking --ok--> Unlocked --lock--> Locked
//!                        \--fail--> Locked
//! Unlocked --reset / force_reset--> Resetting --> Locked
//! ```
//!
//! Every mutation is made durable in the local mirror *before* any
//! backing-store call.  Store failures never undo a local write; they
//! come back as warnings (degraded mode) and the missing references can
//! be pushed later with `backfill_remote`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::proof::{self, AccessProof};
use crate::crypto::{self, Argon2Params, EncryptedPayload, KeyPurpose, TierKey};
use crate::errors::{ErrorKind, Result, TierVaultError};
use crate::store::{with_retries, BlobRef, ContentStore, RetryPolicy, StorageKey};

use super::classifier::TierClassifier;
use super::export::{
    EncryptionInfo, ExportFile, ExportedRecord, ExportedVault, SensitiveValues, EXPORT_VERSION,
};
use super::format::{RemoteReference, Vault};
use super::mirror::LocalMirror;
use super::record::{
    Record, RecordDraft, RecordSummary, SealedFields, StoredRecord, Tier, VaultEntry,
};

/// Constant sealed under the key-check key to verify a master secret.
const KEY_CHECK_PLAINTEXT: &[u8] = b"tiervault-key-check-v1";

/// Lifecycle of the manager's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    Locked,
    Unlocking,
    Unlocked,
    Resetting,
}

impl fmt::Display for VaultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Locked => "locked",
            Self::Unlocking => "unlocking",
            Self::Unlocked => "unlocked",
            Self::Resetting => "resetting",
        })
    }
}

/// Tunables for a manager instance.
#[derive(Debug, Clone, Default)]
pub struct VaultOptions {
    pub kdf: Argon2Params,
    pub classifier: TierClassifier,
    pub retry: RetryPolicy,
    /// Add a sample record to freshly created vaults.
    pub seed_new_vaults: bool,
}

/// Non-fatal problems reported alongside a successful operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultWarning {
    /// The backing store could not be reached; local state is intact.
    RemoteUnavailable {
        record_id: Option<String>,
        reason: String,
    },
    /// The store listed a blob for this account that it could not return.
    MissingBlob { blob_ref: String },
}

impl fmt::Display for VaultWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteUnavailable {
                record_id: Some(id),
                reason,
            } => write!(f, "record '{id}' saved locally only: {reason}"),
            Self::RemoteUnavailable {
                record_id: None,
                reason,
            } => write!(f, "backing store unavailable: {reason}"),
            Self::MissingBlob { blob_ref } => {
                write!(f, "blob {blob_ref} is missing from the backing store; skipped")
            }
        }
    }
}

/// Result of `add`, `update` and `delete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub record_id: String,
    pub warnings: Vec<VaultWarning>,
}

impl WriteOutcome {
    fn new(record_id: &str) -> Self {
        Self {
            record_id: record_id.to_string(),
            warnings: Vec::new(),
        }
    }

    /// Whether the write only reached the local mirror.
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockReport {
    /// A new, empty vault was created.
    pub created: bool,
    /// Records recovered from the backing store into an empty mirror.
    pub restored: usize,
    pub warnings: Vec<VaultWarning>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub pushed: usize,
    pub warnings: Vec<VaultWarning>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub pushed: usize,
    pub warnings: Vec<VaultWarning>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub remote_deleted: usize,
    pub warnings: Vec<VaultWarning>,
}

/// The unlocked state: the master secret lives only here.
struct Session {
    master: Zeroizing<String>,
    identity: String,
    vault: Vault,
}

impl Session {
    fn sealer<'a>(&'a self, kdf: &'a Argon2Params) -> Sealer<'a> {
        Sealer {
            master: self.master.as_bytes(),
            identity: &self.identity,
            kdf,
        }
    }
}

/// The main vault handle.
pub struct VaultManager {
    mirror: Box<dyn LocalMirror>,
    store: Box<dyn ContentStore>,
    options: VaultOptions,
    account_identity: Option<String>,
    state: VaultState,
    session: Option<Session>,
}

impl VaultManager {
    pub fn new(
        mirror: Box<dyn LocalMirror>,
        store: Box<dyn ContentStore>,
        options: VaultOptions,
    ) -> Self {
        Self {
            mirror,
            store,
            options,
            account_identity: None,
            state: VaultState::Locked,
            session: None,
        }
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Select the account.  Switching to another account locks the vault.
    pub fn set_account_identity(&mut self, account_identity: &str) -> Result<()> {
        if account_identity.trim().is_empty() {
            return Err(TierVaultError::InvalidInput(
                "account identity must not be empty".into(),
            ));
        }
        if self.account_identity.as_deref() != Some(account_identity) {
            if self.session.is_some() {
                self.lock();
            }
            self.account_identity = Some(account_identity.to_string());
        }
        Ok(())
    }

    pub fn account_identity(&self) -> Option<&str> {
        self.account_identity.as_deref()
    }

    pub fn state(&self) -> VaultState {
        self.state
    }

    /// Name of the configured backing store, for display.
    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Open (or create) the vault for `account_identity`.
    ///
    /// 1. An existing mirror copy is opened and the master secret is
    ///    verified against it.
    /// 2. With no mirror copy, the account's blobs are restored from the
    ///    backing store.
    /// 3. Otherwise a new, empty vault is created.
    ///
    /// A wrong master secret fails with `Authentication` and leaves the
    /// manager `Locked`.
    pub async fn unlock(
        &mut self,
        account_identity: &str,
        master_secret: &str,
    ) -> Result<UnlockReport> {
        if master_secret.is_empty() {
            return Err(TierVaultError::InvalidInput(
                "master secret must not be empty".into(),
            ));
        }
        self.set_account_identity(account_identity)?;
        self.lock();

        let identity = account_identity.to_string();
        let master = Zeroizing::new(master_secret.to_string());
        self.state = VaultState::Unlocking;

        match self.open_or_create(&identity, &master).await {
            Ok((vault, report)) => {
                info!(
                    account = %identity,
                    records = vault.records.len(),
                    created = report.created,
                    restored = report.restored,
                    "vault unlocked"
                );
                self.session = Some(Session {
                    master,
                    identity,
                    vault,
                });
                self.state = VaultState::Unlocked;
                Ok(report)
            }
            Err(e) => {
                warn!(account = %identity, error = %e, "unlock failed");
                self.state = VaultState::Locked;
                Err(e)
            }
        }
    }

    /// Drop the session and the master secret with it.
    pub fn lock(&mut self) {
        if self.session.take().is_some() {
            debug!("vault locked");
        }
        self.state = VaultState::Locked;
    }

    async fn open_or_create(&self, identity: &str, master: &str) -> Result<(Vault, UnlockReport)> {
        let sealer = Sealer {
            master: master.as_bytes(),
            identity,
            kdf: &self.options.kdf,
        };

        if let Some(vault) = self.mirror.load(identity)? {
            sealer.verify_master(&vault)?;
            return Ok((vault, UnlockReport::default()));
        }

        let mut report = UnlockReport::default();
        match self.restore_from_remote(&sealer, &mut report.warnings).await {
            Ok(Some(vault)) => {
                self.mirror.save(&vault)?;
                report.restored = vault.records.len();
                return Ok((vault, report));
            }
            Ok(None) => {}
            Err(e) if e.kind() == ErrorKind::RemoteUnavailable => {
                warn!(error = %e, "could not check backing store for an existing vault");
                report.warnings.push(VaultWarning::RemoteUnavailable {
                    record_id: None,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }

        let now = Utc::now();
        let mut vault = Vault::new(identity, now);
        vault.metadata.key_check = Some(sealer.seal_key_check()?);
        if self.options.seed_new_vaults {
            let draft = welcome_draft();
            let tier = self.options.classifier.classify(&draft);
            let record = Record::from_draft(Uuid::new_v4().to_string(), draft, tier, now);
            vault.records.push(sealer.seal(&record)?);
            vault.touch(now);
        }
        self.mirror.save(&vault)?;
        report.created = true;
        Ok((vault, report))
    }

    /// Rebuild a vault from the account's blobs, or `None` if there are none.
    /// Listed blobs the store no longer has are skipped with a warning.
    async fn restore_from_remote(
        &self,
        sealer: &Sealer<'_>,
        warnings: &mut Vec<VaultWarning>,
    ) -> Result<Option<Vault>> {
        let store = self.store.as_ref();
        let retry = &self.options.retry;
        let prefix = StorageKey::account_prefix(sealer.identity);

        let refs = with_retries(retry, "list", || store.list(&prefix)).await?;
        if refs.is_empty() {
            return Ok(None);
        }

        let now = Utc::now();
        let mut vault = Vault::new(sealer.identity, now);
        for blob_ref in refs {
            let blob = match with_retries(retry, "get", || store.get(&blob_ref)).await {
                Ok(blob) => blob,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(blob = %blob_ref, "listed blob is missing; skipping");
                    warnings.push(VaultWarning::MissingBlob {
                        blob_ref: blob_ref.to_string(),
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };
            let mut stored: StoredRecord = serde_json::from_slice(&blob)
                .map_err(|e| TierVaultError::Format(format!("remote record {blob_ref}: {e}")))?;
            if stored.payload.tier != stored.privacy_tier {
                return Err(TierVaultError::Format(format!(
                    "remote record {blob_ref} payload tier does not match its privacy tier"
                )));
            }
            if vault.find(&stored.id).is_some() {
                continue;
            }
            stored.remote_ref = Some(blob_ref.to_string());
            vault.remote_references.insert(
                stored.id.clone(),
                reference_for(sealer.identity, &stored, now),
            );
            vault.records.push(stored);
        }
        if vault.records.is_empty() {
            return Ok(None);
        }
        vault.records.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        sealer.verify_master(&vault)?;
        vault.metadata.key_check = Some(sealer.seal_key_check()?);
        vault.touch(now);
        info!(records = vault.records.len(), "restored vault from backing store");
        Ok(Some(vault))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn record_count(&self) -> Result<usize> {
        Ok(unlocked(self.state, &self.session)?.vault.records.len())
    }

    pub fn remote_references(&self) -> Result<&BTreeMap<String, RemoteReference>> {
        Ok(&unlocked(self.state, &self.session)?.vault.remote_references)
    }

    /// Metadata of every record, in insertion order.  Nothing is decrypted.
    pub fn list(&self) -> Result<Vec<RecordSummary>> {
        let session = unlocked(self.state, &self.session)?;
        Ok(session.vault.records.iter().map(StoredRecord::summary).collect())
    }

    /// Mint a fresh access proof for one record.
    pub fn issue_proof(&self, id: &str) -> Result<AccessProof> {
        let session = unlocked(self.state, &self.session)?;
        let sealer = session.sealer(&self.options.kdf);
        let stored = find(&session.vault, id)?;

        let record = sealer.open_owned(stored)?;
        let proof = proof::issue(&record, sealer.master, sealer.identity)?;
        debug!(record = %id, "issued access proof");
        Ok(proof)
    }

    /// Decrypt one record.  `secret` records need a valid proof for this
    /// account and record, minted over its current value, otherwise
    /// `AccessDenied`.
    pub fn get(&self, id: &str, proof: Option<&AccessProof>) -> Result<Record> {
        let session = unlocked(self.state, &self.session)?;
        let sealer = session.sealer(&self.options.kdf);
        let stored = find(&session.vault, id)?;

        if stored.privacy_tier != Tier::Secret {
            return sealer.open(stored, None);
        }
        let proof = proof.ok_or_else(|| {
            TierVaultError::AccessDenied(format!("record '{id}' is secret; an access proof is required"))
        })?;
        if !sealer.admits(proof, id) {
            return Err(TierVaultError::AccessDenied(format!(
                "access proof for '{id}' is invalid, expired, or not bound to this record"
            )));
        }
        let record = sealer.open(stored, Some(proof))?;
        if !proof.covers_value(&record.secret_value) {
            return Err(TierVaultError::AccessDenied(format!(
                "access proof for '{id}' predates its current value"
            )));
        }
        Ok(record)
    }

    /// Every record in insertion order.  `secret` records without a
    /// matching valid proof come back sealed (metadata only).
    pub fn get_all(&self, proofs: &[AccessProof]) -> Result<Vec<VaultEntry>> {
        let session = unlocked(self.state, &self.session)?;
        let sealer = session.sealer(&self.options.kdf);

        let mut entries = Vec::with_capacity(session.vault.records.len());
        for stored in &session.vault.records {
            if stored.privacy_tier != Tier::Secret {
                entries.push(VaultEntry::Open(sealer.open(stored, None)?));
                continue;
            }
            let proof = proofs
                .iter()
                .find(|p| p.record_id() == Some(stored.id.as_str()) && sealer.admits(p, &stored.id));
            let opened = match proof {
                Some(p) => {
                    Some(sealer.open(stored, Some(p))?).filter(|r| p.covers_value(&r.secret_value))
                }
                None => None,
            };
            match opened {
                Some(record) => entries.push(VaultEntry::Open(record)),
                None => entries.push(VaultEntry::Sealed(stored.summary())),
            }
        }
        Ok(entries)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Classify, seal and store a new record.
    pub async fn add(&mut self, draft: RecordDraft) -> Result<WriteOutcome> {
        validate_draft(&draft)?;
        let tier = self.options.classifier.classify(&draft);
        let session = unlocked_mut(self.state, &mut self.session)?;
        let Session {
            master,
            identity,
            vault,
        } = session;
        let identity = identity.as_str();
        let sealer = Sealer {
            master: master.as_bytes(),
            identity,
            kdf: &self.options.kdf,
        };

        let id = match draft.id.clone() {
            Some(id) if id.trim().is_empty() => {
                return Err(TierVaultError::InvalidInput("record id must not be empty".into()));
            }
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };
        if vault.find(&id).is_some() {
            return Err(TierVaultError::InvalidInput(format!(
                "record '{id}' already exists"
            )));
        }

        let now = Utc::now();
        let record = Record::from_draft(id.clone(), draft, tier, now);
        vault.records.push(sealer.seal(&record)?);
        vault.touch(now);
        self.mirror.save(vault)?;
        info!(record = %id, %tier, "record added");

        let mut outcome = WriteOutcome::new(&id);
        if tier.requires_remote() {
            let idx = vault.records.len() - 1;
            let remote = Remote::new(self.store.as_ref(), &self.options.retry);
            if remote.push(identity, vault, idx, &mut outcome.warnings).await? {
                self.mirror.save(vault)?;
            }
        }
        Ok(outcome)
    }

    /// Replace a record's content.  The id and `created_at` are kept, the
    /// tier is re-classified, and the remote copy is replaced or removed
    /// to match the new tier.
    pub async fn update(&mut self, id: &str, draft: RecordDraft) -> Result<WriteOutcome> {
        validate_draft(&draft)?;
        if draft.id.as_deref().is_some_and(|new_id| new_id != id) {
            return Err(TierVaultError::InvalidInput(
                "a record's id cannot be changed".into(),
            ));
        }
        let tier = self.options.classifier.classify(&draft);
        let session = unlocked_mut(self.state, &mut self.session)?;
        let Session {
            master,
            identity,
            vault,
        } = session;
        let identity = identity.as_str();
        let sealer = Sealer {
            master: master.as_bytes(),
            identity,
            kdf: &self.options.kdf,
        };

        let pos = vault
            .position(id)
            .ok_or_else(|| TierVaultError::NotFound(format!("record '{id}'")))?;
        let previous = &vault.records[pos];
        let created_at = previous.created_at;
        let old_ref = previous.remote_ref.clone();
        let now = Utc::now().max(previous.updated_at);

        let mut record = Record::from_draft(id.to_string(), draft, tier, now);
        record.created_at = created_at;
        vault.records[pos] = sealer.seal(&record)?;
        vault.remote_references.remove(id);
        vault.touch(now);
        self.mirror.save(vault)?;
        info!(record = %id, %tier, "record updated");

        let mut outcome = WriteOutcome::new(id);
        let remote = Remote::new(self.store.as_ref(), &self.options.retry);
        if tier.requires_remote() && remote.push(identity, vault, pos, &mut outcome.warnings).await? {
            self.mirror.save(vault)?;
        }
        if let Some(old_ref) = old_ref {
            remote.discard(id, &old_ref, &mut outcome.warnings).await;
        }
        Ok(outcome)
    }

    /// Remove a record locally, then best-effort from the backing store.
    pub async fn delete(&mut self, id: &str) -> Result<WriteOutcome> {
        let session = unlocked_mut(self.state, &mut self.session)?;
        let vault = &mut session.vault;

        let pos = vault
            .position(id)
            .ok_or_else(|| TierVaultError::NotFound(format!("record '{id}'")))?;
        let removed = vault.records.remove(pos);
        vault.remote_references.remove(id);
        vault.touch(Utc::now());
        self.mirror.save(vault)?;
        info!(record = %id, "record deleted");

        let mut outcome = WriteOutcome::new(id);
        if let Some(blob_ref) = removed.remote_ref {
            Remote::new(self.store.as_ref(), &self.options.retry)
                .discard(id, &blob_ref, &mut outcome.warnings)
                .await;
        }
        Ok(outcome)
    }

    /// Push every `secret` record that has no remote reference yet.
    /// Stops at the first store failure.
    pub async fn backfill_remote(&mut self) -> Result<BackfillReport> {
        let session = unlocked_mut(self.state, &mut self.session)?;
        let Session {
            identity, vault, ..
        } = session;
        let identity = identity.as_str();
        let remote = Remote::new(self.store.as_ref(), &self.options.retry);

        let mut report = BackfillReport::default();
        for idx in 0..vault.records.len() {
            let record = &vault.records[idx];
            if !record.privacy_tier.requires_remote()
                || vault.remote_references.contains_key(&record.id)
            {
                continue;
            }
            if remote.push(identity, vault, idx, &mut report.warnings).await? {
                report.pushed += 1;
            } else {
                break;
            }
        }
        if report.pushed > 0 {
            self.mirror.save(vault)?;
        }
        info!(pushed = report.pushed, "remote backfill finished");
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Export / import
    // ------------------------------------------------------------------

    /// Serialize the whole vault.  Sensitive fields of non-public records
    /// are sealed under the export key.
    pub fn export(&self) -> Result<String> {
        let session = unlocked(self.state, &self.session)?;
        let sealer = session.sealer(&self.options.kdf);
        let vault = &session.vault;

        let mut records = Vec::with_capacity(vault.records.len());
        for stored in &vault.records {
            let record = sealer.open_owned(stored)?;
            let sealed = if record.privacy_tier.is_encrypted() {
                Some(sealer.seal_export(&record)?)
            } else {
                None
            };
            records.push(ExportedRecord::new(&record, sealed));
        }

        let mut metadata = vault.metadata.clone();
        metadata.key_check = None;
        let file = ExportFile {
            version: EXPORT_VERSION,
            exported_at: Utc::now(),
            vault: ExportedVault {
                id: vault.id.clone(),
                account_identity: vault.account_identity.clone(),
                records,
                remote_references: vault.remote_references.clone(),
                metadata,
            },
            encryption_info: EncryptionInfo::default(),
        };
        info!(records = file.vault.records.len(), "vault exported");
        file.to_json()
    }

    /// Replace the current vault with the content of an export.
    ///
    /// The export is fully parsed and decrypted before anything changes,
    /// so a bad file or a wrong master secret leaves the vault untouched.
    /// Records keep their ids and timestamps and are re-classified.
    pub async fn import(&mut self, json: &str) -> Result<ImportReport> {
        let file = ExportFile::parse(json)?;
        let session = unlocked_mut(self.state, &mut self.session)?;
        let Session {
            master,
            identity,
            vault,
        } = session;
        let identity = identity.as_str();
        let sealer = Sealer {
            master: master.as_bytes(),
            identity,
            kdf: &self.options.kdf,
        };

        if file.vault.account_identity != identity {
            return Err(TierVaultError::AccessDenied(format!(
                "export belongs to account '{}'",
                file.vault.account_identity
            )));
        }

        let now = Utc::now();
        let mut fresh = Vault::new(identity, now);
        fresh.metadata.key_check = Some(sealer.seal_key_check()?);
        for mut exported in file.vault.records {
            let values = match exported.encrypted_data.take() {
                Some(payload) => Some(sealer.open_export(&payload)?),
                None => None,
            };
            let mut record = exported.into_record(values);
            record.privacy_tier = self.options.classifier.classify(&record.to_draft());
            fresh.records.push(sealer.seal(&record)?);
        }
        fresh.touch(now);

        let stale: Vec<(String, String)> = vault
            .records
            .iter()
            .filter_map(|r| r.remote_ref.clone().map(|blob| (r.id.clone(), blob)))
            .collect();
        *vault = fresh;
        self.mirror.save(vault)?;

        let mut report = ImportReport {
            imported: vault.records.len(),
            ..ImportReport::default()
        };
        info!(records = report.imported, "vault imported");

        let remote = Remote::new(self.store.as_ref(), &self.options.retry);
        for idx in 0..vault.records.len() {
            if !vault.records[idx].privacy_tier.requires_remote() {
                continue;
            }
            if remote.push(identity, vault, idx, &mut report.warnings).await? {
                report.pushed += 1;
            } else {
                break;
            }
        }
        if report.pushed > 0 {
            self.mirror.save(vault)?;
        }
        if report.warnings.is_empty() {
            for (record_id, blob_ref) in &stale {
                if !remote.discard(record_id, blob_ref, &mut report.warnings).await {
                    break;
                }
            }
        }
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------

    /// Clear the local mirror for the unlocked account and lock.
    pub fn reset(&mut self, confirmed: bool) -> Result<()> {
        require_confirmation(confirmed)?;
        let identity = unlocked(self.state, &self.session)?.identity.clone();

        self.state = VaultState::Resetting;
        let cleared = self.mirror.clear(&identity);
        self.lock();
        cleared?;

        warn!(account = %identity, "local vault cleared");
        Ok(())
    }

    /// Delete every blob of the account from the backing store, then clear
    /// the local mirror and lock.
    ///
    /// Does not need the vault to be unlocked, so an account whose master
    /// secret is lost can still be wiped.
    pub async fn force_reset(&mut self, confirmed: bool) -> Result<ResetReport> {
        require_confirmation(confirmed)?;
        let identity = self.account_identity.clone().ok_or_else(|| {
            TierVaultError::Precondition("no account identity set".into())
        })?;

        self.state = VaultState::Resetting;
        self.session = None;

        let mut report = ResetReport::default();
        let store = self.store.as_ref();
        let retry = &self.options.retry;
        let prefix = StorageKey::account_prefix(&identity);
        match with_retries(retry, "list", || store.list(&prefix)).await {
            Ok(refs) => {
                for blob_ref in refs {
                    match with_retries(retry, "delete", || store.delete(&blob_ref)).await {
                        Ok(()) => report.remote_deleted += 1,
                        Err(e) => {
                            report.warnings.push(unavailable(None, &e));
                            break;
                        }
                    }
                }
            }
            Err(e) => report.warnings.push(unavailable(None, &e)),
        }

        let cleared = self.mirror.clear(&identity);
        self.lock();
        cleared?;

        warn!(
            account = %identity,
            remote_deleted = report.remote_deleted,
            "vault destroyed"
        );
        Ok(report)
    }
}

// ----------------------------------------------------------------------
// Sealing
// ----------------------------------------------------------------------

/// Seals and opens payloads for one account and master secret.
#[derive(Clone, Copy)]
struct Sealer<'a> {
    master: &'a [u8],
    identity: &'a str,
    kdf: &'a Argon2Params,
}

impl Sealer<'_> {
    fn key(&self, purpose: KeyPurpose, salt: &[u8]) -> Result<TierKey> {
        match purpose {
            KeyPurpose::Tier(tier) => {
                crypto::derive_key(self.master, self.identity, salt, tier, self.kdf)
            }
            _ => crypto::derive_purpose_key(self.master, self.identity, salt, purpose, self.kdf),
        }
    }

    fn seal(&self, record: &Record) -> Result<StoredRecord> {
        let tier = record.privacy_tier;
        let key = self.key(KeyPurpose::Tier(tier), &crypto::generate_salt())?;
        let plaintext = Zeroizing::new(record.sealed_fields().to_bytes()?);
        let payload = crypto::encrypt(&plaintext, tier, &key)?;

        let proof_hash = if tier == Tier::Secret {
            Some(proof::issue(record, self.master, self.identity)?.to_hash())
        } else {
            None
        };

        Ok(StoredRecord {
            id: record.id.clone(),
            title: record.title.clone(),
            category: record.category.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            privacy_tier: tier,
            payload,
            proof_hash,
            remote_ref: None,
        })
    }

    fn open(&self, stored: &StoredRecord, proof: Option<&AccessProof>) -> Result<Record> {
        let tier = stored.privacy_tier;
        let key = self.key(KeyPurpose::Tier(tier), &stored.payload.salt)?;
        let plaintext = Zeroizing::new(crypto::decrypt(&stored.payload, tier, &key, proof)?);
        let fields = SealedFields::from_bytes(&plaintext)?;
        Ok(Record::from_stored(stored, fields))
    }

    /// Open any record of this account, minting a possession proof for
    /// `secret` payloads.
    fn open_owned(&self, stored: &StoredRecord) -> Result<Record> {
        if stored.privacy_tier == Tier::Secret {
            let possession = proof::issue_possession(&stored.id, self.master, self.identity)?;
            self.open(stored, Some(&possession))
        } else {
            self.open(stored, None)
        }
    }

    /// Whether `proof` is valid, unexpired, and minted by this account's
    /// master secret for `record_id`.
    fn admits(&self, proof: &AccessProof, record_id: &str) -> bool {
        if !proof::verify(proof) || !proof.binds(self.identity, record_id) {
            return false;
        }
        proof::verification_key_for(self.master, self.identity, record_id)
            .map(|expected| proof::verification_key_matches(proof, &expected))
            .unwrap_or(false)
    }

    fn seal_key_check(&self) -> Result<EncryptedPayload> {
        let key = self.key(KeyPurpose::KeyCheck, &crypto::generate_salt())?;
        crypto::encrypt(KEY_CHECK_PLAINTEXT, Tier::Private, &key)
    }

    /// Check the master secret against the vault's key-check verifier or,
    /// for vaults without one, against the first non-public record.
    fn verify_master(&self, vault: &Vault) -> Result<()> {
        let (payload, purpose) = match &vault.metadata.key_check {
            Some(check) => (check, KeyPurpose::KeyCheck),
            None => match vault.records.iter().find(|r| r.privacy_tier.is_encrypted()) {
                Some(r) => (&r.payload, KeyPurpose::Tier(r.privacy_tier)),
                None => return Ok(()),
            },
        };
        let key = self.key(purpose, &payload.salt)?;
        crypto::authenticate(payload, &key).map_err(|_| TierVaultError::Authentication)
    }

    fn seal_export(&self, record: &Record) -> Result<EncryptedPayload> {
        let key = self.key(KeyPurpose::Export, &crypto::generate_salt())?;
        let plaintext = Zeroizing::new(SensitiveValues::of(record).to_bytes()?);
        crypto::encrypt(&plaintext, Tier::Private, &key)
    }

    fn open_export(&self, payload: &EncryptedPayload) -> Result<SensitiveValues> {
        let key = self.key(KeyPurpose::Export, &payload.salt)?;
        let plaintext = Zeroizing::new(
            crypto::decrypt(payload, Tier::Private, &key, None)
                .map_err(|_| TierVaultError::Authentication)?,
        );
        SensitiveValues::from_bytes(&plaintext)
    }
}

// ----------------------------------------------------------------------
// Backing store helpers
// ----------------------------------------------------------------------

#[derive(Clone, Copy)]
struct Remote<'a> {
    store: &'a dyn ContentStore,
    retry: &'a RetryPolicy,
}

impl<'a> Remote<'a> {
    fn new(store: &'a dyn ContentStore, retry: &'a RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Push `vault.records[idx]` and record its reference.
    ///
    /// Returns `false` (with a warning) when the store is unreachable;
    /// the caller must persist the vault when it returns `true`.
    async fn push(
        &self,
        identity: &str,
        vault: &mut Vault,
        idx: usize,
        warnings: &mut Vec<VaultWarning>,
    ) -> Result<bool> {
        let store = self.store;
        let stored = &vault.records[idx];
        let key = StorageKey::new(identity, &stored.id);
        let blob = remote_blob(stored)?;

        match with_retries(self.retry, "put", || store.put(&key, &blob)).await {
            Ok(blob_ref) => {
                let now = Utc::now();
                let stored = &mut vault.records[idx];
                stored.remote_ref = Some(blob_ref.to_string());
                let reference = reference_for(identity, stored, now);
                let id = stored.id.clone();
                debug!(record = %id, blob = %blob_ref, "record pushed to backing store");
                vault.remote_references.insert(id, reference);
                Ok(true)
            }
            Err(e) => {
                warn!(record = %stored.id, error = %e, "backing store unavailable; record kept locally");
                warnings.push(unavailable(Some(&stored.id), &e));
                Ok(false)
            }
        }
    }

    /// Best-effort delete of a blob.  Returns whether it succeeded.
    async fn discard(
        &self,
        record_id: &str,
        blob_ref: &str,
        warnings: &mut Vec<VaultWarning>,
    ) -> bool {
        let Ok(blob_ref) = BlobRef::parse(blob_ref) else {
            warn!(record = %record_id, "skipping malformed remote reference");
            return true;
        };
        let store = self.store;
        match with_retries(self.retry, "delete", || store.delete(&blob_ref)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(record = %record_id, error = %e, "could not delete remote blob");
                warnings.push(unavailable(Some(record_id), &e));
                false
            }
        }
    }
}

/// The blob pushed for a record: its stored form without the reference
/// that only exists once the push succeeded.
fn remote_blob(stored: &StoredRecord) -> Result<Vec<u8>> {
    let mut copy = stored.clone();
    copy.remote_ref = None;
    serde_json::to_vec(&copy)
        .map_err(|e| TierVaultError::Serialization(format!("remote record: {e}")))
}

fn reference_for(
    identity: &str,
    stored: &StoredRecord,
    now: chrono::DateTime<Utc>,
) -> RemoteReference {
    RemoteReference {
        storage_key: StorageKey::new(identity, &stored.id).to_string(),
        proof_hash: stored
            .proof_hash
            .as_ref()
            .map(|p| p.token.clone())
            .unwrap_or_default(),
        stored_at: now,
    }
}

fn unavailable(record_id: Option<&str>, e: &TierVaultError) -> VaultWarning {
    VaultWarning::RemoteUnavailable {
        record_id: record_id.map(str::to_string),
        reason: e.to_string(),
    }
}

// ----------------------------------------------------------------------
// Small helpers
// ----------------------------------------------------------------------

fn unlocked(state: VaultState, session: &Option<Session>) -> Result<&Session> {
    match (state, session) {
        (VaultState::Unlocked, Some(s)) => Ok(s),
        _ => Err(locked(state)),
    }
}

fn unlocked_mut(state: VaultState, session: &mut Option<Session>) -> Result<&mut Session> {
    match (state, session) {
        (VaultState::Unlocked, Some(s)) => Ok(s),
        _ => Err(locked(state)),
    }
}

fn locked(state: VaultState) -> TierVaultError {
    TierVaultError::Precondition(format!("vault is {state}; unlock it first"))
}

fn find<'v>(vault: &'v Vault, id: &str) -> Result<&'v StoredRecord> {
    vault
        .find(id)
        .ok_or_else(|| TierVaultError::NotFound(format!("record '{id}'")))
}

fn validate_draft(draft: &RecordDraft) -> Result<()> {
    if draft.title.trim().is_empty() {
        return Err(TierVaultError::InvalidInput(
            "record title must not be empty".into(),
        ));
    }
    Ok(())
}

fn require_confirmation(confirmed: bool) -> Result<()> {
    if confirmed {
        Ok(())
    } else {
        Err(TierVaultError::Precondition(
            "reset must be explicitly confirmed".into(),
        ))
    }
}

fn welcome_draft() -> RecordDraft {
    RecordDraft {
        title: "Welcome to TierVault".into(),
        notes: "Each record is filed into a privacy tier from its title, notes and category.".into(),
        category: "Other".into(),
        ..RecordDraft::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::vault::MemoryMirror;

    fn manager() -> VaultManager {
        VaultManager::new(
            Box::new(MemoryMirror::new()),
            Box::new(MemoryStore::new()),
            VaultOptions {
                kdf: Argon2Params::minimum(),
                retry: RetryPolicy::once(),
                ..VaultOptions::default()
            },
        )
    }

    fn draft(title: &str, category: &str) -> RecordDraft {
        RecordDraft {
            title: title.into(),
            username: "me".into(),
            secret_value: "hunter2".into(),
            category: category.into(),
            ..RecordDraft::default()
        }
    }

    #[tokio::test]
    async fn operations_require_unlock() {
        let mut m = manager();
        let err = m.add(draft("Mail", "Work")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(m.list().is_err());
        assert_eq!(m.state(), VaultState::Locked);
    }

    #[tokio::test]
    async fn empty_title_is_rejected() {
        let mut m = manager();
        m.unlock("acct", "pw").await.unwrap();
        let err = m.add(draft("  ", "Work")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let mut m = manager();
        m.unlock("acct", "pw").await.unwrap();
        let mut d = draft("Mail", "Work");
        d.id = Some("fixed".into());
        m.add(d.clone()).await.unwrap();
        assert!(m.add(d).await.is_err());
        assert_eq!(m.record_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn update_cannot_change_id() {
        let mut m = manager();
        m.unlock("acct", "pw").await.unwrap();
        let id = m.add(draft("Mail", "Work")).await.unwrap().record_id;
        let mut d = draft("Mail", "Work");
        d.id = Some("other".into());
        assert!(m.update(&id, d).await.is_err());
    }

    #[tokio::test]
    async fn seeded_vault_gets_a_welcome_record() {
        let mut m = VaultManager::new(
            Box::new(MemoryMirror::new()),
            Box::new(MemoryStore::new()),
            VaultOptions {
                kdf: Argon2Params::minimum(),
                seed_new_vaults: true,
                ..VaultOptions::default()
            },
        );
        let report = m.unlock("acct", "pw").await.unwrap();
        assert!(report.created);
        let list = m.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].privacy_tier, Tier::Public);
    }

    #[tokio::test]
    async fn switching_account_locks() {
        let mut m = manager();
        m.unlock("acct", "pw").await.unwrap();
        m.set_account_identity("other").unwrap();
        assert_eq!(m.state(), VaultState::Locked);
        assert_eq!(m.account_identity(), Some("other"));
    }

    #[tokio::test]
    async fn reset_requires_confirmation() {
        let mut m = manager();
        m.unlock("acct", "pw").await.unwrap();
        let err = m.reset(false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert_eq!(m.state(), VaultState::Unlocked);
    }
}
