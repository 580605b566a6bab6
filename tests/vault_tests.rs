//! End-to-end tests for `VaultManager` against in-memory collaborators.

use std::sync::Arc;

use tiervault::crypto::Argon2Params;
use tiervault::errors::ErrorKind;
use tiervault::store::{MemoryStore, RetryPolicy};
use tiervault::vault::{
    LocalMirror, MemoryMirror, RecordDraft, Tier, VaultEntry, VaultManager, VaultOptions,
    VaultState,
};

const ACCOUNT: &str = "0xA11CE";
const MASTER: &str = "correct horse battery staple";

/// A manager over shared collaborators, so several sessions can see the
/// same mirror and store.
fn manager_with(mirror: &Arc<MemoryMirror>, store: &Arc<MemoryStore>) -> VaultManager {
    VaultManager::new(
        Box::new(Arc::clone(mirror)),
        Box::new(Arc::clone(store)),
        VaultOptions {
            kdf: Argon2Params::minimum(),
            retry: RetryPolicy::once(),
            ..VaultOptions::default()
        },
    )
}

fn fresh() -> (Arc<MemoryMirror>, Arc<MemoryStore>, VaultManager) {
    let mirror = Arc::new(MemoryMirror::new());
    let store = Arc::new(MemoryStore::new());
    let manager = manager_with(&mirror, &store);
    (mirror, store, manager)
}

fn draft(title: &str, category: &str, value: &str) -> RecordDraft {
    RecordDraft {
        title: title.into(),
        username: "alice".into(),
        secret_value: value.into(),
        url: "https://example.com".into(),
        notes: String::new(),
        category: category.into(),
        ..RecordDraft::default()
    }
}

#[tokio::test]
async fn first_unlock_creates_empty_vault() {
    let (_, _, mut m) = fresh();
    assert_eq!(m.state(), VaultState::Locked);

    let report = m.unlock(ACCOUNT, MASTER).await.unwrap();
    assert!(report.created);
    assert!(report.warnings.is_empty());
    assert_eq!(m.state(), VaultState::Unlocked);
    assert_eq!(m.record_count().unwrap(), 0);
    assert_eq!(m.account_identity(), Some(ACCOUNT));
}

#[tokio::test]
async fn classification_picks_the_tier() {
    let (_, _, mut m) = fresh();
    m.unlock(ACCOUNT, MASTER).await.unwrap();

    let public = m.add(draft("Forum", "Hobby", "pw1")).await.unwrap().record_id;
    let private = m.add(draft("Utility account", "Personal", "pw2")).await.unwrap().record_id;
    let secret = m.add(draft("Bank", "Banking", "pw3")).await.unwrap().record_id;

    let tiers: Vec<(String, Tier)> = m
        .list()
        .unwrap()
        .into_iter()
        .map(|s| (s.id, s.privacy_tier))
        .collect();
    assert_eq!(
        tiers,
        vec![
            (public, Tier::Public),
            (private, Tier::Private),
            (secret, Tier::Secret),
        ]
    );
}

#[tokio::test]
async fn secret_record_needs_a_proof() {
    let (_, _, mut m) = fresh();
    m.unlock(ACCOUNT, MASTER).await.unwrap();

    let id = m.add(draft("Bank", "Banking", "s3cr3t!")).await.unwrap().record_id;

    let err = m.get(&id, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);

    let proof = m.issue_proof(&id).unwrap();
    let record = m.get(&id, Some(&proof)).unwrap();
    assert_eq!(record.title, "Bank");
    assert_eq!(record.secret_value, "s3cr3t!");
    assert_eq!(record.username, "alice");
    assert_eq!(record.privacy_tier, Tier::Secret);
}

#[tokio::test]
async fn proof_for_another_record_is_denied() {
    let (_, _, mut m) = fresh();
    m.unlock(ACCOUNT, MASTER).await.unwrap();

    let a = m.add(draft("Bank", "Banking", "one")).await.unwrap().record_id;
    let b = m.add(draft("Seed phrase", "Crypto", "two")).await.unwrap().record_id;

    let proof_a = m.issue_proof(&a).unwrap();
    let err = m.get(&b, Some(&proof_a)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);
}

#[tokio::test]
async fn get_all_is_stable_and_seals_unproven_secrets() {
    let (_, _, mut m) = fresh();
    m.unlock(ACCOUNT, MASTER).await.unwrap();

    m.add(draft("Forum", "Hobby", "a")).await.unwrap();
    let secret = m.add(draft("Bank", "Banking", "b")).await.unwrap().record_id;
    m.add(draft("Gym", "Personal", "c")).await.unwrap();

    let first = m.get_all(&[]).unwrap();
    let second = m.get_all(&[]).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    assert!(matches!(&first[1], VaultEntry::Sealed(s) if s.id == secret));

    let proof = m.issue_proof(&secret).unwrap();
    let opened = m.get_all(&[proof]).unwrap();
    assert!(matches!(&opened[1], VaultEntry::Open(r) if r.secret_value == "b"));
    let ids: Vec<&str> = opened.iter().map(VaultEntry::id).collect();
    let expected: Vec<&str> = first.iter().map(VaultEntry::id).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn secret_records_go_to_the_store() {
    let (_, store, mut m) = fresh();
    m.unlock(ACCOUNT, MASTER).await.unwrap();

    let public = m.add(draft("Forum", "Hobby", "a")).await.unwrap();
    let secret = m.add(draft("Bank", "Banking", "b")).await.unwrap();
    assert!(!public.is_degraded());
    assert!(!secret.is_degraded());

    let refs = m.remote_references().unwrap();
    assert_eq!(refs.len(), 1);
    let reference = &refs[&secret.record_id];
    assert_eq!(
        reference.storage_key,
        format!("{ACCOUNT}:{}", secret.record_id)
    );
    assert_eq!(store.blob_count(), 1);
}

#[tokio::test]
async fn degraded_add_keeps_local_write() {
    let (_, store, mut m) = fresh();
    m.unlock(ACCOUNT, MASTER).await.unwrap();
    store.set_offline(true);

    let outcome = m.add(draft("Bank", "Banking", "pin")).await.unwrap();
    assert!(outcome.is_degraded());
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(m.record_count().unwrap(), 1);
    assert!(!m.remote_references().unwrap().contains_key(&outcome.record_id));
    assert_eq!(store.put_attempts(), 1);

    // Reads keep working from the mirror.
    let proof = m.issue_proof(&outcome.record_id).unwrap();
    assert_eq!(m.get(&outcome.record_id, Some(&proof)).unwrap().secret_value, "pin");

    store.set_offline(false);
    let report = m.backfill_remote().await.unwrap();
    assert_eq!(report.pushed, 1);
    assert!(report.warnings.is_empty());
    assert!(m.remote_references().unwrap().contains_key(&outcome.record_id));
}

#[tokio::test]
async fn wrong_master_secret_is_rejected() {
    let (mirror, store, mut m) = fresh();
    m.unlock(ACCOUNT, MASTER).await.unwrap();
    m.add(draft("Gym", "Personal", "x")).await.unwrap();
    m.lock();
    assert_eq!(m.state(), VaultState::Locked);

    let mut other = manager_with(&mirror, &store);
    let err = other.unlock(ACCOUNT, "not the secret").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(other.state(), VaultState::Locked);
    assert!(other.list().is_err());

    let report = other.unlock(ACCOUNT, MASTER).await.unwrap();
    assert!(!report.created);
    assert_eq!(other.record_count().unwrap(), 1);
}

#[tokio::test]
async fn wrong_master_secret_is_rejected_on_empty_vault() {
    let (mirror, store, mut m) = fresh();
    m.unlock(ACCOUNT, MASTER).await.unwrap();
    m.lock();

    let mut other = manager_with(&mirror, &store);
    let err = other.unlock(ACCOUNT, "guess").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

#[tokio::test]
async fn proof_does_not_survive_a_value_change() {
    let (_, _, mut m) = fresh();
    m.unlock(ACCOUNT, MASTER).await.unwrap();

    let id = m.add(draft("Bank", "Banking", "old pin")).await.unwrap().record_id;
    let stale = m.issue_proof(&id).unwrap();
    m.update(&id, draft("Bank", "Banking", "new pin")).await.unwrap();

    let err = m.get(&id, Some(&stale)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);
    assert!(matches!(
        &m.get_all(std::slice::from_ref(&stale)).unwrap()[0],
        VaultEntry::Sealed(_)
    ));

    let fresh_proof = m.issue_proof(&id).unwrap();
    assert_eq!(m.get(&id, Some(&fresh_proof)).unwrap().secret_value, "new pin");
}

#[tokio::test]
async fn update_reclassifies_and_keeps_identity() {
    let (_, store, mut m) = fresh();
    m.unlock(ACCOUNT, MASTER).await.unwrap();

    let id = m.add(draft("Bank", "Banking", "old")).await.unwrap().record_id;
    let before = m.get(&id, Some(&m.issue_proof(&id).unwrap())).unwrap();
    assert_eq!(store.blob_count(), 1);

    // Editing the url alone keeps the tier.
    let mut edit = draft("Bank", "Banking", "old");
    edit.url = "https://bank.example".into();
    m.update(&id, edit).await.unwrap();
    let proof = m.issue_proof(&id).unwrap();
    let after_url = m.get(&id, Some(&proof)).unwrap();
    assert_eq!(after_url.privacy_tier, Tier::Secret);
    assert_eq!(after_url.url, "https://bank.example");
    assert_eq!(after_url.created_at, before.created_at);
    assert!(after_url.updated_at >= before.updated_at);

    // Dropping the keyword moves it down and out of the store.
    m.update(&id, draft("Library card", "Hobby", "new")).await.unwrap();
    let downgraded = m.get(&id, None).unwrap();
    assert_eq!(downgraded.id, id);
    assert_eq!(downgraded.privacy_tier, Tier::Public);
    assert_eq!(downgraded.secret_value, "new");
    assert!(m.remote_references().unwrap().is_empty());
    assert_eq!(store.blob_count(), 0);
}

#[tokio::test]
async fn delete_removes_local_and_remote() {
    let (_, store, mut m) = fresh();
    m.unlock(ACCOUNT, MASTER).await.unwrap();

    let id = m.add(draft("Bank", "Banking", "x")).await.unwrap().record_id;
    m.add(draft("Forum", "Hobby", "y")).await.unwrap();

    let outcome = m.delete(&id).await.unwrap();
    assert!(!outcome.is_degraded());
    assert_eq!(m.record_count().unwrap(), 1);
    assert!(m.remote_references().unwrap().is_empty());
    assert_eq!(store.blob_count(), 0);

    let err = m.get(&id, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(m.delete(&id).await.unwrap_err().kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn delete_succeeds_while_store_is_down() {
    let (_, store, mut m) = fresh();
    m.unlock(ACCOUNT, MASTER).await.unwrap();
    let id = m.add(draft("Bank", "Banking", "x")).await.unwrap().record_id;

    store.set_offline(true);
    let outcome = m.delete(&id).await.unwrap();
    assert!(outcome.is_degraded());
    assert_eq!(m.record_count().unwrap(), 0);
    assert!(m.remote_references().unwrap().is_empty());
}

#[tokio::test]
async fn export_import_roundtrip() {
    let (_, _, mut m) = fresh();
    m.unlock(ACCOUNT, MASTER).await.unwrap();

    let public = m.add(draft("Forum", "Hobby", "pub-value")).await.unwrap().record_id;
    let private = m.add(draft("Gym", "Personal", "priv-value")).await.unwrap().record_id;
    let secret = m.add(draft("Bank", "Banking", "secret-value")).await.unwrap().record_id;

    let json = m.export().unwrap();
    assert!(json.contains("[ENCRYPTED]"));
    assert!(json.contains("pub-value"));
    assert!(!json.contains("priv-value"));
    assert!(!json.contains("secret-value"));

    // Fresh vault, same account and master secret.
    let (_, _, mut fresh_vault) = fresh();
    fresh_vault.unlock(ACCOUNT, MASTER).await.unwrap();
    let report = fresh_vault.import(&json).await.unwrap();
    assert_eq!(report.imported, 3);
    assert_eq!(report.pushed, 1);
    assert_eq!(fresh_vault.record_count().unwrap(), 3);

    let original = m.list().unwrap();
    let imported = fresh_vault.list().unwrap();
    assert_eq!(original, imported);

    assert_eq!(fresh_vault.get(&public, None).unwrap().secret_value, "pub-value");
    assert_eq!(fresh_vault.get(&private, None).unwrap().secret_value, "priv-value");
    let proof = fresh_vault.issue_proof(&secret).unwrap();
    assert_eq!(
        fresh_vault.get(&secret, Some(&proof)).unwrap().secret_value,
        "secret-value"
    );
}

#[tokio::test]
async fn import_with_wrong_master_secret_fails() {
    let (_, _, mut m) = fresh();
    m.unlock(ACCOUNT, MASTER).await.unwrap();
    m.add(draft("Bank", "Banking", "secret-value")).await.unwrap();
    let json = m.export().unwrap();

    let (_, _, mut other) = fresh();
    other.unlock(ACCOUNT, "a different secret").await.unwrap();
    let err = other.import(&json).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(other.record_count().unwrap(), 0);
}

#[tokio::test]
async fn import_for_another_account_is_denied() {
    let (_, _, mut m) = fresh();
    m.unlock(ACCOUNT, MASTER).await.unwrap();
    m.add(draft("Forum", "Hobby", "x")).await.unwrap();
    let json = m.export().unwrap();

    let (_, _, mut other) = fresh();
    other.unlock("0xB0B", MASTER).await.unwrap();
    let err = other.import(&json).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);
}

#[tokio::test]
async fn malformed_import_is_a_format_error() {
    let (_, _, mut m) = fresh();
    m.unlock(ACCOUNT, MASTER).await.unwrap();

    for bad in ["", "{}", "not json", r#"{"version":1}"#] {
        let err = m.import(bad).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format, "input {bad:?}");
    }
}

#[tokio::test]
async fn empty_mirror_restores_from_store() {
    let store = Arc::new(MemoryStore::new());
    let first_mirror = Arc::new(MemoryMirror::new());
    let mut m = manager_with(&first_mirror, &store);
    m.unlock(ACCOUNT, MASTER).await.unwrap();
    let id = m.add(draft("Bank", "Banking", "from-remote")).await.unwrap().record_id;
    m.add(draft("Forum", "Hobby", "local only")).await.unwrap();

    // A new device: empty mirror, same store.
    let second_mirror = Arc::new(MemoryMirror::new());
    let mut restored = manager_with(&second_mirror, &store);
    let report = restored.unlock(ACCOUNT, MASTER).await.unwrap();
    assert!(!report.created);
    assert_eq!(report.restored, 1);

    let proof = restored.issue_proof(&id).unwrap();
    assert_eq!(
        restored.get(&id, Some(&proof)).unwrap().secret_value,
        "from-remote"
    );
    assert!(restored.remote_references().unwrap().contains_key(&id));
    assert!(second_mirror.load(ACCOUNT).unwrap().is_some());

    // The wrong secret cannot restore.
    let mut intruder = manager_with(&Arc::new(MemoryMirror::new()), &store);
    let err = intruder.unlock(ACCOUNT, "guess").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

#[tokio::test]
async fn unlock_with_store_down_creates_local_vault() {
    let (_, store, mut m) = fresh();
    store.set_offline(true);

    let report = m.unlock(ACCOUNT, MASTER).await.unwrap();
    assert!(report.created);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(m.state(), VaultState::Unlocked);
}

#[tokio::test]
async fn accounts_are_isolated() {
    let (mirror, store, mut m) = fresh();
    m.unlock(ACCOUNT, MASTER).await.unwrap();
    m.add(draft("Bank", "Banking", "alice's")).await.unwrap();

    let mut bob = manager_with(&mirror, &store);
    let report = bob.unlock("0xB0B", MASTER).await.unwrap();
    assert!(report.created);
    assert_eq!(bob.record_count().unwrap(), 0);
}

#[tokio::test]
async fn account_whose_identity_prefixes_another_stays_separate() {
    let store = Arc::new(MemoryStore::new());

    let mut work = manager_with(&Arc::new(MemoryMirror::new()), &store);
    work.unlock("alice:work", "pw-work").await.unwrap();
    work.add(draft("Bank", "Banking", "work funds")).await.unwrap();
    assert_eq!(store.blob_count(), 1);

    // A new device for `alice` sees none of `alice:work`'s blobs.
    let mirror = Arc::new(MemoryMirror::new());
    let mut alice = manager_with(&mirror, &store);
    let report = alice.unlock("alice", "pw-alice").await.unwrap();
    assert!(report.created);
    assert_eq!(report.restored, 0);
    assert_eq!(alice.record_count().unwrap(), 0);

    let mut wiper = manager_with(&mirror, &store);
    wiper.set_account_identity("alice").unwrap();
    let report = wiper.force_reset(true).await.unwrap();
    assert_eq!(report.remote_deleted, 0);
    assert_eq!(store.blob_count(), 1);
}

#[tokio::test]
async fn reset_clears_mirror_but_not_store() {
    let (mirror, store, mut m) = fresh();
    m.unlock(ACCOUNT, MASTER).await.unwrap();
    m.add(draft("Bank", "Banking", "x")).await.unwrap();

    let err = m.reset(false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);

    m.reset(true).unwrap();
    assert_eq!(m.state(), VaultState::Locked);
    assert!(mirror.load(ACCOUNT).unwrap().is_none());
    assert_eq!(store.blob_count(), 1);
}

#[tokio::test]
async fn force_reset_destroys_everything() {
    let (mirror, store, mut m) = fresh();
    m.unlock(ACCOUNT, MASTER).await.unwrap();
    m.add(draft("Bank", "Banking", "x")).await.unwrap();
    m.add(draft("Seed phrase", "Crypto", "y")).await.unwrap();
    assert_eq!(store.blob_count(), 2);
    m.lock();

    // Works without the master secret; only the account is needed.
    let mut wiper = manager_with(&mirror, &store);
    wiper.set_account_identity(ACCOUNT).unwrap();
    assert_eq!(
        wiper.force_reset(false).await.unwrap_err().kind(),
        ErrorKind::Precondition
    );

    let report = wiper.force_reset(true).await.unwrap();
    assert_eq!(report.remote_deleted, 2);
    assert_eq!(store.blob_count(), 0);
    assert!(mirror.load(ACCOUNT).unwrap().is_none());
    assert_eq!(wiper.state(), VaultState::Locked);

    let report = wiper.unlock(ACCOUNT, "a brand new secret").await.unwrap();
    assert!(report.created);
}

#[tokio::test]
async fn operations_need_an_unlocked_vault() {
    let (_, _, mut m) = fresh();
    assert_eq!(m.list().unwrap_err().kind(), ErrorKind::Precondition);
    assert_eq!(m.export().unwrap_err().kind(), ErrorKind::Precondition);
    assert_eq!(
        m.delete("x").await.unwrap_err().kind(),
        ErrorKind::Precondition
    );
    assert_eq!(
        m.force_reset(true).await.unwrap_err().kind(),
        ErrorKind::Precondition
    );
}
