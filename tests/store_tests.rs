//! Tests for the content stores and the on-disk mirror.

use std::time::Duration;

use tempfile::TempDir;

use tiervault::crypto::Argon2Params;
use tiervault::errors::ErrorKind;
use tiervault::store::{
    with_retries, BlobRef, ContentStore, DirectoryStore, MemoryStore, RetryPolicy, StorageKey,
    UnavailableStore,
};
use tiervault::vault::{
    FileMirror, LocalMirror, RecordDraft, Tier, VaultManager, VaultOptions, VaultWarning,
};

// ---------------------------------------------------------------------------
// DirectoryStore
// ---------------------------------------------------------------------------

#[tokio::test]
async fn directory_store_put_get_delete() {
    let tmp = TempDir::new().unwrap();
    let store = DirectoryStore::new(tmp.path().join("blobs"));
    let key = StorageKey::new("0xabc", "rec-1");
    let prefix = StorageKey::account_prefix("0xabc");

    let blob_ref = store.put(&key, b"payload").await.unwrap();
    assert_eq!(blob_ref, BlobRef::for_blob(b"payload"));
    assert_eq!(store.get(&blob_ref).await.unwrap(), b"payload");
    assert_eq!(store.list(&prefix).await.unwrap(), vec![blob_ref.clone()]);

    store.delete(&blob_ref).await.unwrap();
    let err = store.get(&blob_ref).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(store.list(&prefix).await.unwrap().is_empty());

    // Deleting twice is fine.
    store.delete(&blob_ref).await.unwrap();
}

#[tokio::test]
async fn directory_store_namespaces_accounts() {
    let tmp = TempDir::new().unwrap();
    let store = DirectoryStore::new(tmp.path());

    store.put(&StorageKey::new("0xA", "r1"), b"one").await.unwrap();
    store.put(&StorageKey::new("0xAB", "r1"), b"two").await.unwrap();
    store.put(&StorageKey::new("0xA", "r2"), b"three").await.unwrap();

    let prefix = StorageKey::account_prefix("0xA");
    assert_eq!(store.list(&prefix).await.unwrap().len(), 2);
    let prefix = StorageKey::account_prefix("0xAB");
    assert_eq!(store.list(&prefix).await.unwrap().len(), 1);
}

#[tokio::test]
async fn directory_store_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let key = StorageKey::new("acct", "rec");

    let blob_ref = {
        let store = DirectoryStore::new(tmp.path());
        store.put(&key, b"durable").await.unwrap()
    };

    let reopened = DirectoryStore::new(tmp.path());
    let prefix = StorageKey::account_prefix("acct");
    assert_eq!(reopened.list(&prefix).await.unwrap(), vec![blob_ref.clone()]);
    assert_eq!(reopened.get(&blob_ref).await.unwrap(), b"durable");
}

#[tokio::test]
async fn directory_store_overwrites_key() {
    let tmp = TempDir::new().unwrap();
    let store = DirectoryStore::new(tmp.path());
    let key = StorageKey::new("acct", "rec");

    store.put(&key, b"v1").await.unwrap();
    let second = store.put(&key, b"v2").await.unwrap();
    let prefix = StorageKey::account_prefix("acct");
    assert_eq!(store.list(&prefix).await.unwrap(), vec![second]);
}

#[test]
fn blob_ref_parse_rejects_garbage() {
    assert!(BlobRef::parse("not-hex").is_err());
    let good = BlobRef::for_blob(b"x");
    assert_eq!(BlobRef::parse(good.as_str()).unwrap(), good);
}

// ---------------------------------------------------------------------------
// Retry behaviour
// ---------------------------------------------------------------------------

#[tokio::test]
async fn offline_store_is_retried_a_bounded_number_of_times() {
    let store = MemoryStore::new();
    store.set_offline(true);
    let key = StorageKey::new("acct", "rec");
    let policy = RetryPolicy::new(4, Duration::ZERO);

    let err = with_retries(&policy, "put", || store.put(&key, b"x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);
    assert_eq!(store.put_attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn retries_pause_between_attempts() {
    let store = MemoryStore::new();
    store.set_offline(true);
    let key = StorageKey::new("acct", "rec");
    let policy = RetryPolicy::new(3, Duration::from_secs(1));

    let started = tokio::time::Instant::now();
    let _ = with_retries(&policy, "put", || store.put(&key, b"x")).await;
    assert_eq!(started.elapsed(), Duration::from_secs(2));
}

#[tokio::test]
async fn unavailable_store_reports_remote_unavailable() {
    let store = UnavailableStore;
    let err = store.list("acct").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);
}

// ---------------------------------------------------------------------------
// Vault over the filesystem collaborators
// ---------------------------------------------------------------------------

fn disk_manager(root: &std::path::Path) -> VaultManager {
    VaultManager::new(
        Box::new(FileMirror::new(root.join("mirror"))),
        Box::new(DirectoryStore::new(root.join("blobs"))),
        VaultOptions {
            kdf: Argon2Params::minimum(),
            retry: RetryPolicy::once(),
            ..VaultOptions::default()
        },
    )
}

#[tokio::test]
async fn vault_persists_across_processes() {
    let tmp = TempDir::new().unwrap();

    let id = {
        let mut m = disk_manager(tmp.path());
        m.unlock("0xabc", "master").await.unwrap();
        m.add(RecordDraft {
            title: "Bank".into(),
            secret_value: "hunter2".into(),
            category: "Banking".into(),
            ..RecordDraft::default()
        })
        .await
        .unwrap()
        .record_id
    };

    let mirror = FileMirror::new(tmp.path().join("mirror"));
    let on_disk = std::fs::read_to_string(mirror.path_for("0xabc")).unwrap();
    assert!(!on_disk.contains("hunter2"));
    assert!(!on_disk.contains("master"));
    assert!(mirror.load("0xabc").unwrap().is_some());

    let mut m = disk_manager(tmp.path());
    let report = m.unlock("0xabc", "master").await.unwrap();
    assert!(!report.created);
    let summary = &m.list().unwrap()[0];
    assert_eq!(summary.id, id);
    assert_eq!(summary.privacy_tier, Tier::Secret);

    let proof = m.issue_proof(&id).unwrap();
    assert_eq!(m.get(&id, Some(&proof)).unwrap().secret_value, "hunter2");
}

#[tokio::test]
async fn delete_unindexes_a_blob_whose_file_is_gone() {
    let tmp = TempDir::new().unwrap();
    let store = DirectoryStore::new(tmp.path());
    let key = StorageKey::new("acct", "rec");
    let blob_ref = store.put(&key, b"doomed").await.unwrap();

    std::fs::remove_file(tmp.path().join(format!("{blob_ref}.blob"))).unwrap();
    store.delete(&blob_ref).await.unwrap();
    let prefix = StorageKey::account_prefix("acct");
    assert!(store.list(&prefix).await.unwrap().is_empty());
}

#[tokio::test]
async fn restore_skips_blobs_missing_from_the_store() {
    let tmp = TempDir::new().unwrap();

    let (kept, lost) = {
        let mut m = disk_manager(tmp.path());
        m.unlock("acct", "pw").await.unwrap();
        let kept = m
            .add(RecordDraft {
                title: "Bank".into(),
                secret_value: "kept".into(),
                category: "Banking".into(),
                ..RecordDraft::default()
            })
            .await
            .unwrap()
            .record_id;
        let lost = m
            .add(RecordDraft {
                title: "Seed phrase".into(),
                secret_value: "lost".into(),
                category: "Crypto".into(),
                ..RecordDraft::default()
            })
            .await
            .unwrap()
            .record_id;
        (kept, lost)
    };

    // The index still names the blob but its file is gone.
    let lost_ref = {
        let mirror = FileMirror::new(tmp.path().join("mirror"));
        let vault = mirror.load("acct").unwrap().unwrap();
        vault.find(&lost).unwrap().remote_ref.clone().unwrap()
    };
    std::fs::remove_file(tmp.path().join("blobs").join(format!("{lost_ref}.blob"))).unwrap();
    std::fs::remove_dir_all(tmp.path().join("mirror")).unwrap();

    let mut m = disk_manager(tmp.path());
    let report = m.unlock("acct", "pw").await.unwrap();
    assert!(!report.created);
    assert_eq!(report.restored, 1);
    assert_eq!(
        report.warnings,
        vec![VaultWarning::MissingBlob { blob_ref: lost_ref }]
    );

    let summaries = m.list().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id, kept);
    let proof = m.issue_proof(&kept).unwrap();
    assert_eq!(m.get(&kept, Some(&proof)).unwrap().secret_value, "kept");
}

#[tokio::test]
async fn mirror_clear_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let mirror = FileMirror::new(tmp.path());
    mirror.clear("nobody").unwrap();
    assert!(mirror.load("nobody").unwrap().is_none());
}
