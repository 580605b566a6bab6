//! Vault module: tiered credential storage.
//!
//! This module provides:
//! - Record types and privacy tiers (`record`)
//! - Content-based tier classification (`classifier`)
//! - The persisted JSON vault layout (`format`)
//! - Local mirror persistence (`mirror`)
//! - The export file format (`export`)
//! - The high-level `VaultManager` (`manager`)

pub mod classifier;
pub mod export;
pub mod format;
pub mod manager;
pub mod mirror;
pub mod record;

// Re-export the most commonly used items.
pub use classifier::TierClassifier;
pub use export::ExportFile;
pub use format::{RemoteReference, Vault, VaultMetadata};
pub use manager::{
    BackfillReport, ImportReport, ResetReport, UnlockReport, VaultManager, VaultOptions,
    VaultState, VaultWarning, WriteOutcome,
};
pub use mirror::{FileMirror, LocalMirror, MemoryMirror};
pub use record::{Record, RecordDraft, RecordSummary, StoredRecord, Tier, VaultEntry};
