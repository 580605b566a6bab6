//! Cryptographic primitives for TierVault.
//!
//! This module provides:
//! - Argon2id password-based key derivation (`kdf`)
//! - HKDF-based per-tier / export / key-check sub-keys (`keys`)
//! - AES-256-GCM sealing (`encryption`)
//! - Tier-aware payload encryption (`cipher`)
//! - Access proofs gating the `secret` tier (`proof`)

pub mod cipher;
pub mod encryption;
pub mod kdf;
pub mod keys;
pub mod proof;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{encrypt, decrypt, derive_key, ...};
pub use cipher::{authenticate, decrypt, encrypt, EncryptedPayload};
pub use kdf::{generate_salt, Argon2Params};
pub use keys::{derive_key, derive_purpose_key, KeyPurpose, TierKey};
pub use proof::{AccessProof, ProofHash};
