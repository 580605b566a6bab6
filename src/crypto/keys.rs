//! Key derivation helpers using HKDF-SHA256.
//!
//! From the Argon2id root key of a payload we derive one sub-key per
//! purpose:
//! - a **tier** key (`tiervault-tier:<tier>`) for record payloads,
//! - an **export** key for export-encrypted fields,
//! - a **key-check** key for the vault's master-secret verifier.
//!
//! HKDF (RFC 5869) uses the root key as input keying material (IKM)
//! and a context string (`info`) to produce independent sub-keys.

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::kdf::{derive_root_key, Argon2Params, KEY_LEN};
use crate::errors::{Result, TierVaultError};
use crate::vault::Tier;

/// What a derived key is allowed to protect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPurpose {
    Tier(Tier),
    Export,
    KeyCheck,
}

impl KeyPurpose {
    fn info(self) -> String {
        match self {
            Self::Tier(tier) => format!("tiervault-tier:{tier}"),
            Self::Export => "tiervault-export".to_string(),
            Self::KeyCheck => "tiervault-key-check".to_string(),
        }
    }
}

/// A 256-bit symmetric key plus the salt it was derived with.
///
/// The key bytes are zeroed when the value is dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct TierKey {
    bytes: [u8; KEY_LEN],
    #[zeroize(skip)]
    salt: Vec<u8>,
    #[zeroize(skip)]
    purpose: KeyPurpose,
}

impl TierKey {
    /// Placeholder "key" for the public tier, which only encodes.
    pub fn encoding_only() -> Self {
        Self {
            bytes: [0u8; KEY_LEN],
            salt: Vec::new(),
            purpose: KeyPurpose::Tier(Tier::Public),
        }
    }

    /// Build a key from raw parts (used by tests and key rotation).
    pub fn from_parts(bytes: [u8; KEY_LEN], salt: Vec<u8>, purpose: KeyPurpose) -> Self {
        Self {
            bytes,
            salt,
            purpose,
        }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn purpose(&self) -> KeyPurpose {
        self.purpose
    }
}

impl fmt::Debug for TierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TierKey")
            .field("purpose", &self.purpose)
            .field("bytes", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// Derive the key protecting a record payload of the given tier.
///
/// Deterministic in all of its inputs.  Callers must pass a fresh salt
/// for every encryption; only decryption reuses a stored salt.
pub fn derive_key(
    master_secret: &[u8],
    account_identity: &str,
    salt: &[u8],
    tier: Tier,
    params: &Argon2Params,
) -> Result<TierKey> {
    if tier == Tier::Public {
        return Ok(TierKey::encoding_only());
    }
    derive_purpose_key(
        master_secret,
        account_identity,
        salt,
        KeyPurpose::Tier(tier),
        params,
    )
}

/// Derive a key for any purpose: Argon2id root key, then HKDF expand.
pub fn derive_purpose_key(
    master_secret: &[u8],
    account_identity: &str,
    salt: &[u8],
    purpose: KeyPurpose,
    params: &Argon2Params,
) -> Result<TierKey> {
    let mut root = derive_root_key(master_secret, account_identity, salt, params)?;
    let expanded = hkdf_derive(&root, purpose.info().as_bytes());
    root.zeroize();

    Ok(TierKey {
        bytes: expanded?,
        salt: salt.to_vec(),
        purpose,
    })
}

/// Internal helper: run HKDF-SHA256 expand with the given `info`.
///
/// The root key already has high entropy (it came from Argon2id), so
/// the extract step runs with the default zero salt.
fn hkdf_derive(ikm: &[u8], info: &[u8]) -> Result<[u8; KEY_LEN]> {
    let hk = Hkdf::<Sha256>::new(None, ikm);

    let mut okm = [0u8; KEY_LEN];
    hk.expand(info, &mut okm)
        .map_err(|e| TierVaultError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}
