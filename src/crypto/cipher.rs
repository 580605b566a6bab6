//! Tier-aware encryption of record payloads.
//!
//! | tier      | protection                                          |
//! |-----------|-----------------------------------------------------|
//! | `public`  | reversible encoding only (base64 in JSON)           |
//! | `private` | AES-256-GCM, fresh 96-bit IV per call               |
//! | `secret`  | same as `private`, decrypt gated by an access proof |

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::encryption::{self, NONCE_LEN};
use super::keys::{KeyPurpose, TierKey};
use super::proof::{self, AccessProof};
use crate::errors::{Result, TierVaultError};
use crate::vault::format::{base64_decode, base64_encode};
use crate::vault::Tier;

/// Opaque encrypted payload.  Only this module interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub ciphertext: Vec<u8>,
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub iv: Vec<u8>,
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub salt: Vec<u8>,
    pub tier: Tier,
}

/// Encrypt `plaintext` for `tier` with `key`.
pub fn encrypt(plaintext: &[u8], tier: Tier, key: &TierKey) -> Result<EncryptedPayload> {
    if !key_allows(key, tier) {
        return Err(TierVaultError::EncryptionFailed(format!(
            "key for {:?} cannot protect a {tier} payload",
            key.purpose()
        )));
    }

    match tier {
        Tier::Public => Ok(EncryptedPayload {
            ciphertext: plaintext.to_vec(),
            iv: Vec::new(),
            salt: Vec::new(),
            tier,
        }),
        Tier::Private | Tier::Secret => {
            let (iv, ciphertext) = encryption::seal(key.as_bytes(), plaintext)?;
            Ok(EncryptedPayload {
                ciphertext,
                iv,
                salt: key.salt().to_vec(),
                tier,
            })
        }
    }
}

/// Decrypt a payload.
///
/// `secret` payloads additionally require a proof that passes
/// `proof::verify`; a missing or invalid proof is a `Decryption` error.
pub fn decrypt(
    payload: &EncryptedPayload,
    tier: Tier,
    key: &TierKey,
    proof: Option<&AccessProof>,
) -> Result<Vec<u8>> {
    if payload.tier != tier || !key_allows(key, tier) {
        return Err(TierVaultError::Decryption);
    }

    match tier {
        Tier::Public => {
            if !payload.iv.is_empty() {
                return Err(TierVaultError::Decryption);
            }
            Ok(payload.ciphertext.clone())
        }
        Tier::Private => open(payload, key),
        Tier::Secret => match proof {
            Some(p) if proof::verify(p) => open(payload, key),
            _ => Err(TierVaultError::Decryption),
        },
    }
}

/// Check that `key` opens `payload` without handing back the plaintext.
///
/// Used to verify a master secret; the proof gate does not apply because
/// nothing is revealed.
pub fn authenticate(payload: &EncryptedPayload, key: &TierKey) -> Result<()> {
    if payload.tier == Tier::Public {
        return Err(TierVaultError::Decryption);
    }
    let mut plaintext = open(payload, key)?;
    plaintext.zeroize();
    Ok(())
}

fn open(payload: &EncryptedPayload, key: &TierKey) -> Result<Vec<u8>> {
    if payload.iv.len() != NONCE_LEN {
        return Err(TierVaultError::Decryption);
    }
    encryption::open(key.as_bytes(), &payload.iv, &payload.ciphertext)
}

fn key_allows(key: &TierKey, tier: Tier) -> bool {
    match key.purpose() {
        KeyPurpose::Tier(t) => t == tier,
        KeyPurpose::Export | KeyPurpose::KeyCheck => tier != Tier::Public,
    }
}
