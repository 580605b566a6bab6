//! AES-256-GCM authenticated encryption.
//!
//! Each call to `seal` generates a fresh random 12-byte nonce and
//! returns it next to the ciphertext; `open` takes both back.  The
//! 16-byte auth tag stays appended to the ciphertext.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

use crate::errors::{Result, TierVaultError};

/// Size of the AES-256-GCM nonce in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Encrypt `plaintext` with a 32-byte `key`.
///
/// Returns `(nonce, ciphertext || tag)`.
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| TierVaultError::EncryptionFailed(format!("invalid key length: {e}")))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| TierVaultError::EncryptionFailed(format!("encryption error: {e}")))?;

    Ok((nonce.to_vec(), ciphertext))
}

/// Decrypt data that was produced by `seal`.
///
/// Any failure (wrong nonce length, short ciphertext, tag mismatch)
/// collapses into `TierVaultError::Decryption`; nothing partial is
/// ever returned.
pub fn open(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_LEN || ciphertext.len() < TAG_LEN {
        return Err(TierVaultError::Decryption);
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| TierVaultError::Decryption)?;

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| TierVaultError::Decryption)
}
