//! Password-based key derivation using Argon2id.
//!
//! The master secret never reaches Argon2id on its own: it is first
//! bound to the account identity with `HMAC-SHA256(identity, secret)`,
//! so the same master secret used under two accounts yields unrelated
//! keys.  Argon2id then stretches that material with a fresh per-payload
//! salt.  Parameters are configurable via `Argon2Params` (loaded from
//! `.tiervault.toml` or sensible defaults).

use argon2::{Algorithm, Argon2, Params, Version};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::errors::{Result, TierVaultError};

/// Length of the salt in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// Length of the derived key in bytes (256 bits, for AES-256).
pub const KEY_LEN: usize = 32;

/// Minimum safe memory cost in KiB (8 MB).
const MIN_MEMORY_KIB: u32 = 8_192;

/// Configurable Argon2id parameters.
///
/// These map 1:1 to the fields in `Settings` so the CLI can pass
/// whatever the user configured in `.tiervault.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl Argon2Params {
    /// The cheapest parameters the KDF accepts.  Meant for tests.
    pub fn minimum() -> Self {
        Self {
            memory_kib: MIN_MEMORY_KIB,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Bind the master secret to an account identity.
///
/// `HMAC-SHA256(key = identity, msg = master_secret)`; the result is the
/// "password" fed into Argon2id.
pub fn bind_identity(master_secret: &[u8], account_identity: &str) -> Result<[u8; KEY_LEN]> {
    let mut mac = Hmac::<Sha256>::new_from_slice(account_identity.as_bytes())
        .map_err(|e| TierVaultError::KeyDerivationFailed(format!("HMAC init failed: {e}")))?;
    mac.update(master_secret);

    let mut out = [0u8; KEY_LEN];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Derive a 32-byte root key from the master secret, account identity and salt.
///
/// The same inputs + params always produce the same key.  Enforces
/// minimum Argon2 parameters to prevent dangerously weak KDF settings.
pub fn derive_root_key(
    master_secret: &[u8],
    account_identity: &str,
    salt: &[u8],
    argon2_params: &Argon2Params,
) -> Result<[u8; KEY_LEN]> {
    if argon2_params.memory_kib < MIN_MEMORY_KIB {
        return Err(TierVaultError::KeyDerivationFailed(format!(
            "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
            argon2_params.memory_kib
        )));
    }
    if argon2_params.iterations < 1 {
        return Err(TierVaultError::KeyDerivationFailed(
            "Argon2 iterations must be at least 1".into(),
        ));
    }
    if argon2_params.parallelism < 1 {
        return Err(TierVaultError::KeyDerivationFailed(
            "Argon2 parallelism must be at least 1".into(),
        ));
    }
    if salt.len() < 16 {
        return Err(TierVaultError::KeyDerivationFailed(format!(
            "salt must be at least 128 bits (got {} bytes)",
            salt.len()
        )));
    }

    let params = Params::new(
        argon2_params.memory_kib,
        argon2_params.iterations,
        argon2_params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| TierVaultError::KeyDerivationFailed(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut material = bind_identity(master_secret, account_identity)?;
    let mut key = [0u8; KEY_LEN];
    let hashed = argon2.hash_password_into(&material, salt, &mut key);
    material.zeroize();
    hashed.map_err(|e| {
        TierVaultError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}"))
    })?;

    Ok(key)
}

/// Generate a cryptographically random 32-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}
