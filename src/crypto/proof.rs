//! Access proofs for the `secret` tier.
//!
//! An `AccessProof` is a **capability token**: it shows that whoever
//! issued it held the master secret and the account identity when it was
//! minted, and it expires after 24 hours.  It is *not* a zero-knowledge
//! proof and offers no soundness guarantee beyond that possession
//! binding.  A real proof system can replace it behind the same
//! `issue` / `verify` pair.
//!
//! - token = hex SHA-256 over a domain tag, every length-prefixed input
//!   and the issuance time in milliseconds,
//! - verification key = hex HMAC-SHA256(master secret, identity ‖ record id).
//!
//! Only `token`, `verification_key` and `issued_at` are ever persisted
//! (as `ProofHash`); the private inputs stay in memory and are zeroed
//! on drop.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::errors::{Result, TierVaultError};
use crate::vault::Record;

/// How long a proof stays valid after issuance.
pub const VALIDITY_HOURS: i64 = 24;

/// Domain separation tag mixed into every token.
const TOKEN_DOMAIN: &[u8] = b"tiervault-proof-v1";

/// Hex length of a SHA-256 token.
const TOKEN_HEX_LEN: usize = 64;

/// A possession-binding capability token for one record.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccessProof {
    pub token: String,
    pub public_inputs: Vec<String>,
    #[serde(skip)]
    pub private_inputs: Vec<String>,
    pub verification_key: String,
    pub issued_at: DateTime<Utc>,
}

impl Drop for AccessProof {
    fn drop(&mut self) {
        self.private_inputs.zeroize();
    }
}

impl std::fmt::Debug for AccessProof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessProof")
            .field("token", &self.token)
            .field("public_inputs", &self.public_inputs)
            .field("private_inputs", &"<redacted>")
            .field("verification_key", &self.verification_key)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// The durable part of a proof, stored on the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofHash {
    pub token: String,
    pub verification_key: String,
    pub issued_at: DateTime<Utc>,
}

impl AccessProof {
    /// The record id this proof was issued for, if well-formed.
    pub fn record_id(&self) -> Option<&str> {
        self.public_inputs.get(1).map(String::as_str)
    }

    /// The persistable summary of this proof.
    pub fn to_hash(&self) -> ProofHash {
        ProofHash {
            token: self.token.clone(),
            verification_key: self.verification_key.clone(),
            issued_at: self.issued_at,
        }
    }

    /// Whether the proof was minted over this secret value.  A proof
    /// issued before the value changed does not cover the new one.
    pub fn covers_value(&self, secret_value: &str) -> bool {
        self.private_inputs
            .get(1)
            .is_some_and(|v| v.as_bytes().ct_eq(secret_value.as_bytes()).into())
    }

    /// Whether the proof was issued for this account and record.
    pub fn binds(&self, account_identity: &str, record_id: &str) -> bool {
        self.public_inputs.len() == 2
            && self.public_inputs[0] == account_identity
            && self.public_inputs[1] == record_id
    }
}

/// Issue a proof for `record`, timestamped now.
pub fn issue(record: &Record, master_secret: &[u8], account_identity: &str) -> Result<AccessProof> {
    issue_at(record, master_secret, account_identity, Utc::now())
}

/// Issue a proof with an explicit issuance time.
pub fn issue_at(
    record: &Record,
    master_secret: &[u8],
    account_identity: &str,
    issued_at: DateTime<Utc>,
) -> Result<AccessProof> {
    let master = std::str::from_utf8(master_secret).map_err(|_| {
        TierVaultError::InvalidInput("master secret must be valid UTF-8".into())
    })?;

    let public_inputs = vec![account_identity.to_string(), record.id.clone()];
    let private_inputs = vec![master.to_string(), record.secret_value.clone()];

    let token = compute_token(&public_inputs, &private_inputs, issued_at);
    let verification_key = verification_key_for(master_secret, account_identity, &record.id)?;

    Ok(AccessProof {
        token,
        public_inputs,
        private_inputs,
        verification_key,
        issued_at,
    })
}

/// Issue a proof that binds only the master secret, for a record whose
/// plaintext is not known yet.
///
/// The vault owner uses it to open a `secret` payload before minting the
/// full proof over the record's secret value.
pub(crate) fn issue_possession(
    record_id: &str,
    master_secret: &[u8],
    account_identity: &str,
) -> Result<AccessProof> {
    let master = std::str::from_utf8(master_secret).map_err(|_| {
        TierVaultError::InvalidInput("master secret must be valid UTF-8".into())
    })?;
    let issued_at = Utc::now();

    let public_inputs = vec![account_identity.to_string(), record_id.to_string()];
    let private_inputs = vec![master.to_string()];

    Ok(AccessProof {
        token: compute_token(&public_inputs, &private_inputs, issued_at),
        verification_key: verification_key_for(master_secret, account_identity, record_id)?,
        public_inputs,
        private_inputs,
        issued_at,
    })
}

/// The verification key a proof for `record_id` must carry.
pub fn verification_key_for(
    master_secret: &[u8],
    account_identity: &str,
    record_id: &str,
) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(master_secret)
        .map_err(|e| TierVaultError::KeyDerivationFailed(format!("HMAC init failed: {e}")))?;
    update_prefixed(&mut mac, account_identity.as_bytes());
    update_prefixed(&mut mac, record_id.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a proof against the current time.
pub fn verify(proof: &AccessProof) -> bool {
    verify_at(proof, Utc::now())
}

/// Verify a proof against an explicit time.
///
/// Fails closed: any failed check yields `false`, which callers must
/// treat as access denied.
pub fn verify_at(proof: &AccessProof, now: DateTime<Utc>) -> bool {
    if proof.public_inputs.is_empty() || proof.private_inputs.is_empty() {
        return false;
    }
    if proof.verification_key.is_empty() {
        return false;
    }
    if proof.token.len() != TOKEN_HEX_LEN || !proof.token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return false;
    }

    if proof.issued_at > now || now - proof.issued_at > Duration::hours(VALIDITY_HOURS) {
        return false;
    }

    let expected = compute_token(&proof.public_inputs, &proof.private_inputs, proof.issued_at);
    expected
        .as_bytes()
        .ct_eq(proof.token.to_ascii_lowercase().as_bytes())
        .into()
}

/// Constant-time comparison of a proof's verification key.
pub fn verification_key_matches(proof: &AccessProof, expected: &str) -> bool {
    proof
        .verification_key
        .as_bytes()
        .ct_eq(expected.as_bytes())
        .into()
}

fn compute_token(public: &[String], private: &[String], issued_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(TOKEN_DOMAIN);
    for (section, inputs) in [(b'P', public), (b'S', private)] {
        hasher.update([section]);
        hasher.update((inputs.len() as u64).to_le_bytes());
        for input in inputs {
            hasher.update((input.len() as u64).to_le_bytes());
            hasher.update(input.as_bytes());
        }
    }
    hasher.update(issued_at.timestamp_millis().to_le_bytes());
    hex::encode(hasher.finalize())
}

fn update_prefixed(mac: &mut Hmac<Sha256>, bytes: &[u8]) {
    mac.update(&(bytes.len() as u64).to_le_bytes());
    mac.update(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::{RecordDraft, Tier};

    fn record() -> Record {
        let draft = RecordDraft {
            title: "Bank".into(),
            secret_value: "s3cr3t!".into(),
            category: "Banking".into(),
            ..RecordDraft::default()
        };
        Record::from_draft("rec-1".into(), draft, Tier::Secret, Utc::now())
    }

    #[test]
    fn fresh_proof_verifies() {
        let proof = issue(&record(), b"master", "0xabc").unwrap();
        assert!(verify(&proof));
        assert!(proof.binds("0xabc", "rec-1"));
        assert_eq!(proof.record_id(), Some("rec-1"));
    }

    #[test]
    fn proof_valid_until_exactly_24h() {
        let t0 = Utc::now() - Duration::days(3);
        let proof = issue_at(&record(), b"master", "0xabc", t0).unwrap();

        assert!(verify_at(&proof, t0));
        assert!(verify_at(&proof, t0 + Duration::hours(24)));
        assert!(!verify_at(
            &proof,
            t0 + Duration::hours(24) + Duration::milliseconds(1)
        ));
    }

    #[test]
    fn proof_from_the_future_is_rejected() {
        let t0 = Utc::now() + Duration::hours(1);
        let proof = issue_at(&record(), b"master", "0xabc", t0).unwrap();
        assert!(!verify_at(&proof, Utc::now()));
    }

    #[test]
    fn tampered_inputs_break_the_token() {
        let mut proof = issue(&record(), b"master", "0xabc").unwrap();
        proof.public_inputs[1] = "rec-2".into();
        assert!(!verify(&proof));
    }

    #[test]
    fn empty_lists_or_key_fail_closed() {
        let mut proof = issue(&record(), b"master", "0xabc").unwrap();
        proof.private_inputs.clear();
        assert!(!verify(&proof));

        let mut proof = issue(&record(), b"master", "0xabc").unwrap();
        proof.verification_key.clear();
        assert!(!verify(&proof));

        let mut proof = issue(&record(), b"master", "0xabc").unwrap();
        proof.token = "not-hex".into();
        assert!(!verify(&proof));
    }

    #[test]
    fn deserialized_proof_has_no_private_inputs() {
        let proof = issue(&record(), b"master", "0xabc").unwrap();
        let json = serde_json::to_string(&proof).unwrap();
        assert!(!json.contains("s3cr3t!"));
        assert!(!json.contains("master"));

        let back: AccessProof = serde_json::from_str(&json).unwrap();
        assert!(!verify(&back));
    }

    #[test]
    fn proof_covers_only_the_value_it_was_minted_over() {
        let proof = issue(&record(), b"master", "0xabc").unwrap();
        assert!(proof.covers_value("s3cr3t!"));
        assert!(!proof.covers_value("s3cr3t"));

        let possession = issue_possession("rec-1", b"master", "0xabc").unwrap();
        assert!(!possession.covers_value("s3cr3t!"));
    }

    #[test]
    fn possession_proof_verifies_and_binds() {
        let proof = issue_possession("rec-1", b"master", "0xabc").unwrap();
        assert!(verify(&proof));
        assert!(proof.binds("0xabc", "rec-1"));
        assert_eq!(proof.private_inputs.len(), 1);
    }

    #[test]
    fn verification_key_depends_on_master_secret() {
        let proof = issue(&record(), b"master", "0xabc").unwrap();
        let right = verification_key_for(b"master", "0xabc", "rec-1").unwrap();
        let wrong = verification_key_for(b"other", "0xabc", "rec-1").unwrap();
        assert!(verification_key_matches(&proof, &right));
        assert!(!verification_key_matches(&proof, &wrong));
    }
}
