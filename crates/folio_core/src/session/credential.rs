//! Salted admin credential verification.
//!
//! # Invariants
//! - Hashes are `sha256(salt || ":" || password)`, hex encoded.
//! - Comparison time does not depend on where the digests differ.

use super::{SessionError, SessionResult};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Verifies admin passwords against a stored salted hash.
#[derive(Clone)]
pub struct CredentialVerifier {
    salt: String,
    digest: [u8; 32],
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier").finish_non_exhaustive()
    }
}

impl CredentialVerifier {
    /// Builds a verifier from configured salt and hex digest.
    pub fn from_hex(salt: impl Into<String>, password_hash: &str) -> SessionResult<Self> {
        let salt = salt.into();
        if salt.trim().is_empty() {
            return Err(SessionError::InvalidCredential(
                "salt cannot be empty".to_string(),
            ));
        }
        let bytes = hex::decode(password_hash.trim())
            .map_err(|err| SessionError::InvalidCredential(format!("password hash: {err}")))?;
        let digest: [u8; 32] = bytes.try_into().map_err(|_| {
            SessionError::InvalidCredential("password hash must be 32 bytes".to_string())
        })?;
        Ok(Self { salt, digest })
    }

    /// Builds a verifier directly from a password. Used by setup tooling.
    pub fn from_password(salt: impl Into<String>, password: &str) -> SessionResult<Self> {
        let salt = salt.into();
        let hash = hash_password(&salt, password);
        Self::from_hex(salt, &hash)
    }

    pub fn verify(&self, password: &str) -> bool {
        let candidate = digest(&self.salt, password);
        constant_time_eq(&candidate, &self.digest)
    }
}

/// Returns the hex digest stored in configuration for `password`.
pub fn hash_password(salt: &str, password: &str) -> String {
    hex::encode(digest(salt, password))
}

/// Returns a fresh random salt.
pub fn generate_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

fn digest(salt: &str, password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

fn constant_time_eq(left: &[u8; 32], right: &[u8; 32]) -> bool {
    left.iter()
        .zip(right.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
