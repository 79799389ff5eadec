// ============================
// crates/backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
use crate::config::PasswordSettings;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

/// Failure to produce a digest
#[derive(Error, Debug)]
#[error("password hashing failed: {0}")]
pub struct HashingError(String);

/// Opaque `hash` / `verify` capability used by the session manager
pub trait CredentialHasher: Send + Sync {
    /// Produce a self-describing digest (PHC string) of `plain`
    fn hash(&self, plain: &str) -> Result<String, HashingError>;

    /// Check `plain` against a digest; unparseable digests never match
    fn verify(&self, plain: &str, digest: &str) -> bool;
}

/// Argon2id hasher
#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, HashingError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| HashingError(e.to_string()))?;
        Ok(Self { params })
    }

    pub fn from_settings(settings: &PasswordSettings) -> Result<Self, HashingError> {
        Self::new(
            settings.argon2_memory_kib,
            settings.argon2_iterations,
            settings.argon2_parallelism,
        )
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plain: &str) -> Result<String, HashingError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| HashingError(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, plain: &str, digest: &str) -> bool {
        let parsed_hash = match PasswordHash::new(digest) {
            Ok(h) => h,
            Err(_) => return false,
        };
        // parameters come from the digest itself, so older digests keep verifying
        self.argon2()
            .verify_password(plain.as_bytes(), &parsed_hash)
            .is_ok()
    }
}
