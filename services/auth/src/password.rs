//! Password hashing with Argon2id
//!
//! Hashing is deliberately slow, so both operations run on the blocking
//! thread pool instead of the request task.

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{self, SaltString},
};
use thiserror::Error;

/// Failure inside the hashing primitive itself (not a password mismatch)
#[derive(Error, Debug)]
#[error("password hashing failed: {0}")]
pub struct HashError(String);

/// Argon2id hasher with fixed cost parameters
#[derive(Debug, Clone)]
pub struct Hasher {
    params: Params,
}

/// Memory cost in KiB
const DEFAULT_M_COST: u32 = 19 * 1024;
/// Passes over memory; puts a hash near 100ms on a current server core
const DEFAULT_T_COST: u32 = 8;
const DEFAULT_P_COST: u32 = 1;

impl Default for Hasher {
    /// Argon2id with 19 MiB, 8 passes, 1 lane
    fn default() -> Self {
        let params = Params::new(DEFAULT_M_COST, DEFAULT_T_COST, DEFAULT_P_COST, None)
            .unwrap_or_default();
        Self { params }
    }
}

impl Hasher {
    /// Create a hasher with explicit cost parameters
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash `password` with a fresh random salt, returning a PHC string
    pub async fn hash(&self, password: &str) -> Result<String, HashError> {
        let argon2 = self.argon2();
        let password = password.to_owned();

        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut rand::thread_rng());
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| HashError(e.to_string()))
        })
        .await
        .map_err(|e| HashError(e.to_string()))?
    }

    /// Check `password` against a stored PHC string.
    ///
    /// The cost parameters embedded in the hash are used, so hashes made
    /// under older parameters keep verifying.
    pub async fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, HashError> {
        let password = password.to_owned();
        let stored_hash = stored_hash.to_owned();

        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&stored_hash).map_err(|e| HashError(e.to_string()))?;
            match Argon2::default().verify_password(password.as_bytes(), &parsed) {
                Ok(()) => Ok(true),
                Err(password_hash::Error::Password) => Ok(false),
                Err(e) => Err(HashError(e.to_string())),
            }
        })
        .await
        .map_err(|e| HashError(e.to_string()))?
    }
}
