//! Argon2id password digests
//!
//! Digests are stored in PHC string form, so the salt and cost parameters
//! travel with each record and old digests keep verifying if the costs change.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::types::{GatewayError, Result};

fn argon2id() -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default())
}

/// Digest a plaintext password with a fresh random salt
pub fn hash_password(plain: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let digest = argon2id()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| GatewayError::Internal(format!("password digest failed: {e}")))?;
    Ok(digest.to_string())
}

/// Check a plaintext password against a stored digest.
///
/// A mismatch is `InvalidCredentials`; a digest that cannot be parsed is a
/// corrupt record and surfaces as `Internal`.
pub fn check_password(plain: &str, stored: &str) -> Result<()> {
    let digest = PasswordHash::new(stored)
        .map_err(|e| GatewayError::Internal(format!("stored password digest is corrupt: {e}")))?;

    match argon2id().verify_password(plain.as_bytes(), &digest) {
        Ok(()) => Ok(()),
        Err(password_hash::Error::Password) => Err(GatewayError::InvalidCredentials),
        Err(e) => Err(GatewayError::Internal(format!("password check failed: {e}"))),
    }
}
