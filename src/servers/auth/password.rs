//! Secret hashing (Argon2id, PHC string format).

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use password_hash::SaltString;
use rand::RngExt;

use crate::error::AuthError;

/// Hash a secret for storage: Argon2id with a fresh 16-byte salt, rendered as
/// a self-describing PHC string.
pub fn hash_secret(secret: &str) -> Result<String, AuthError> {
    let mut salt_bytes = [0u8; 16];
    rand::rng().fill(&mut salt_bytes[..]);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AuthError::Internal(format!("salt encode: {e}")))?;

    let argon2 = Argon2::default();
    argon2
        .hash_password(secret.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| AuthError::Internal(format!("hash failed: {e}")))
}

/// Verify a secret against a stored PHC string. Comparison inside the
/// verifier is constant-time; a malformed stored hash verifies as false.
pub fn verify_secret(secret: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}
