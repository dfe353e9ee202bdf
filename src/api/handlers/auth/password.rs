//! Argon2id password hashing.
//!
//! Hashes embed their own salt and parameters, so verification reads
//! everything it needs from the stored string. A mismatch is a normal `false`
//! result, never an error.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};

use super::error::AuthError;

// OWASP-recommended interactive parameters (19 MiB, t=2, p=1), comparable
// in cost to bcrypt at work factor 10-12.
const MEMORY_KIB: u32 = 19 * 1024;
const ITERATIONS: u32 = 2;
const PARALLELISM: u32 = 1;

fn hasher() -> Result<Argon2<'static>, AuthError> {
    let params = Params::new(MEMORY_KIB, ITERATIONS, PARALLELISM, None)
        .map_err(|err| AuthError::Unavailable(anyhow::anyhow!("argon2 params: {err}")))?;
    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    ))
}

/// Hash a plaintext password with a fresh random salt.
///
/// # Errors
/// Returns `Unavailable` if the hasher cannot be constructed or hashing fails;
/// neither depends on the input password.
pub fn hash_password(plaintext: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|err| AuthError::Unavailable(anyhow::anyhow!("argon2 hash: {err}")))?;
    Ok(hash.to_string())
}

/// Constant-time verification against a stored hash.
///
/// Unparseable stored hashes verify as `false`; they indicate corrupt data,
/// not a caller mistake, and must not distinguish themselves from a wrong
/// password.
#[must_use]
pub fn verify_password(plaintext: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    // Argon2::default() reads parameters back from the hash string.
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}
