// src/utils/hash.rs

use argon2::Argon2;
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};

use crate::error::AppError;

/// Hashes a presenter password with Argon2 under a fresh random salt,
/// producing the PHC string stored on the user row.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AppError::InternalServerError("Failed to hash password.".to_string()))?;
    Ok(hash.to_string())
}

/// Checks a login password against the stored PHC string. A mismatch is
/// `Ok(false)`; only an unparseable stored hash is an error.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|_| {
        AppError::InternalServerError("Stored password hash is malformed.".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
