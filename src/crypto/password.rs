use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use super::CryptoError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password with Argon2id into a PHC string (salt embedded).
pub fn hash_password(password: &str) -> Result<String, CryptoError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CryptoError::HashFailed(e.to_string()))
}

/// Check a password against a stored PHC string. A mismatch is `Ok(false)`;
/// only an unreadable stored hash is an error.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, CryptoError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|_| CryptoError::MalformedHash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Password policy applied at registration and password change.
pub fn validate_password(password: &str, email: &str) -> Result<(), CryptoError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CryptoError::WeakPassword(format!(
            "must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(CryptoError::WeakPassword("must not be entirely numeric".into()));
    }
    let email = email.trim().to_lowercase();
    let local_part = email.split('@').next().unwrap_or_default();
    let lowered = password.to_lowercase();
    if lowered == email || (!local_part.is_empty() && lowered == local_part) {
        return Err(CryptoError::WeakPassword("too similar to the email address".into()));
    }
    Ok(())
}
