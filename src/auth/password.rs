//! Password hashing (Argon2id, PHC strings) and reset tokens

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Invalid password hash format: {0}")]
    InvalidHashFormat(String),
}

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
}

/// `Ok(false)` on a mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHashFormat(e.to_string()))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

/// 32 random bytes, hex encoded
pub fn generate_reset_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("kervan-secret").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("kervan-secret", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_invalid_hash_is_an_error() {
        assert!(matches!(verify_password("x", "plain-text"), Err(PasswordError::InvalidHashFormat(_))));
    }

    #[test]
    fn test_reset_tokens_are_unique_hex() {
        let a = generate_reset_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, generate_reset_token());
    }
}
