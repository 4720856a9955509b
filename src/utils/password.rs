use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Returns `Ok(false)` on mismatch; only a corrupt stored hash is an error.
pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| AppError::Internal(format!("Failed to parse password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Check a new password and its confirmation before hashing.
pub fn validate_new_password(password: &str, confirm: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Password must have at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    if password != confirm {
        return Err(AppError::BadRequest("Passwords are not the same!".to_string()));
    }

    Ok(())
}

/// A freshly generated password-reset token. Only `hash` is persisted; `raw`
/// goes to the user by email.
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub raw: String,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    pub fn generate(ttl_minutes: i64) -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let raw: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();

        Self {
            hash: hash_reset_token(&raw),
            raw,
            expires_at: Utc::now() + Duration::minutes(ttl_minutes),
        }
    }
}

pub fn hash_reset_token(raw: &str) -> String {
    format!("{:x}", Sha256::digest(raw.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("pass1234").unwrap();
        assert!(verify_password("pass1234", &hash).unwrap());
        assert!(!verify_password("pass12345", &hash).unwrap());
    }

    #[test]
    fn new_password_rules() {
        assert!(validate_new_password("short", "short").is_err());
        assert!(validate_new_password("longenough", "different1").is_err());
        assert!(validate_new_password("longenough", "longenough").is_ok());
    }

    #[test]
    fn reset_token_stores_only_a_digest() {
        let token = ResetToken::generate(10);

        assert_eq!(token.raw.len(), 64);
        assert_eq!(token.hash.len(), 64);
        assert_ne!(token.raw, token.hash);
        assert_eq!(hash_reset_token(&token.raw), token.hash);
        assert!(token.expires_at > Utc::now());
    }

    #[test]
    fn reset_tokens_are_unique() {
        let a = ResetToken::generate(10);
        let b = ResetToken::generate(10);
        assert_ne!(a.raw, b.raw);
    }
}
