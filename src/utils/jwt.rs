use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Token payload. Role and profile are looked up fresh on every request, so
/// only the subject and timing live here.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,       // user id
    pub exp: i64,        // expiration timestamp
    pub iat: i64,        // issued at timestamp
    /// Issue time in milliseconds; `iat` alone cannot be ordered against a
    /// password change made within the same second.
    pub iat_ms: i64,
}

pub fn create_token(user_id: Uuid, secret: &str, expiration_hours: i64) -> AppResult<String> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiration_hours);

    let claims = Claims {
        sub: user_id,
        exp: exp.timestamp(),
        iat: now.timestamp(),
        iat_ms: now.timestamp_millis(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
}

pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("Your token has expired! Please log in again.".to_string())
        }
        _ => AppError::Unauthorized("Invalid token. Please log in again!".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn issued_token_carries_subject() {
        let user_id = Uuid::new_v4();
        let token = create_token(user_id, SECRET, 1).unwrap();

        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, user_id);
        assert!(claims.exp > claims.iat);
        assert_eq!(claims.iat, claims.iat_ms / 1000);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = create_token(Uuid::new_v4(), SECRET, -2).unwrap();

        match verify_token(&token, SECRET) {
            Err(AppError::Unauthorized(message)) => assert!(message.contains("expired")),
            other => panic!("expected expiry rejection, got {:?}", other),
        }
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = create_token(Uuid::new_v4(), "another-secret", 1).unwrap();

        match verify_token(&token, SECRET) {
            Err(AppError::Unauthorized(message)) => assert!(message.contains("Invalid token")),
            other => panic!("expected signature rejection, got {:?}", other),
        }
    }
}
