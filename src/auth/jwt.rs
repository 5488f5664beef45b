//! Access tokens (HS256)

use chrono::{Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::Role;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum JwtError {
    #[error("Token expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
    #[error("Failed to sign token")]
    Signing,
}

/// Signing and verification keys derived from one shared secret
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, expiry_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry: Duration::hours(expiry_hours),
        }
    }

    pub fn issue(&self, user_id: Uuid, email: &str, role: Role) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            exp: (now + self.expiry).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding).map_err(|e| {
            tracing::error!(error = %e, "JWT signing failed");
            JwtError::Signing
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_then_verify() {
        let keys = JwtKeys::new("test-secret", 1);
        let id = Uuid::new_v4();
        let token = keys.issue(id, "a@kervan.ge", Role::Manager).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, Role::Manager);
    }

    #[test]
    fn test_foreign_and_expired_tokens_rejected() {
        let token = JwtKeys::new("one", 1).issue(Uuid::new_v4(), "a@kervan.ge", Role::Admin).unwrap();
        assert_eq!(JwtKeys::new("two", 1).verify(&token).unwrap_err(), JwtError::Invalid);

        let expired = JwtKeys::new("one", -2).issue(Uuid::new_v4(), "a@kervan.ge", Role::Admin).unwrap();
        assert_eq!(JwtKeys::new("one", 1).verify(&expired).unwrap_err(), JwtError::Expired);
        assert_eq!(JwtKeys::new("one", 1).verify("garbage").unwrap_err(), JwtError::Invalid);
    }
}
