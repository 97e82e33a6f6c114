use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config;
use crate::types::Role;

/// Token payload: who the caller is and what role they act with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(id: Uuid, role: Role) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            id,
            role,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("JWT token has expired")]
    Expired,

    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    generate_jwt_with_secret(claims, &config::config().security.jwt_secret)
}

pub fn generate_jwt_with_secret(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Validate JWT token and extract claims
pub fn validate_jwt(token: &str) -> Result<Claims, JwtError> {
    validate_jwt_with_secret(token, &config::config().security.jwt_secret)
}

pub fn validate_jwt_with_secret(token: &str, secret: &str) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::InvalidToken(e.to_string()),
        })
}

pub fn hash_password(password: &str) -> Result<String, JwtError> {
    Ok(bcrypt::hash(password, config::config().security.bcrypt_cost)?)
}

/// Malformed stored hashes count as a mismatch rather than an error.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn token_round_trip_carries_id_and_role() {
        let id = Uuid::new_v4();
        let claims = Claims {
            id,
            role: Role::Provider,
            exp: Utc::now().timestamp() + 3600,
            iat: Utc::now().timestamp(),
        };
        let token = generate_jwt_with_secret(&claims, SECRET).unwrap();
        let decoded = validate_jwt_with_secret(&token, SECRET).unwrap();
        assert_eq!(decoded.id, id);
        assert_eq!(decoded.role, Role::Provider);
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let mut claims = Claims {
            id: Uuid::new_v4(),
            role: Role::User,
            exp: Utc::now().timestamp() + 3600,
            iat: Utc::now().timestamp(),
        };
        let token = generate_jwt_with_secret(&claims, SECRET).unwrap();
        assert!(matches!(validate_jwt_with_secret(&token, "other"), Err(JwtError::InvalidToken(_))));

        claims.exp = Utc::now().timestamp() - 3600;
        let expired = generate_jwt_with_secret(&claims, SECRET).unwrap();
        assert!(matches!(validate_jwt_with_secret(&expired, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn empty_secret_is_refused() {
        let claims = Claims { id: Uuid::new_v4(), role: Role::Admin, exp: 0, iat: 0 };
        assert!(matches!(generate_jwt_with_secret(&claims, ""), Err(JwtError::InvalidSecret)));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = bcrypt::hash("s3cret", 4).unwrap();
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret", "not-a-hash"));
    }
}
