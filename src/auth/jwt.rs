//! Bearer token signing and verification
//!
//! HS256 JWTs with the user's email as subject and an expiry derived from
//! configuration. Any decode failure (bad signature, malformed token,
//! expired) collapses to `Unauthorized`; the caller never learns which.

use crate::errors::{AppError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User email
    pub sub: String,
    /// Expiry, seconds since epoch
    pub exp: i64,
    /// Issued at, seconds since epoch
    pub iat: i64,
}

/// Sign an access token for `email`, valid for `expire_minutes`
pub fn create_token(email: &str, secret: &str, expire_minutes: i64) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: email.to_string(),
        exp: (now + Duration::minutes(expire_minutes)).timestamp(),
        iat: now.timestamp(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Verify a token and return its claims
pub fn decode_token(token: &str, secret: &str) -> Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized)?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn test_round_trip() {
        let token = create_token("ada@example.com", SECRET, 30).unwrap();
        let claims = decode_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "ada@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let token = create_token("ada@example.com", SECRET, 30).unwrap();
        let err = decode_token(&token, "other-secret").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[test]
    fn test_expired_token_is_unauthorized() {
        // Validation::default() keeps 60s leeway; go well past it.
        let token = create_token("ada@example.com", SECRET, -5).unwrap();
        let err = decode_token(&token, SECRET).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[test]
    fn test_garbage_token_is_unauthorized() {
        let err = decode_token("not-a-jwt", SECRET).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }
}
