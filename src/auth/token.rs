//! JWT session tokens

use crate::error::{ClaimsightError, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Token lifetime in seconds (24 hours).
const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Claims embedded in an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub is_admin: bool,
    pub iat: usize,
    pub exp: usize,
}

/// Issues and verifies HS256 access tokens
#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Create a signed token for the given subject.
    pub fn create_token(&self, email: &str, is_admin: bool) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: email.to_string(),
            is_admin,
            iat: now as usize,
            exp: (now + TOKEN_TTL_SECS) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ClaimsightError::TokenInvalid(e.to_string()))
    }

    /// Verify a token's signature and expiry, returning its claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => ClaimsightError::TokenExpired,
            _ => ClaimsightError::TokenInvalid(e.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let issuer = TokenIssuer::new("test-secret");
        let token = issuer.create_token("user@example.com", true).unwrap();
        let claims = issuer.verify_token(&token).unwrap();

        assert_eq!(claims.sub, "user@example.com");
        assert!(claims.is_admin);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let issuer = TokenIssuer::new("secret-a");
        let token = issuer.create_token("user@example.com", false).unwrap();

        let other = TokenIssuer::new("secret-b");
        assert!(matches!(
            other.verify_token(&token),
            Err(ClaimsightError::TokenInvalid(_))
        ));
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        let issuer = TokenIssuer::new("secret");
        assert!(issuer.verify_token("not-a-token").is_err());
    }
}
