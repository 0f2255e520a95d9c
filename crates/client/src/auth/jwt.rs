//! JWT inspection for client-held tokens
//!
//! The client never holds the signing secret, so tokens are decoded without
//! signature verification purely to read their expiry. The server remains
//! the authority on whether a token is accepted.

use std::collections::HashSet;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Claims the client cares about in a server-issued token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Expiration (unix seconds), always present once inspected
    #[serde(default)]
    pub exp: Option<i64>,
    /// Issued at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// User ID as issued by the marketplace API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Standard subject claim, used by some issuers instead of `id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// User role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl TokenClaims {
    pub fn user_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.sub.as_deref())
    }

    /// Whether the token is expired at `now`
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.exp.map_or(true, |exp| exp <= now.unix_timestamp())
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }
}

/// Decode a token's claims without verifying its signature or expiry
pub fn inspect_token(token: &str) -> Result<TokenClaims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let claims = decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| JwtError::Malformed(e.to_string()))?;

    if claims.exp.is_none() {
        return Err(JwtError::MissingExpiry);
    }
    Ok(claims)
}

/// Decode a token and reject it if it has expired
pub fn validate_expiry(token: &str) -> Result<TokenClaims, JwtError> {
    let claims = inspect_token(token)?;
    if claims.is_expired() {
        return Err(JwtError::Expired);
    }
    Ok(claims)
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token has expired")]
    Expired,
    #[error("Token has no expiry claim")]
    MissingExpiry,
    #[error("Malformed token: {0}")]
    Malformed(String),
}
