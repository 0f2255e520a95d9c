//! Auth token persistence
//!
//! Keeps the bearer token in the profile's durable store and hands it out
//! only while it is unexpired.

use std::sync::Arc;

use prolink_shared::{KeyValueStore, StoreResult};

use super::jwt::{validate_expiry, JwtError, TokenClaims};

/// Storage key for the bearer token
pub const TOKEN_KEY: &str = "token";

/// Token store backed by the durable key-value store
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persist a freshly issued token
    pub fn set(&self, token: &str) -> StoreResult<()> {
        self.store.put(TOKEN_KEY, token)
    }

    /// Forget the stored token
    pub fn clear(&self) -> StoreResult<()> {
        self.store.remove(TOKEN_KEY)
    }

    /// Raw stored token, without any validation
    pub fn raw(&self) -> StoreResult<Option<String>> {
        self.store.get(TOKEN_KEY)
    }

    /// The stored token and its claims, if present and unexpired
    ///
    /// Expired or undecodable tokens are removed from storage so the next
    /// caller does not pay for decoding them again.
    pub fn valid_token(&self) -> StoreResult<Option<(String, TokenClaims)>> {
        let Some(token) = self.store.get(TOKEN_KEY)? else {
            return Ok(None);
        };

        match validate_expiry(&token) {
            Ok(claims) => Ok(Some((token, claims))),
            Err(e) => {
                match &e {
                    JwtError::Expired => tracing::debug!("Stored token expired, clearing"),
                    _ => tracing::warn!(error = %e, "Stored token unreadable, clearing"),
                }
                self.store.remove(TOKEN_KEY)?;
                Ok(None)
            }
        }
    }
}
