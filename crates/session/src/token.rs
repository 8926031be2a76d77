//! Persisted bearer token and user record.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, DecodingKey, Validation};
use pantry_api::User;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::storage::Storage;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

/// Expiry (seconds since the epoch) read from an unverified token.
///
/// The client never holds the signing key, so only the payload is decoded.
pub fn expires_at(token: &str) -> Option<i64> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    match decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => data.claims.exp,
        Err(error) => {
            debug!(%error, "token payload unreadable");
            None
        }
    }
}

/// Whether `token` should be considered dead at `now` (epoch seconds).
///
/// Missing, malformed and `exp`-less tokens all count as expired.
pub fn is_expired_at(token: Option<&str>, now: i64) -> bool {
    match token.and_then(expires_at) {
        Some(exp) => exp <= now,
        None => true,
    }
}

pub fn is_expired(token: Option<&str>) -> bool {
    is_expired_at(token, now_seconds())
}

fn now_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

/// Typed access to the token and user keys of a [`Storage`].
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn Storage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Stored token. A read failure is logged and reported as absent.
    pub fn get(&self) -> Option<String> {
        match self.storage.get(TOKEN_KEY) {
            Ok(token) => token.filter(|token| !token.is_empty()),
            Err(error) => {
                warn!(%error, "failed to read stored token");
                None
            }
        }
    }

    pub fn set(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set(TOKEN_KEY, token)
    }

    pub fn remove(&self) -> Result<(), StorageError> {
        self.storage.remove(TOKEN_KEY)
    }

    /// Stored user, or `None` when absent or not valid user JSON.
    pub fn user(&self) -> Option<User> {
        let raw = match self.storage.get(USER_KEY) {
            Ok(raw) => raw?,
            Err(error) => {
                warn!(%error, "failed to read stored user");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(error) => {
                warn!(%error, "stored user record is not valid JSON");
                None
            }
        }
    }

    pub fn set_user(&self, user: &User) -> Result<(), StorageError> {
        self.storage.set(USER_KEY, &serde_json::to_string(user)?)
    }

    pub fn remove_user(&self) -> Result<(), StorageError> {
        self.storage.remove(USER_KEY)
    }
}
