//! Persisted login session.
//!
//! The bearer token lives in the same key-value store as the offline queue.

use serde::{Deserialize, Serialize};

use super::types::AuthResponse;
use crate::error::MedivaultError;
use crate::storage::KeyValueStore;

/// Store key for the bearer token.
pub const TOKEN_KEY: &str = "token";
/// Store key for the signed-in user.
pub const USER_KEY: &str = "user";

/// The signed-in user, without the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub role: String,
}

/// Session token persistence.
pub struct Session<K> {
    store: K,
}

impl<K: KeyValueStore> Session<K> {
    #[must_use]
    pub const fn new(store: K) -> Self {
        Self { store }
    }

    /// The stored bearer token, if logged in.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn token(&self) -> Result<Option<String>, MedivaultError> {
        self.store.get(TOKEN_KEY)
    }

    /// The stored user, if logged in.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the value is corrupt.
    pub fn user(&self) -> Result<Option<SessionUser>, MedivaultError> {
        self.store
            .get(USER_KEY)?
            .map(|json| serde_json::from_str(&json).map_err(MedivaultError::from))
            .transpose()
    }

    /// Persist a successful login.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn save(&self, auth: &AuthResponse) -> Result<SessionUser, MedivaultError> {
        let user = SessionUser {
            user_id: auth.user_id,
            email: auth.email.clone(),
            name: auth.name.clone(),
            role: auth.role.clone(),
        };
        self.store.set(TOKEN_KEY, &auth.token)?;
        self.store.set(USER_KEY, &serde_json::to_string(&user)?)?;
        Ok(user)
    }

    /// Forget the session. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn clear(&self) -> Result<bool, MedivaultError> {
        let had_token = self.store.remove(TOKEN_KEY)?;
        self.store.remove(USER_KEY)?;
        Ok(had_token)
    }
}
