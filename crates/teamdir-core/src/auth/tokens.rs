use std::sync::Arc;

use tracing::{debug, warn};

use crate::models::{StoredUser, TokenPair, User};
use crate::storage::{
    KeyValueStore, StorageError, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY,
};

/// Typed view over the session keys of a `KeyValueStore`.
///
/// Clone is cheap; clones share the same underlying store.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    pub fn access_token(&self) -> Result<Option<String>, StorageError> {
        self.storage.get(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Result<Option<String>, StorageError> {
        self.storage.get(REFRESH_TOKEN_KEY)
    }

    pub fn set_access_token(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set(ACCESS_TOKEN_KEY, token)
    }

    pub fn user(&self) -> Result<Option<StoredUser>, StorageError> {
        match self.storage.get(USER_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn set_user(&self, user: &User) -> Result<(), StorageError> {
        let json = serde_json::to_string(&StoredUser::new(user.clone()))?;
        self.storage.set(USER_KEY, &json)
    }

    /// Replace the whole session with a fresh token pair and user.
    ///
    /// All three keys are written as one unit; on failure the previous
    /// session is left in place.
    pub fn save_session(&self, tokens: &TokenPair, user: &User) -> Result<(), StorageError> {
        let user_json = serde_json::to_string(&StoredUser::new(user.clone()))?;
        self.storage.set_many(&[
            (ACCESS_TOKEN_KEY, tokens.access.as_str()),
            (REFRESH_TOKEN_KEY, tokens.refresh.as_str()),
            (USER_KEY, user_json.as_str()),
        ])?;
        debug!(username = %user.username, "Session saved");
        Ok(())
    }

    /// Remove the user and both tokens.
    ///
    /// Every key is attempted even if an earlier removal fails; the first
    /// failure is returned.
    pub fn clear(&self) -> Result<(), StorageError> {
        let mut first_error = None;
        for key in [USER_KEY, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "Failed to remove session key");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
