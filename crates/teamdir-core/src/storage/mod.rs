//! Persistent key-value storage for session state.
//!
//! The session keeps three string entries (`user`, `accessToken`,
//! `refreshToken`). Where they live is decided by the backend:
//! - `FileStore`: a JSON document in the platform data directory
//! - `KeyringStore`: one OS keychain entry per key
//! - `MemoryStore`: a process-local map, used by tests
//!
//! A missing key is never an error; it means "signed out".

pub mod file;
pub mod keychain;
pub mod memory;

pub use file::FileStore;
pub use keychain::KeyringStore;
pub use memory::MemoryStore;

use thiserror::Error;
use tracing::warn;

/// Serialized `StoredUser` record
pub const USER_KEY: &str = "user";

/// Bearer token attached to outgoing requests
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Credential exchanged for a new access token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// A string-to-string store that survives process restarts.
///
/// Implementations must be safe to share between tasks; the API client and
/// the session both hold the same store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Write several keys as one unit: either all of them are stored or the
    /// previous values are put back.
    ///
    /// The default writes keys one at a time and rolls back on failure.
    /// Backends that can replace everything in one step should override it.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        let previous = entries
            .iter()
            .map(|(key, _)| self.get(key))
            .collect::<Result<Vec<_>, _>>()?;

        for (written, (key, value)) in entries.iter().enumerate() {
            if let Err(e) = self.set(key, value) {
                for ((key, _), old) in entries[..written].iter().zip(&previous) {
                    let restored = match old {
                        Some(old) => self.set(key, old),
                        None => self.remove(key),
                    };
                    if let Err(restore_err) = restored {
                        warn!(key, error = %restore_err, "Failed to roll back session key");
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }
}
