//! Durable credential storage: one slot for the opaque session token, one for
//! the cached user profile, always cleared together.
//!
//! The trait boundary is deliberately infallible. A missing or corrupt stored
//! value reads as absent and failed writes are swallowed (logged at debug
//! level), matching the contract that no credential operation may take the
//! client down. Both the session manager and the transport may call `clear`,
//! so every implementation keeps it idempotent.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::PoisonError;

use serde::{Deserialize, Serialize};
use tasksync_core::User;
use tracing::debug;

/// Storage contract for the session credential and cached profile.
pub trait CredentialStore: Send + Sync {
    fn token(&self) -> Option<String>;
    fn set_token(&self, token: &str);
    fn user(&self) -> Option<User>;
    fn set_user(&self, user: &User);
    /// Remove token and cached user together. Idempotent.
    fn clear(&self);
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    token: String,
}

const TOKEN_FILE: &str = "token.json";
const USER_FILE: &str = "user.json";

/// File-backed store, persisting `token.json` and `user.json` under a caller
/// chosen directory.
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, file: &str) -> Option<T> {
        let path = self.dir.join(file);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    debug!(?path, %err, "failed to read credential file");
                }
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(err) => {
                // Corrupt stored data is treated as absent, not an error.
                debug!(?path, %err, "ignoring corrupt credential file");
                None
            }
        }
    }

    fn write_json<T: Serialize>(&self, file: &str, value: &T) {
        if let Err(err) = std::fs::create_dir_all(&self.dir) {
            debug!(dir = ?self.dir, %err, "failed to create credential directory");
            return;
        }
        let path = self.dir.join(file);
        match serde_json::to_string_pretty(value) {
            Ok(contents) => {
                if let Err(err) = std::fs::write(&path, contents) {
                    debug!(?path, %err, "failed to write credential file");
                }
            }
            Err(err) => debug!(?path, %err, "failed to serialize credential"),
        }
    }

    fn remove(&self, file: &str) {
        let path = self.dir.join(file);
        if let Err(err) = std::fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                debug!(?path, %err, "failed to remove credential file");
            }
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CredentialStore for FileCredentialStore {
    fn token(&self) -> Option<String> {
        self.read_json::<StoredToken>(TOKEN_FILE)
            .map(|stored| stored.token)
    }

    fn set_token(&self, token: &str) {
        self.write_json(
            TOKEN_FILE,
            &StoredToken {
                token: token.to_string(),
            },
        );
    }

    fn user(&self) -> Option<User> {
        self.read_json(USER_FILE)
    }

    fn set_user(&self, user: &User) {
        self.write_json(USER_FILE, user);
    }

    fn clear(&self) {
        self.remove(TOKEN_FILE);
        self.remove(USER_FILE);
    }
}

/// In-memory store for tests and short-lived sessions.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    token: Option<String>,
    user: Option<User>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    fn set_token(&self, token: &str) {
        self.lock().token = Some(token.to_string());
    }

    fn user(&self) -> Option<User> {
        self.lock().user.clone()
    }

    fn set_user(&self, user: &User) {
        self.lock().user = Some(user.clone());
    }

    fn clear(&self) {
        let mut state = self.lock();
        state.token = None;
        state.user = None;
    }
}

/// Store for non-interactive contexts with no durable medium: every read
/// returns absent and every write is a no-op.
pub struct NoopCredentialStore;

impl CredentialStore for NoopCredentialStore {
    fn token(&self) -> Option<String> {
        None
    }

    fn set_token(&self, _token: &str) {}

    fn user(&self) -> Option<User> {
        None
    }

    fn set_user(&self, _user: &User) {}

    fn clear(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: "u-1".to_string(),
            email: "test@example.com".to_string(),
            name: Some("Test User".to_string()),
        }
    }

    #[test]
    fn file_store_round_trips_token_and_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());

        assert!(store.token().is_none());
        assert!(store.user().is_none());

        store.set_token("opaque-token");
        store.set_user(&sample_user());

        assert_eq!(store.token().as_deref(), Some("opaque-token"));
        assert_eq!(store.user(), Some(sample_user()));
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileCredentialStore::new(dir.path());
            store.set_token("opaque-token");
        }
        let reopened = FileCredentialStore::new(dir.path());
        assert_eq!(reopened.token().as_deref(), Some("opaque-token"));
    }

    #[test]
    fn clear_removes_both_slots_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        store.set_token("opaque-token");
        store.set_user(&sample_user());

        store.clear();
        assert!(store.token().is_none());
        assert!(store.user().is_none());

        store.clear();
        assert!(store.token().is_none());
    }

    #[test]
    fn corrupt_user_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(USER_FILE), "{not json").unwrap();

        let store = FileCredentialStore::new(dir.path());
        assert!(store.user().is_none());
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryCredentialStore::new();
        store.set_token("t");
        store.set_user(&sample_user());
        assert_eq!(store.token().as_deref(), Some("t"));
        store.clear();
        assert!(store.token().is_none());
        assert!(store.user().is_none());
    }

    #[test]
    fn noop_store_reads_absent() {
        let store = NoopCredentialStore;
        store.set_token("t");
        store.set_user(&sample_user());
        assert!(store.token().is_none());
        assert!(store.user().is_none());
    }
}
