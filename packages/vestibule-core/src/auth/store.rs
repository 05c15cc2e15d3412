//! Persistent session storage with platform keyring and file-based fallback.
//!
//! The token, the cached user record and the login method are one composite
//! record: they are written together on commit and removed together on
//! logout, so a reader can never observe a partial session.
//!
//! Storage priority:
//! 1. Platform keyring (if `keyring-storage` feature enabled and available)
//! 2. File-based storage under the platform config directory

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::types::{LoginType, UserProfile};

#[cfg(feature = "keyring-storage")]
use keyring::Entry;

/// Service name used for keyring storage
#[cfg(feature = "keyring-storage")]
const KEYRING_SERVICE: &str = "vestibule";
/// Username used for keyring entry
#[cfg(feature = "keyring-storage")]
const KEYRING_USER: &str = "session";

/// File name of the persisted session record
const SESSION_FILE: &str = ".session";

/// The composite session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub user: UserProfile,
    pub login_type: LoginType,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access session storage: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode session record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("no usable storage location")]
    NoStorageDir,

    #[cfg(feature = "keyring-storage")]
    #[error("keyring failure: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Durable key-value home of the session record.
///
/// `save` persists the complete record as a single unit; partial writes are
/// not expressible through this interface.
pub trait SessionStore: Send + Sync {
    fn save(&self, session: &StoredSession) -> Result<(), StoreError>;
    fn load(&self) -> Result<Option<StoredSession>, StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// Get the vestibule config directory
fn get_config_dir() -> Result<PathBuf, StoreError> {
    let config_dir = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .ok_or(StoreError::NoStorageDir)?;
    Ok(config_dir.join("vestibule"))
}

/// File-backed store, usable on headless machines. With the
/// `keyring-storage` feature the platform keyring fronts the file, which
/// remains as backup.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store under the platform config directory, creating it if needed.
    pub fn new() -> Result<Self, StoreError> {
        let dir = get_config_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self {
            path: dir.join(SESSION_FILE),
        })
    }

    /// Store inside an explicit directory. Used by tests and embedders with
    /// their own data layout.
    pub fn at(dir: &Path) -> Self {
        Self {
            path: dir.join(SESSION_FILE),
        }
    }

    fn write_file(&self, json: &str) -> Result<(), StoreError> {
        // Restrictive permissions on Unix before writing
        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)?;
            let mut file = std::io::BufWriter::new(file);
            file.write_all(json.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&self.path, json)?;
        }

        tracing::debug!("Session record saved to file: {:?}", self.path);
        Ok(())
    }

    fn read_file(&self) -> Result<Option<StoredSession>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let session: StoredSession = serde_json::from_str(&content)?;
        Ok(Some(session))
    }

    fn remove_file(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    #[cfg(feature = "keyring-storage")]
    fn keyring_entry() -> Result<Entry, keyring::Error> {
        Entry::new(KEYRING_SERVICE, KEYRING_USER)
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, session: &StoredSession) -> Result<(), StoreError> {
        let json = serde_json::to_string(session)?;

        #[cfg(feature = "keyring-storage")]
        match Self::keyring_entry().and_then(|entry| entry.set_password(&json)) {
            Ok(()) => tracing::debug!("Session record saved to keyring"),
            Err(e) => {
                tracing::warn!("Failed to save session to keyring: {e}, using file storage");
            }
        }

        // The file always carries the record, as keyring backup or primary.
        self.write_file(&json)
    }

    fn load(&self) -> Result<Option<StoredSession>, StoreError> {
        #[cfg(feature = "keyring-storage")]
        match Self::keyring_entry().and_then(|entry| entry.get_password()) {
            Ok(json) => {
                let session: StoredSession = serde_json::from_str(&json)?;
                return Ok(Some(session));
            }
            Err(keyring::Error::NoEntry) => {
                tracing::debug!("No session in keyring, trying file fallback");
            }
            Err(e) => {
                tracing::warn!("Failed to load session from keyring: {e}, trying file fallback");
            }
        }

        self.read_file()
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.remove_file()?;

        #[cfg(feature = "keyring-storage")]
        match Self::keyring_entry().and_then(|entry| entry.delete_credential()) {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(e) => return Err(StoreError::Keyring(e)),
        }

        Ok(())
    }
}

/// In-memory store for tests and ephemeral embedders (no reload survival).
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<StoredSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &StoredSession) -> Result<(), StoreError> {
        *self.inner.lock().unwrap() = Some(session.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<StoredSession>, StoreError> {
        Ok(self.inner.lock().unwrap().clone())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.inner.lock().unwrap() = None;
        Ok(())
    }
}
