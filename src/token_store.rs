//! Credential storage
//!
//! The access token, refresh token and cached user record live behind the
//! [`CredentialStore`] trait so the client can run against memory, a file,
//! or anything the embedding application provides.

use crate::error::{ClientError, Result};
use crate::types::{TokenPair, UserInfo};
use papaya::HashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Keys under which credentials are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CredentialKey {
    AccessToken,
    RefreshToken,
    User,
}

impl CredentialKey {
    pub const ALL: [CredentialKey; 3] = [
        CredentialKey::AccessToken,
        CredentialKey::RefreshToken,
        CredentialKey::User,
    ];

    /// Storage name of the key
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKey::AccessToken => "token",
            CredentialKey::RefreshToken => "refreshToken",
            CredentialKey::User => "user",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

/// Client-side credential storage
pub trait CredentialStore: Send + Sync + 'static {
    fn get(&self, key: CredentialKey) -> Option<String>;

    fn set(&self, key: CredentialKey, value: String) -> Result<()>;

    fn remove(&self, key: CredentialKey) -> Result<()>;

    /// Remove every stored credential
    fn clear(&self) -> Result<()> {
        for key in CredentialKey::ALL {
            self.remove(key)?;
        }
        Ok(())
    }

    fn access_token(&self) -> Option<String> {
        self.get(CredentialKey::AccessToken).filter(|t| !t.is_empty())
    }

    fn refresh_token(&self) -> Option<String> {
        self.get(CredentialKey::RefreshToken).filter(|t| !t.is_empty())
    }

    /// Persist both halves of a token pair
    fn store_tokens(&self, tokens: &TokenPair) -> Result<()> {
        self.set(CredentialKey::AccessToken, tokens.access_token.clone())?;
        self.set(CredentialKey::RefreshToken, tokens.refresh_token.clone())
    }

    fn cached_user(&self) -> Option<UserInfo> {
        self.get(CredentialKey::User)
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    fn store_user(&self, user: &UserInfo) -> Result<()> {
        self.set(CredentialKey::User, serde_json::to_string(user)?)
    }
}

/// Thread-safe in-memory credential store using Papaya HashMap
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    values: Arc<HashMap<CredentialKey, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all stored values
    pub fn entries(&self) -> BTreeMap<CredentialKey, String> {
        self.values
            .pin()
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.pin().len() == 0
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: CredentialKey) -> Option<String> {
        self.values.pin().get(&key).cloned()
    }

    fn set(&self, key: CredentialKey, value: String) -> Result<()> {
        self.values.pin().insert(key, value);
        Ok(())
    }

    fn remove(&self, key: CredentialKey) -> Result<()> {
        self.values.pin().remove(&key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.values.pin().clear();
        Ok(())
    }
}

/// Credential store persisted as a JSON object on disk
///
/// Reads are served from memory; every mutation rewrites the file.
pub struct FileCredentialStore {
    path: PathBuf,
    cache: MemoryCredentialStore,
    write_lock: std::sync::Mutex<()>,
}

impl FileCredentialStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cache = MemoryCredentialStore::new();

        match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let entries: BTreeMap<String, String> = serde_json::from_str(&raw)?;
                for (name, value) in entries {
                    match CredentialKey::from_name(&name) {
                        Some(key) => cache.set(key, value)?,
                        None => debug!(key = %name, "Ignoring unknown credential key"),
                    }
                }
                debug!(path = %path.display(), "Loaded stored credentials");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ClientError::Storage(format!("{}: {e}", path.display()))),
        }

        Ok(Self {
            path,
            cache,
            write_lock: std::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let entries: BTreeMap<&str, String> = self
            .cache
            .entries()
            .into_iter()
            .map(|(key, value)| (key.as_str(), value))
            .collect();
        let raw = serde_json::to_string_pretty(&entries)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClientError::Storage(format!("{}: {e}", parent.display())))?;
        }
        std::fs::write(&self.path, raw)
            .map_err(|e| ClientError::Storage(format!("{}: {e}", self.path.display())))
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: CredentialKey) -> Option<String> {
        self.cache.get(key)
    }

    fn set(&self, key: CredentialKey, value: String) -> Result<()> {
        self.cache.set(key, value)?;
        self.persist()
    }

    fn remove(&self, key: CredentialKey) -> Result<()> {
        self.cache.remove(key)?;
        self.persist()
    }

    fn clear(&self) -> Result<()> {
        self.cache.clear()?;
        self.persist()
    }
}
