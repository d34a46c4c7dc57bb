//! Session-scoped credential storage.
//!
//! The store keeps exactly one bearer credential under a fixed key. Storage
//! backends mirror the browser `sessionStorage` API so the lifetime of the
//! credential is decided by where the backend keeps its data, not by the
//! store itself.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

/// Key the credential is stored under.
pub const STORAGE_KEY: &str = "access";

/// Opaque signed bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "Credential({}...)", prefix)
    }
}

impl From<&str> for Credential {
    fn from(s: &str) -> Self {
        Credential::new(s)
    }
}

impl From<String> for Credential {
    fn from(s: String) -> Self {
        Credential::new(s)
    }
}

/// Key/value storage with the browser `sessionStorage` contract.
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// In-process storage. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.items
            .lock()
            .map_err(|_| Error::Storage("memory storage lock poisoned".to_string()))
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// One file per key inside a directory.
///
/// Place the directory somewhere cleared at logout or reboot (a runtime
/// directory) to get session lifetime.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl SessionStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        fs::write(&path, value)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Holds the single bearer credential.
#[derive(Debug, Clone)]
pub struct TokenStore<S> {
    storage: S,
}

impl<S: SessionStorage> TokenStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Replace the stored credential.
    pub fn save(&self, credential: &Credential) -> Result<()> {
        self.storage.set_item(STORAGE_KEY, credential.as_str())
    }

    /// Stored credential, if any. Blank values count as absent.
    pub fn load(&self) -> Result<Option<Credential>> {
        Ok(self
            .storage
            .get_item(STORAGE_KEY)?
            .map(Credential::new)
            .filter(|c| !c.as_str().is_empty()))
    }

    pub fn clear(&self) -> Result<()> {
        self.storage.remove_item(STORAGE_KEY)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_round_trip_and_clear() {
        let store = TokenStore::new(MemoryStorage::new());
        assert!(store.load().unwrap().is_none());

        store.save(&Credential::new("aaa.bbb.ccc")).unwrap();
        assert_eq!(store.load().unwrap(), Some(Credential::new("aaa.bbb.ccc")));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        // clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_save_replaces_previous() {
        let store = TokenStore::new(MemoryStorage::new());
        store.save(&Credential::new("first")).unwrap();
        store.save(&Credential::new("second")).unwrap();
        assert_eq!(store.load().unwrap().unwrap().as_str(), "second");
    }

    #[test]
    fn test_memory_clones_share_items() {
        let storage = MemoryStorage::new();
        let store = TokenStore::new(storage.clone());
        store.save(&Credential::new("tok")).unwrap();
        assert_eq!(storage.get_item(STORAGE_KEY).unwrap().as_deref(), Some("tok"));
    }

    #[test]
    fn test_blank_value_is_absent() {
        let storage = MemoryStorage::new();
        storage.set_item(STORAGE_KEY, "  \n").unwrap();
        assert!(TokenStore::new(storage).load().unwrap().is_none());
    }

    #[test]
    fn test_file_storage() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(FileStorage::new(dir.path().join("session")));

        assert!(store.load().unwrap().is_none());
        store.save(&Credential::new("aaa.bbb.ccc")).unwrap();
        assert_eq!(store.load().unwrap().unwrap().as_str(), "aaa.bbb.ccc");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let meta = fs::metadata(dir.path().join("session").join(STORAGE_KEY)).unwrap();
            assert_eq!(meta.permissions().mode() & 0o777, 0o600);
        }

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let cred = Credential::new("eyJhbGciOiJIUzI1NiJ9.secret.sig");
        let shown = format!("{:?}", cred);
        assert!(!shown.contains("secret"));
        assert!(shown.starts_with("Credential(eyJhbGci"));
    }
}
