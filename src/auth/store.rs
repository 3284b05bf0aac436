/// Persistence for the single access token
use crate::error::ClientError;
use crate::types::Credential;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Durable key-value slot holding at most one credential
///
/// No validation happens here; a loaded credential may be stale.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<Credential>, ClientError>;

    /// Overwrites any previously stored credential
    fn save(&self, credential: &Credential) -> Result<(), ClientError>;
}

/// In-process store for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Result<Option<Credential>, ClientError> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| ClientError::CredentialStore("memory store poisoned".into()))?;
        Ok(slot.clone())
    }

    fn save(&self, credential: &Credential) -> Result<(), ClientError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| ClientError::CredentialStore("memory store poisoned".into()))?;
        *slot = Some(credential.clone());
        Ok(())
    }
}

#[derive(Default, Serialize, Deserialize)]
struct KeyValueFile {
    #[serde(default)]
    values: BTreeMap<String, String>,
}

/// TOML key-value file, written owner-only on Unix
pub struct FileStore {
    path: PathBuf,
    key: String,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<KeyValueFile, ClientError> {
        if !self.path.exists() {
            return Ok(KeyValueFile::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| {
            ClientError::CredentialStore(format!("read {}: {}", self.path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            ClientError::CredentialStore(format!("parse {}: {}", self.path.display(), e))
        })
    }

    fn write_file(&self, file: &KeyValueFile) -> Result<(), ClientError> {
        let io_err = |e: std::io::Error| {
            ClientError::CredentialStore(format!("{}: {}", self.path.display(), e))
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = toml::to_string(file)
            .map_err(|e| ClientError::CredentialStore(e.to_string()))?;

        // Write a sibling temp file, then rename over the target
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, content).map_err(io_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600)).map_err(io_err)?;
        }

        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl CredentialStore for FileStore {
    fn load(&self) -> Result<Option<Credential>, ClientError> {
        let file = self.read_file()?;
        Ok(file
            .values
            .get(&self.key)
            .map(Credential::new)
            .filter(|c| !c.is_empty()))
    }

    fn save(&self, credential: &Credential) -> Result<(), ClientError> {
        let mut file = self.read_file()?;
        file.values
            .insert(self.key.clone(), credential.expose().to_string());
        self.write_file(&file)?;
        tracing::debug!(path = %self.path.display(), "credential saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_starts_empty() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_none());

        store.save(&Credential::new("abc")).unwrap();
        assert_eq!(store.load().unwrap(), Some(Credential::new("abc")));
    }

    #[test]
    fn test_memory_store_overwrites() {
        let store = MemoryStore::with_credential(Credential::new("old"));
        store.save(&Credential::new("new")).unwrap();
        assert_eq!(store.load().unwrap(), Some(Credential::new("new")));
    }

    #[test]
    fn test_file_store_missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested/credentials.toml"), "access_token");
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/credentials.toml");

        FileStore::new(&path, "access_token")
            .save(&Credential::new("abc123"))
            .unwrap();

        let reopened = FileStore::new(&path, "access_token");
        assert_eq!(reopened.load().unwrap(), Some(Credential::new("abc123")));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_file_store_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        fs::write(&path, "[values]\nwindow_width = \"1000\"\n").unwrap();

        let store = FileStore::new(&path, "access_token");
        store.save(&Credential::new("tok")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("window_width"));
        assert_eq!(store.load().unwrap(), Some(Credential::new("tok")));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        FileStore::new(&path, "access_token")
            .save(&Credential::new("tok"))
            .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_file_store_corrupt_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        fs::write(&path, "not = [valid").unwrap();

        let err = FileStore::new(&path, "access_token").load().unwrap_err();
        assert!(matches!(err, ClientError::CredentialStore(_)));
    }
}
