//! JSON file store backing the CLI session.
//!
//! The whole map is rewritten on every change through a temp file and a
//! rename, so a crash never leaves a half-written session behind.

use super::TokenStore;
use crate::error::ClientError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, loading existing entries.
    ///
    /// A missing file is an empty store. A corrupt file is logged and treated
    /// as empty; the next write replaces it. A file that cannot be read at
    /// all is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Discarding corrupt session file");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(ClientError::Storage(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), ClientError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = entries.clone();
        change(&mut next);
        write_atomic(&self.path, &next)?;
        *entries = next;
        Ok(())
    }
}

impl TokenStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), ClientError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

fn write_atomic(path: &Path, entries: &BTreeMap<String, String>) -> Result<(), ClientError> {
    let storage_err = |e: std::io::Error| {
        ClientError::Storage(format!("cannot write {}: {}", path.display(), e))
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(storage_err)?;
    }

    let body = serde_json::to_vec_pretty(entries)
        .map_err(|e| ClientError::Storage(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body).map_err(storage_err)?;
    restrict_permissions(&tmp);
    fs::rename(&tmp, path).map_err(storage_err)
}

// Tokens are credentials; keep them private to the user.
#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!(path = %path.display(), error = %e, "Could not restrict session file permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}
