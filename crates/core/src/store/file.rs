//! Directory-backed handle store.
//!
//! Each record lives in `<dir>/<name>.pid` as a small JSON document. Writes go
//! through a temporary file and a rename so a crash never leaves a half
//! written record behind.

use crate::store::{HandleStore, StoreError, StoreResult};
use ds_protocol::ServiceHandle;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

const RECORD_EXTENSION: &str = "pid";

/// Handle store keeping one file per service in a directory.
#[derive(Debug, Clone)]
pub struct FileHandleStore {
    dir: PathBuf,
}

impl FileHandleStore {
    /// Create a store rooted at `dir`.
    ///
    /// The directory is created on the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `name`.
    pub fn record_path(&self, name: &str) -> StoreResult<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{name}.{RECORD_EXTENSION}")))
    }
}

fn validate_name(name: &str) -> StoreResult<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if invalid {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl HandleStore for FileHandleStore {
    fn get(&self, name: &str) -> StoreResult<Option<ServiceHandle>> {
        let path = self.record_path(name)?;

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(StoreError::Malformed {
                    path,
                    reason: e.to_string(),
                })
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let handle: ServiceHandle =
            serde_json::from_str(&content).map_err(|e| StoreError::Malformed {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if handle.name != name {
            return Err(StoreError::Malformed {
                path,
                reason: format!("record belongs to '{}'", handle.name),
            });
        }

        Ok(Some(handle))
    }

    fn put(&self, handle: &ServiceHandle) -> StoreResult<()> {
        let path = self.record_path(&handle.name)?;

        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let content =
            serde_json::to_vec_pretty(handle).map_err(|source| StoreError::Encode {
                name: handle.name.clone(),
                source,
            })?;

        let tmp = path.with_extension(format!("{RECORD_EXTENSION}.tmp"));
        std::fs::write(&tmp, content).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| StoreError::Io { path, source })
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        let path = self.record_path(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn list(&self) -> StoreResult<Vec<ServiceHandle>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut handles = Vec::new();

        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|source| StoreError::DirectoryWalk {
                path: self.dir.clone(),
                source,
            })?;

            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match self.get(name) {
                Ok(Some(handle)) => handles.push(handle),
                Ok(None) => {}
                Err(e) if e.is_malformed() => warn!(error = %e, "skipping handle record"),
                Err(StoreError::InvalidName(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_get_missing_record() {
        let dir = tempdir().unwrap();
        let store = FileHandleStore::new(dir.path());

        assert!(store.get("orchestrator").unwrap().is_none());
    }

    #[test]
    fn test_put_then_get() {
        let dir = tempdir().unwrap();
        let store = FileHandleStore::new(dir.path().join("logs"));

        let handle = ServiceHandle::process("orchestrator", 1234);
        store.put(&handle).unwrap();

        assert!(dir.path().join("logs/orchestrator.pid").exists());
        assert_eq!(store.get("orchestrator").unwrap(), Some(handle));
    }

    #[test]
    fn test_records_survive_a_new_store_instance() {
        let dir = tempdir().unwrap();
        FileHandleStore::new(dir.path())
            .put(&ServiceHandle::process("runner", 77))
            .unwrap();

        let reopened = FileHandleStore::new(dir.path());
        let handle = reopened.get("runner").unwrap().unwrap();
        assert_eq!(handle.pid(), Some(77));
    }

    #[test]
    fn test_put_replaces_existing_record() {
        let dir = tempdir().unwrap();
        let store = FileHandleStore::new(dir.path());

        store.put(&ServiceHandle::process("runner", 1)).unwrap();
        store.put(&ServiceHandle::process("runner", 2)).unwrap();

        assert_eq!(store.get("runner").unwrap().unwrap().pid(), Some(2));
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = FileHandleStore::new(dir.path());

        store.put(&ServiceHandle::process("runner", 1)).unwrap();
        store.delete("runner").unwrap();
        store.delete("runner").unwrap();

        assert!(store.get("runner").unwrap().is_none());
    }

    #[test]
    fn test_malformed_record() {
        let dir = tempdir().unwrap();
        let store = FileHandleStore::new(dir.path());
        fs::write(dir.path().join("runner.pid"), "not json").unwrap();

        let err = store.get("runner").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_record_for_another_service_is_malformed() {
        let dir = tempdir().unwrap();
        let store = FileHandleStore::new(dir.path());
        store.put(&ServiceHandle::process("runner", 5)).unwrap();
        fs::rename(dir.path().join("runner.pid"), dir.path().join("other.pid")).unwrap();

        assert!(store.get("other").unwrap_err().is_malformed());
    }

    #[test]
    fn test_list_skips_malformed_and_foreign_files() {
        let dir = tempdir().unwrap();
        let store = FileHandleStore::new(dir.path());

        store.put(&ServiceHandle::process("orchestrator", 10)).unwrap();
        store
            .put(&ServiceHandle::container("rivet_postgres", "rivet_postgres"))
            .unwrap();
        fs::write(dir.path().join("broken.pid"), "{").unwrap();
        fs::write(dir.path().join("orchestrator.log"), "log output").unwrap();

        let names: Vec<String> = store.list().unwrap().into_iter().map(|h| h.name).collect();
        assert_eq!(names, vec!["orchestrator", "rivet_postgres"]);
    }

    #[test]
    fn test_list_without_directory() {
        let dir = tempdir().unwrap();
        let store = FileHandleStore::new(dir.path().join("missing"));

        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let dir = tempdir().unwrap();
        let store = FileHandleStore::new(dir.path());

        for name in ["", "..", "a/b", "a\\b"] {
            assert!(matches!(
                store.get(name),
                Err(StoreError::InvalidName(_))
            ));
        }
    }
}
