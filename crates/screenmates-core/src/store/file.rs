//! File-backed shared state: one JSON-ish text file per key under
//! `<data_dir>/<namespace>/`.
//!
//! Writes go to a unique temp file in the same directory and are renamed
//! over the target, so a concurrent reader in another process sees either
//! the previous value or the new one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::SharedStateStore;
use crate::error::StateStoreError;

#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn open(data_dir: &Path, namespace: &str) -> Result<Self, StateStoreError> {
        validate_key(namespace)?;
        let dir = data_dir.join(namespace);
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StateStoreError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

/// Keys become file names, so anything that could escape the namespace
/// directory is rejected.
fn validate_key(key: &str) -> Result<(), StateStoreError> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !key.starts_with('.');
    if ok {
        Ok(())
    } else {
        Err(StateStoreError::InvalidKey(key.to_string()))
    }
}

impl SharedStateStore for FileStateStore {
    fn get(&self, key: &str) -> Result<Option<String>, StateStoreError> {
        match std::fs::read_to_string(self.path_for(key)?) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StateStoreError> {
        let target = self.path_for(key)?;
        let temp = self
            .dir
            .join(format!(".{key}.{}.tmp", uuid::Uuid::new_v4().simple()));
        std::fs::write(&temp, value)?;
        if let Err(e) = std::fs::rename(&temp, &target) {
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StateStoreError> {
        match std::fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_set_get_remove() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::open(dir.path(), "group.screenmates").unwrap();

        assert_eq!(store.get("DailyBlocksUsed").unwrap(), None);
        store.set("DailyBlocksUsed", "7").unwrap();
        assert_eq!(store.get("DailyBlocksUsed").unwrap().as_deref(), Some("7"));

        store.remove("DailyBlocksUsed").unwrap();
        assert_eq!(store.get("DailyBlocksUsed").unwrap(), None);
        // Removing twice is fine
        store.remove("DailyBlocksUsed").unwrap();
    }

    #[test]
    fn test_two_handles_share_values() {
        let dir = tempdir().unwrap();
        let app = FileStateStore::open(dir.path(), "shared").unwrap();
        let monitor = FileStateStore::open(dir.path(), "shared").unwrap();

        monitor.set("DailyBlocksUsed", "3").unwrap();
        assert_eq!(app.get("DailyBlocksUsed").unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn test_rejects_path_keys() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::open(dir.path(), "shared").unwrap();
        assert!(matches!(
            store.set("../escape", "x"),
            Err(StateStoreError::InvalidKey(_))
        ));
        assert!(store.get("").is_err());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::open(dir.path(), "shared").unwrap();
        store.set("A", "1").unwrap();
        store.set("A", "2").unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(store.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
