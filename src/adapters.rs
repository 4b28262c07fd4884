use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use time::OffsetDateTime;

use crate::ports;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl ports::TimeProvider for SystemTimeProvider {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> std::io::Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !valid {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid store key '{key}'"),
            ));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl ports::KeyValueStore for FileStore {
    type Error = std::io::Error;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        let path = self.key_path(key)?;
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        let path = self.key_path(key)?;
        atomic_write_bytes(&path, value.as_bytes())
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        let path = self.key_path(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, String>>,
}

#[derive(Debug, thiserror::Error)]
#[error("memory store lock poisoned")]
pub struct MemoryStoreError;

impl ports::KeyValueStore for MemoryStore {
    type Error = MemoryStoreError;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        let blobs = self.blobs.lock().map_err(|_| MemoryStoreError)?;
        Ok(blobs.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        let mut blobs = self.blobs.lock().map_err(|_| MemoryStoreError)?;
        blobs.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        let mut blobs = self.blobs.lock().map_err(|_| MemoryStoreError)?;
        blobs.remove(key);
        Ok(())
    }
}

pub(crate) fn atomic_write_bytes(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::other("missing parent directory"))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("blob.bin");
    let pid = std::process::id();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    for attempt in 0..10u32 {
        let temp_name = format!(".{}.tmp-{}-{}-{}", file_name, pid, nanos, attempt);
        let temp_path = parent.join(temp_name);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
        {
            Ok(mut file) => {
                use std::io::Write as _;
                let written = file
                    .write_all(contents)
                    .and_then(|()| file.flush())
                    .and_then(|()| {
                        drop(file);
                        std::fs::rename(&temp_path, path)
                    });
                if written.is_err() {
                    let _ = std::fs::remove_file(&temp_path);
                }
                return written;
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        ErrorKind::AlreadyExists,
        "failed to create temp file",
    ))
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::ports::KeyValueStore;

    #[test]
    fn file_store__should_read_back_written_blob() {
        // Given
        let dir = create_temp_dir("file-store");
        let store = FileStore::open(&dir).expect("open store");

        // When
        store.put("folders", "[]").expect("put");
        let value = store.get("folders").expect("get");

        // Then
        assert_eq!(value.as_deref(), Some("[]"));
        assert!(dir.join("folders.json").exists());

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[test]
    fn file_store__should_return_none_for_missing_key() {
        // Given
        let dir = create_temp_dir("file-store-missing");
        let store = FileStore::open(&dir).expect("open store");

        // When
        let value = store.get("notifications").expect("get");

        // Then
        assert!(value.is_none());

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[test]
    fn file_store__should_reject_traversal_keys() {
        // Given
        let dir = create_temp_dir("file-store-traversal");
        let store = FileStore::open(&dir).expect("open store");

        // When
        let result = store.put("../outside", "{}");

        // Then
        assert_eq!(
            result.expect_err("invalid key").kind(),
            ErrorKind::InvalidInput
        );

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[test]
    fn atomic_write_bytes__should_remove_temp_file_when_rename_fails() {
        // Given
        let dir = create_temp_dir("atomic-write-cleanup");
        let target = dir.join("blocked");
        std::fs::create_dir_all(target.join("inner")).expect("create blocking dir");

        // When
        let result = atomic_write_bytes(&target, b"[]");

        // Then
        assert!(result.is_err());
        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[test]
    fn memory_store__should_forget_removed_keys() {
        // Given
        let store = MemoryStore::default();
        store.put("users", "[]").expect("put");

        // When
        store.remove("users").expect("remove");

        // Then
        assert!(store.get("users").expect("get").is_none());
    }

    fn create_temp_dir(test_name: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        dir.push(format!("libraryconnect-{}-{}", test_name, nanos));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }
}
