use crate::ports::KeyValueStore;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub const NOTIFICATIONS: &str = "notifications";
pub const UPLOADED_DOCUMENTS: &str = "uploadedDocuments";
pub const TRASHED_DOCUMENTS: &str = "trashedDocuments";
pub const FOLDERS: &str = "folders";
pub const USERS: &str = "users";
pub const AUDIT_LOGS: &str = "auditLogs";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend failed on '{key}': {source}")]
    Backend {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("blob '{key}' is not valid JSON: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode blob '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Typed JSON view over a [`KeyValueStore`].
#[derive(Debug)]
pub struct Store<K> {
    backend: K,
}

impl<K: KeyValueStore> Store<K> {
    pub fn new(backend: K) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &K {
        &self.backend
    }

    /// Reads `key`, treating a missing blob as `T::default()`.
    pub fn load<T>(&self, key: &str) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Default,
    {
        let raw = self.backend.get(key).map_err(|err| StoreError::Backend {
            key: key.to_string(),
            source: Box::new(err),
        })?;
        let Some(raw) = raw else {
            return Ok(T::default());
        };
        if raw.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        })
    }

    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + ?Sized,
    {
        let encoded = serde_json::to_string(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.backend
            .put(key, &encoded)
            .map_err(|err| StoreError::Backend {
                key: key.to_string(),
                source: Box::new(err),
            })
    }

    pub fn clear(&self, key: &str) -> Result<(), StoreError> {
        self.backend.remove(key).map_err(|err| StoreError::Backend {
            key: key.to_string(),
            source: Box::new(err),
        })
    }
}
