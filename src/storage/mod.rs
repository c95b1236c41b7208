use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod rocksdb_backend;

use crate::config::CatalogConfig;

/// Low-level key-value error, one layer below `ApiError` — the catalog
/// translates these into domain errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("item not found")]
    NotFound,

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Byte-oriented key-value storage. The catalog builds its own schema
/// and secondary indices on top of this rather than folding them into
/// the storage layer itself.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

pub struct MemoryStorage {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.data.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.data.write().remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        // Lexicographic order matters to callers (ascending expiry scans
        // break early, owner listings rely on inverted-timestamp order),
        // so this mirrors RocksDB's natural key-ordered iteration even
        // though a HashMap has none of its own.
        let mut keys: Vec<String> = self
            .data
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// Build a storage backend from configuration.
pub fn create_storage(config: &CatalogConfig) -> Result<Arc<dyn Storage>, StorageError> {
    match config {
        CatalogConfig::RocksDB { path } => {
            let storage = rocksdb_backend::RocksDBStorage::new(path)
                .map_err(|e| StorageError::StorageError(e.to_string()))?;
            Ok(Arc::new(storage))
        }
        CatalogConfig::Memory => Ok(Arc::new(MemoryStorage::new())),
    }
}

pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value).map_err(|e| StorageError::SerializationError(e.to_string()))
}

pub fn deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(data).map_err(|e| StorageError::SerializationError(e.to_string()))
}
