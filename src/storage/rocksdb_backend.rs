use std::path::Path;

use async_trait::async_trait;
use rocksdb::{IteratorMode, DB};

use super::{Storage, StorageError};

pub struct RocksDBStorage {
    db: DB,
}

impl RocksDBStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&path)
            .map_err(|e| StorageError::StorageError(format!("failed to create db directory: {e}")))?;

        let mut options = rocksdb::Options::default();
        options.create_if_missing(true);
        options.set_use_fsync(true);
        options.set_atomic_flush(true);
        options.set_keep_log_file_num(10);
        options.set_write_buffer_size(64 * 1024 * 1024);
        options.set_max_write_buffer_number(3);

        let db = DB::open(&options, path)
            .map_err(|e| StorageError::StorageError(format!("failed to open rocksdb: {e}")))?;

        Ok(Self { db })
    }
}

impl Drop for RocksDBStorage {
    fn drop(&mut self) {
        let _ = self.db.flush();
    }
}

#[async_trait]
impl Storage for RocksDBStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.db
            .get(key.as_bytes())
            .map_err(|e| StorageError::StorageError(format!("failed to get key: {e}")))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.db
            .put(key.as_bytes(), value)
            .map_err(|e| StorageError::StorageError(format!("failed to set key: {e}")))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.db
            .delete(key.as_bytes())
            .map_err(|e| StorageError::StorageError(format!("failed to delete key: {e}")))
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix.as_bytes(), rocksdb::Direction::Forward));

        let mut keys = Vec::new();
        for item in iter {
            let (key, _) = item
                .map_err(|e| StorageError::StorageError(format!("failed to iterate keys: {e}")))?;
            let key_str = String::from_utf8_lossy(&key).to_string();
            if key_str.starts_with(prefix) {
                keys.push(key_str);
            } else {
                break;
            }
        }
        Ok(keys)
    }
}
