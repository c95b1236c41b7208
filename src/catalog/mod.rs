pub mod models;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::storage::{deserialize, serialize, Storage, StorageError};
use models::{prefixes, inverted_millis, FileRecord, RoomRecord, RoomStatus};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Durable key-value-over-relational store for files and rooms.
/// Secondary indices are key prefixes over the same underlying
/// `Storage`, each with its own constant under `models::prefixes`.
pub struct Catalog {
    storage: Arc<dyn Storage>,
    /// Per-file lock guarding the read-modify-write in
    /// `increment_download_count`, so concurrent download requests for
    /// the same file serialize instead of racing.
    download_locks: DashMap<Uuid, Arc<AsyncMutex<()>>>,
}

impl Catalog {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            download_locks: DashMap::new(),
        }
    }

    fn download_lock(&self, id: Uuid) -> Arc<AsyncMutex<()>> {
        self.download_locks
            .entry(id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    // ---- files ----

    pub async fn create_file(&self, record: &FileRecord) -> Result<(), CatalogError> {
        let key = format!("{}{}", prefixes::FILE, record.id);
        self.storage.set(&key, &serialize(record)?).await?;

        if let Some(code) = &record.share_code {
            let idx = format!("{}{}", prefixes::FILE_BY_SHARE_CODE, code);
            self.storage.set(&idx, record.id.to_string().as_bytes()).await?;
        }

        let owner_idx = format!(
            "{}{}:{}:{}",
            prefixes::FILE_BY_OWNER,
            record.owner_id,
            inverted_millis(record.created_at.timestamp_millis()),
            record.id,
        );
        self.storage.set(&owner_idx, record.id.to_string().as_bytes()).await?;

        if let Some(expires_at) = record.expires_at {
            let expiry_idx = format!(
                "{}{:020}:{}",
                prefixes::FILE_EXPIRY,
                expires_at.timestamp_millis(),
                record.id,
            );
            self.storage.set(&expiry_idx, record.id.to_string().as_bytes()).await?;
        }

        Ok(())
    }

    pub async fn get_file(&self, id: Uuid) -> Result<Option<FileRecord>, CatalogError> {
        let key = format!("{}{}", prefixes::FILE, id);
        match self.storage.get(&key).await? {
            Some(data) => Ok(Some(deserialize(&data)?)),
            None => Ok(None),
        }
    }

    pub async fn get_file_by_share_code(
        &self,
        code: &str,
    ) -> Result<Option<FileRecord>, CatalogError> {
        let idx = format!("{}{}", prefixes::FILE_BY_SHARE_CODE, code);
        let Some(data) = self.storage.get(&idx).await? else {
            return Ok(None);
        };
        let id_str = String::from_utf8_lossy(&data).to_string();
        let id = Uuid::parse_str(&id_str).map_err(|e| {
            CatalogError::Storage(StorageError::SerializationError(e.to_string()))
        })?;
        self.get_file(id).await
    }

    /// Ordered by creation descending.
    pub async fn list_files_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, CatalogError> {
        let prefix = format!("{}{}:", prefixes::FILE_BY_OWNER, owner_id);
        let keys = self.storage.list_keys(&prefix).await?;

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(data) = self.storage.get(&key).await? else {
                continue;
            };
            let id_str = String::from_utf8_lossy(&data).to_string();
            let Ok(id) = Uuid::parse_str(&id_str) else {
                continue;
            };
            if let Some(record) = self.get_file(id).await? {
                records.push(record);
            }
        }
        // keys are already lexicographically ordered by the inverted
        // timestamp (descending recency); nothing further to sort.
        Ok(records)
    }

    pub async fn delete_file(&self, id: Uuid) -> Result<(), CatalogError> {
        let Some(record) = self.get_file(id).await? else {
            return Err(CatalogError::NotFound);
        };

        let key = format!("{}{}", prefixes::FILE, id);
        self.storage.delete(&key).await?;

        if let Some(code) = &record.share_code {
            let idx = format!("{}{}", prefixes::FILE_BY_SHARE_CODE, code);
            self.storage.delete(&idx).await?;
        }

        let owner_idx = format!(
            "{}{}:{}:{}",
            prefixes::FILE_BY_OWNER,
            record.owner_id,
            inverted_millis(record.created_at.timestamp_millis()),
            record.id,
        );
        self.storage.delete(&owner_idx).await?;

        if let Some(expires_at) = record.expires_at {
            let expiry_idx = format!(
                "{}{:020}:{}",
                prefixes::FILE_EXPIRY,
                expires_at.timestamp_millis(),
                record.id,
            );
            self.storage.delete(&expiry_idx).await?;
        }

        self.download_locks.remove(&id);
        Ok(())
    }

    /// Mark a row tombstoned instead of deleting it, used when the
    /// underlying blob delete ultimately failed.
    pub async fn tombstone_file(&self, id: Uuid) -> Result<(), CatalogError> {
        let Some(mut record) = self.get_file(id).await? else {
            return Err(CatalogError::NotFound);
        };
        record.tombstoned = true;
        let key = format!("{}{}", prefixes::FILE, id);
        self.storage.set(&key, &serialize(&record)?).await?;
        Ok(())
    }

    /// Atomic relative to other callers of this method within the
    /// process, via a per-file async mutex.
    pub async fn increment_download_count(&self, id: Uuid) -> Result<u64, CatalogError> {
        let lock = self.download_lock(id);
        let _guard = lock.lock().await;

        let Some(mut record) = self.get_file(id).await? else {
            return Err(CatalogError::NotFound);
        };
        record.download_count += 1;
        let key = format!("{}{}", prefixes::FILE, id);
        self.storage.set(&key, &serialize(&record)?).await?;
        Ok(record.download_count)
    }

    pub async fn expiring_files(&self, now: DateTime<Utc>) -> Result<Vec<FileRecord>, CatalogError> {
        let keys = self.storage.list_keys(prefixes::FILE_EXPIRY).await?;
        let mut out = Vec::new();
        for key in keys {
            let millis: i64 = key
                .strip_prefix(prefixes::FILE_EXPIRY)
                .and_then(|rest| rest.split(':').next())
                .and_then(|s| s.parse().ok())
                .unwrap_or(i64::MAX);
            if millis > now.timestamp_millis() {
                break;
            }
            let Some(data) = self.storage.get(&key).await? else {
                continue;
            };
            let id_str = String::from_utf8_lossy(&data).to_string();
            if let Ok(id) = Uuid::parse_str(&id_str) {
                if let Some(record) = self.get_file(id).await? {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }

    // ---- rooms ----

    pub async fn create_room(&self, record: &RoomRecord) -> Result<(), CatalogError> {
        let key = format!("{}{}", prefixes::ROOM, record.code);
        self.storage.set(&key, &serialize(record)?).await?;

        let expiry_idx = format!(
            "{}{:020}:{}",
            prefixes::ROOM_EXPIRY,
            record.expires_at.timestamp_millis(),
            record.code,
        );
        self.storage.set(&expiry_idx, record.code.as_bytes()).await?;
        Ok(())
    }

    pub async fn get_room(&self, code: &str) -> Result<Option<RoomRecord>, CatalogError> {
        let key = format!("{}{}", prefixes::ROOM, code);
        match self.storage.get(&key).await? {
            Some(data) => Ok(Some(deserialize(&data)?)),
            None => Ok(None),
        }
    }

    pub async fn update_room_status(&self, code: &str, status: RoomStatus) -> Result<(), CatalogError> {
        let Some(mut record) = self.get_room(code).await? else {
            return Err(CatalogError::NotFound);
        };
        record.status = status;
        let key = format!("{}{}", prefixes::ROOM, code);
        self.storage.set(&key, &serialize(&record)?).await?;
        Ok(())
    }

    pub async fn delete_room(&self, code: &str) -> Result<(), CatalogError> {
        let Some(record) = self.get_room(code).await? else {
            return Ok(());
        };
        let key = format!("{}{}", prefixes::ROOM, code);
        self.storage.delete(&key).await?;

        let expiry_idx = format!(
            "{}{:020}:{}",
            prefixes::ROOM_EXPIRY,
            record.expires_at.timestamp_millis(),
            record.code,
        );
        self.storage.delete(&expiry_idx).await?;
        Ok(())
    }

    pub async fn expiring_rooms(&self, now: DateTime<Utc>) -> Result<Vec<RoomRecord>, CatalogError> {
        let keys = self.storage.list_keys(prefixes::ROOM_EXPIRY).await?;
        let mut out = Vec::new();
        for key in keys {
            let millis: i64 = key
                .strip_prefix(prefixes::ROOM_EXPIRY)
                .and_then(|rest| rest.split(':').next())
                .and_then(|s| s.parse().ok())
                .unwrap_or(i64::MAX);
            if millis > now.timestamp_millis() {
                break;
            }
            let Some(data) = self.storage.get(&key).await? else {
                continue;
            };
            let code = String::from_utf8_lossy(&data).to_string();
            if let Some(record) = self.get_room(&code).await? {
                out.push(record);
            }
        }
        Ok(out)
    }
}
