use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key prefixes used by the catalog: one constant per logical index.
pub mod prefixes {
    pub const FILE: &str = "file:";
    pub const FILE_BY_SHARE_CODE: &str = "file_by_share_code:";
    pub const FILE_BY_OWNER: &str = "file_by_owner:";
    pub const FILE_EXPIRY: &str = "file_expiry:";
    pub const ROOM: &str = "room:";
    pub const ROOM_EXPIRY: &str = "room_expiry:";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Connected,
    Transferring,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub original_name: String,
    pub storage_key: String,
    pub size: u64,
    pub content_type: String,
    pub share_code: Option<String>,
    pub password_hash: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub download_count: u64,
    pub created_at: DateTime<Utc>,
    /// Set when the owner deleted the row but the underlying blob
    /// delete did not ultimately succeed.
    pub tombstoned: bool,
}

impl FileRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRecord {
    pub code: String,
    pub host_id: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub status: RoomStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RoomRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Inverts a millisecond timestamp so that lexicographic key ordering
/// yields descending creation order for `file_by_owner` scans, the
/// same trick the janitor's expiry-scan keys rely on for ascending
/// order (plain millis there, since ascending is what expiry wants).
pub fn inverted_millis(millis: i64) -> String {
    format!("{:020}", i64::MAX - millis)
}
