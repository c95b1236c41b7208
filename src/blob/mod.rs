pub mod local;
pub mod s3;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("authentication rejected by blob store: {0}")]
    Auth(String),
    #[error("transport error after retries: {0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub content_type: String,
}

/// Thin abstraction over an object store. No byte stream transits the
/// server on the upload/download fast path — callers get back a URL and
/// hand bytes directly to it.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> Result<String, BlobError>;

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, BlobError>;

    /// Direct, in-process upload used only by the single-round
    /// multipart path (`POST /files/upload`) — everywhere else, bytes
    /// move client-to-store over a presigned URL.
    async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> Result<(), BlobError>;

    /// Idempotent: deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;

    async fn head(&self, key: &str) -> Result<Option<ObjectHead>, BlobError>;
}

pub const DEFAULT_PRESIGN_TTL: Duration = Duration::from_secs(3600);
