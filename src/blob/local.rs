use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{BlobError, BlobStore, ObjectHead};

type HmacSha256 = Hmac<Sha256>;

/// Filesystem-backed store for local development and tests: there is no
/// network between the presign step and the fetch, so a signed URL here
/// just encodes an expiry and method that are checked locally rather than
/// by a remote object-store. The URLs it mints point at this process's own
/// `GET /dev/blob/*key` route, gated on `config.development.enabled`.
pub struct LocalBlobStore {
    root: PathBuf,
    secret: String,
    base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: PathBuf, secret: String) -> Self {
        Self {
            root,
            secret,
            base_url: "http://127.0.0.1:8080".to_string(),
        }
    }

    /// Overrides the host:port the signed URLs this store mints will
    /// point at. Defaults to the loopback address, which is fine for
    /// tests but wrong once the server binds somewhere else.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn sign(&self, key: &str, expires_at: i64, method: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).expect("hmac accepts any key length");
        mac.update(format!("{method}\n{key}\n{expires_at}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn token_url(&self, method: &str, key: &str, ttl: Duration) -> String {
        let expires_at = Utc::now().timestamp() + ttl.as_secs() as i64;
        let signature = self.sign(key, expires_at, method);
        let base = &self.base_url;
        format!("{base}/dev/blob/{key}?expires={expires_at}&sig={signature}&method={method}")
    }

    /// Validates a token minted by this store; called from the dev-blob
    /// serving route, never exercised by a production code path.
    pub fn validate(&self, key: &str, expires_at: i64, method: &str, signature: &str) -> bool {
        if Utc::now().timestamp() > expires_at {
            return false;
        }
        self.sign(key, expires_at, method) == signature
    }

    pub async fn read_bytes(&self, key: &str) -> std::io::Result<Vec<u8>> {
        fs::read(self.path_for(key)).await
    }

    pub async fn write_bytes(&self, key: &str, bytes: &[u8]) -> std::io::Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(&path).await?;
        file.write_all(bytes).await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait::async_trait]
impl BlobStore for LocalBlobStore {
    async fn presign_put(
        &self,
        key: &str,
        _content_type: &str,
        ttl: Duration,
    ) -> Result<String, BlobError> {
        Ok(self.token_url("PUT", key, ttl))
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, BlobError> {
        Ok(self.token_url("GET", key, ttl))
    }

    async fn put(&self, key: &str, _content_type: &str, bytes: bytes::Bytes) -> Result<(), BlobError> {
        self.write_bytes(key, &bytes)
            .await
            .map_err(|e| BlobError::Transport(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobError::Transport(e.to_string())),
        }
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectHead>, BlobError> {
        match fs::metadata(self.path_for(key)).await {
            Ok(meta) => Ok(Some(ObjectHead {
                size: meta.len(),
                last_modified: Utc::now(),
                content_type: "application/octet-stream".to_string(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BlobError::Transport(e.to_string())),
        }
    }
}
