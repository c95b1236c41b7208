use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use sha2::Sha256;

use super::{BlobError, BlobStore, ObjectHead};

type HmacSha256 = Hmac<Sha256>;

const MAX_TRANSPORT_RETRIES: u32 = 5;
const PER_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Generic path-style S3-compatible object store, signed with an
/// HMAC-SHA256 query-parameter scheme in the canonical-request-then-HMAC
/// shape used by cloud object-store signers: a canonical string is
/// built from method, path, expiry and content-type, then HMAC'd with
/// the secret access key. This keeps the adapter vendor-neutral instead
/// of depending on a particular provider's SDK.
pub struct S3BlobStore {
    endpoint: String,
    access_key: String,
    secret_key: String,
    bucket: String,
    client: Client,
}

impl S3BlobStore {
    pub fn new(endpoint: String, access_key: String, secret_key: String, bucket: String) -> Self {
        let client = Client::builder()
            .timeout(PER_ATTEMPT_TIMEOUT)
            .build()
            .expect("failed to build http client");
        Self {
            endpoint,
            access_key,
            secret_key,
            bucket,
            client,
        }
    }

    fn object_path(&self, key: &str) -> String {
        format!("/{}/{}", self.bucket, key)
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), self.object_path(key))
    }

    /// Canonical string covers method, path, expiry and content-type so
    /// that the signature binds the declared content-type — the
    /// uploaded object can't be smuggled in under a different MIME type
    /// than the one it was presigned for.
    fn canonical_string(&self, method: &str, key: &str, expires_at: i64, content_type: &str) -> String {
        format!(
            "{method}\n{path}\n{expires_at}\n{content_type}",
            path = self.object_path(key),
        )
    }

    fn sign(&self, canonical: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .expect("hmac accepts any key length");
        mac.update(canonical.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn signed_url(&self, method: &str, key: &str, ttl: Duration, content_type: &str) -> String {
        let expires_at = Utc::now().timestamp() + ttl.as_secs() as i64;
        let canonical = self.canonical_string(method, key, expires_at, content_type);
        let signature = self.sign(&canonical);

        format!(
            "{url}?X-Sh-Key={access_key}&X-Sh-Expires={expires_at}&X-Sh-ContentType={content_type}&X-Sh-Signature={signature}",
            url = self.object_url(key),
            access_key = self.access_key,
            content_type = percent_encoding::utf8_percent_encode(
                content_type,
                percent_encoding::NON_ALPHANUMERIC
            ),
        )
    }

    async fn with_retry<F, Fut, T>(&self, op: F) -> Result<T, BlobError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, BlobError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(BlobError::Auth(msg)) => return Err(BlobError::Auth(msg)),
                Err(err @ BlobError::Transport(_)) => {
                    attempt += 1;
                    if attempt >= MAX_TRANSPORT_RETRIES {
                        return Err(err);
                    }
                    let backoff = Duration::from_millis(100 * 2u64.pow(attempt));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    fn classify_status(status: StatusCode, context: &str) -> BlobError {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            BlobError::Auth(format!("{context}: {status}"))
        } else {
            BlobError::Transport(format!("{context}: {status}"))
        }
    }
}

#[async_trait::async_trait]
impl BlobStore for S3BlobStore {
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> Result<String, BlobError> {
        Ok(self.signed_url("PUT", key, ttl, content_type))
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, BlobError> {
        Ok(self.signed_url("GET", key, ttl, ""))
    }

    async fn put(&self, key: &str, content_type: &str, bytes: bytes::Bytes) -> Result<(), BlobError> {
        let url = self.object_url(key);
        self.with_retry(|| async {
            let response = self
                .client
                .put(&url)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(bytes.clone())
                .send()
                .await
                .map_err(|e| BlobError::Transport(e.to_string()))?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(Self::classify_status(response.status(), "put"))
            }
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let url = self.object_url(key);
        self.with_retry(|| async {
            let response = self
                .client
                .delete(&url)
                .send()
                .await
                .map_err(|e| BlobError::Transport(e.to_string()))?;

            if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
                Ok(())
            } else {
                Err(Self::classify_status(response.status(), "delete"))
            }
        })
        .await
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectHead>, BlobError> {
        let url = self.object_url(key);
        self.with_retry(|| async {
            let response = self
                .client
                .head(&url)
                .send()
                .await
                .map_err(|e| BlobError::Transport(e.to_string()))?;

            if response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !response.status().is_success() {
                return Err(Self::classify_status(response.status(), "head"));
            }

            let size = response
                .headers()
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("application/octet-stream")
                .to_string();

            Ok(Some(ObjectHead {
                size,
                last_modified: Utc::now(),
                content_type,
            }))
        })
        .await
    }
}
