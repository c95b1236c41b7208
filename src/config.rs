use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level service configuration, loaded once at startup and passed
/// explicitly into every component that needs it — no ambient mutable
/// globals.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Bind address for the HTTP + signaling server.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Blob store configuration.
    pub blob: BlobConfig,

    /// Catalog storage configuration.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Cap for the in-process multipart upload path, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Validity window for presigned upload/download URLs, in seconds.
    #[serde(default = "default_presign_ttl_seconds")]
    pub presign_ttl_seconds: u64,

    /// Lifetime of a peer-to-peer room, in seconds.
    #[serde(default = "default_room_ttl_seconds")]
    pub room_ttl_seconds: u64,

    /// Janitor sweep cadence, in seconds.
    #[serde(default = "default_janitor_interval_seconds")]
    pub janitor_interval_seconds: u64,

    /// Idle read deadline for signaling connections, in seconds.
    #[serde(default = "default_signaling_idle_seconds")]
    pub signaling_idle_seconds: u64,

    /// Grace period before the janitor tears down an orphaned in-memory
    /// room that has no matching catalog row. Defaults to 5 minutes.
    #[serde(default = "default_room_reconcile_grace_seconds")]
    pub room_reconcile_grace_seconds: u64,

    /// CORS configuration.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Development mode: gates the `/dev/blob/*key` route that serves
    /// `LocalBlobStore`'s presigned URLs directly from this process.
    /// Never set in production.
    #[serde(default)]
    pub development: DevelopmentConfig,
}

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:8080".parse().unwrap()
}

fn default_max_upload_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_presign_ttl_seconds() -> u64 {
    3600
}

fn default_room_ttl_seconds() -> u64 {
    3600
}

fn default_janitor_interval_seconds() -> u64 {
    60
}

fn default_signaling_idle_seconds() -> u64 {
    60
}

fn default_room_reconcile_grace_seconds() -> u64 {
    5 * 60
}

/// Blob store (object store) binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BlobConfig {
    /// Generic S3-compatible endpoint, path-style addressing.
    #[serde(rename = "s3")]
    S3 {
        endpoint: String,
        access_key: String,
        secret_key: String,
        bucket: String,
    },
    /// Local filesystem store for development and tests. Never backed
    /// by real signed URLs — only suitable behind a trusted loopback.
    #[serde(rename = "local")]
    Local { path: PathBuf },
}

/// Catalog storage backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CatalogConfig {
    #[serde(rename = "rocksdb")]
    RocksDB { path: PathBuf },
    #[serde(rename = "memory")]
    Memory,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig::Memory
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allow_all_origins: bool,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_all_origins: true,
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevelopmentConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// Load configuration from a file, with `SHAREHUB__`-prefixed
/// environment variables taking precedence over it.
pub fn load_config(path: &str) -> eyre::Result<AppConfig> {
    let config = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(config::Environment::with_prefix("SHAREHUB").separator("__"))
        .build()?
        .try_deserialize()?;

    Ok(config)
}

/// Default configuration used when no config file is provided.
pub fn default_config() -> AppConfig {
    AppConfig {
        listen_addr: default_listen_addr(),
        blob: BlobConfig::Local {
            path: PathBuf::from("./data/blobs"),
        },
        catalog: CatalogConfig::Memory,
        max_upload_bytes: default_max_upload_bytes(),
        presign_ttl_seconds: default_presign_ttl_seconds(),
        room_ttl_seconds: default_room_ttl_seconds(),
        janitor_interval_seconds: default_janitor_interval_seconds(),
        signaling_idle_seconds: default_signaling_idle_seconds(),
        room_reconcile_grace_seconds: default_room_reconcile_grace_seconds(),
        cors: CorsConfig::default(),
        development: DevelopmentConfig { enabled: true },
    }
}
