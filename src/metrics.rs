use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// In-process counters exposed on `GET /metrics`, in the style of the
/// teacher's `AuthMetrics` (`state.metrics.get_metrics()`).
pub struct AppMetrics {
    started_at: Instant,
    files_created: AtomicU64,
    files_deleted: AtomicU64,
    downloads_served: AtomicU64,
    bytes_presigned: AtomicU64,
    rooms_created: AtomicU64,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub files_created: u64,
    pub files_deleted: u64,
    pub downloads_served: u64,
    pub bytes_presigned: u64,
    pub rooms_created: u64,
}

impl AppMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            files_created: AtomicU64::new(0),
            files_deleted: AtomicU64::new(0),
            downloads_served: AtomicU64::new(0),
            bytes_presigned: AtomicU64::new(0),
            rooms_created: AtomicU64::new(0),
        }
    }

    pub fn record_file_created(&self) {
        self.files_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_deleted(&self) {
        self.files_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_download_served(&self) {
        self.downloads_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes_presigned(&self, bytes: u64) {
        self.bytes_presigned.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_room_created(&self) {
        self.rooms_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_seconds: self.uptime_seconds(),
            files_created: self.files_created.load(Ordering::Relaxed),
            files_deleted: self.files_deleted.load(Ordering::Relaxed),
            downloads_served: self.downloads_served.load(Ordering::Relaxed),
            bytes_presigned: self.bytes_presigned.load(Ordering::Relaxed),
            rooms_created: self.rooms_created.load(Ordering::Relaxed),
        }
    }
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self::new()
    }
}
