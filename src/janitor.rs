use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::server::AppState;

/// Periodic sweeper. Expires files and rooms past their deadline and
/// reconciles orphaned in-memory rooms against the catalog.
pub async fn run(state: Arc<AppState>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(state.config.janitor_interval_seconds));
    let grace = Duration::from_secs(state.config.room_reconcile_grace_seconds);

    loop {
        ticker.tick().await;
        sweep_once(&state, grace).await;
    }
}

pub async fn sweep_once(state: &Arc<AppState>, grace: Duration) {
    let now = Utc::now();

    match state.catalog.expiring_files(now).await {
        Ok(files) => {
            for file in files {
                if let Err(e) = state.blob.delete(&file.storage_key).await {
                    warn!(file_id = %file.id, error = %e, "janitor failed to delete expired blob");
                    continue;
                }
                if let Err(e) = state.catalog.delete_file(file.id).await {
                    warn!(file_id = %file.id, error = %e, "janitor failed to delete expired file row");
                } else {
                    info!(file_id = %file.id, "janitor expired file");
                }
            }
        }
        Err(e) => warn!(error = %e, "janitor failed to scan expiring files"),
    }

    match state.catalog.expiring_rooms(now).await {
        Ok(rooms) => {
            for room in rooms {
                state.signaling_hub.on_host_close(&room.code).await;
                info!(room_code = %room.code, "janitor expired room");
            }
        }
        Err(e) => warn!(error = %e, "janitor failed to scan expiring rooms"),
    }

    state.signaling_hub.reconcile_orphans(grace).await;
}
