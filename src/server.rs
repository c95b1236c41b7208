use std::sync::Arc;

use tokio::signal;
use tracing::info;

use crate::api::routes::create_router;
use crate::blob::local::LocalBlobStore;
use crate::blob::BlobStore;
use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::metrics::AppMetrics;
use crate::signaling::hub::SignalingHub;

/// Shared application state, threaded through every handler via axum's
/// `State` extractor.
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub blob: Arc<dyn BlobStore>,
    /// Set only when `blob` is backed by the filesystem; lets the
    /// dev-blob route reach `LocalBlobStore::validate`/`read_bytes`
    /// directly instead of through the trait object.
    pub dev_blob: Option<Arc<LocalBlobStore>>,
    pub signaling_hub: Arc<SignalingHub>,
    pub metrics: AppMetrics,
    pub config: AppConfig,
}

pub async fn start_server(state: Arc<AppState>) -> eyre::Result<()> {
    let addr = state.config.listen_addr;
    let app = create_router(Arc::clone(&state));

    info!("transfer coordination plane listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Waits for a ctrl-c or SIGTERM before returning.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, shutting down");
}
