use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::dev_blob::dev_blob_handler;
use crate::api::handlers::files::{
    confirm_handler, delete_file_handler, list_files_handler, presign_handler,
    resolve_share_code_handler, unlock_share_code_handler, upload_handler,
};
use crate::api::handlers::{health_handler, metrics_handler};
use crate::server::AppState;
use crate::signaling::ws_handler;

/// Creates and configures the router with all routes and middleware: a
/// CORS layer built from configuration, request tracing, and one shared
/// application state extension.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors_layer = if state.config.cors.allow_all_origins {
        CorsLayer::permissive()
    } else {
        let mut layer = CorsLayer::new();
        for origin in &state.config.cors.allowed_origins {
            if let Ok(value) = origin.parse::<axum::http::HeaderValue>() {
                layer = layer.allow_origin(value);
            }
        }
        layer
    };

    let max_upload_bytes = state.config.max_upload_bytes as usize;

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/files/presign", post(presign_handler))
        .route("/files/confirm", post(confirm_handler))
        .route(
            "/files/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/files", get(list_files_handler))
        .route(
            "/files/download/:code",
            get(resolve_share_code_handler).post(unlock_share_code_handler),
        )
        .route("/files/:id", delete(delete_file_handler))
        .route("/signal", get(ws_handler))
        .route("/dev/blob/*key", get(dev_blob_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(ConcurrencyLimitLayer::new(1024))
        .layer(cors_layer)
        .with_state(state)
}
