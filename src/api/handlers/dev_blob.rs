use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct DevBlobQuery {
    expires: i64,
    sig: String,
    method: String,
}

/// Serves the files `LocalBlobStore` signs URLs for. Only reachable when
/// `config.development.enabled` is set; a `LocalBlobStore` that was never
/// configured (S3 in use instead) also results in a 404 here.
pub async fn dev_blob_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<DevBlobQuery>,
) -> Response {
    if !state.config.development.enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    let Some(store) = &state.dev_blob else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if query.method != "GET" {
        return StatusCode::FORBIDDEN.into_response();
    }

    if !store.validate(&key, query.expires, "GET", &query.sig) {
        return StatusCode::FORBIDDEN.into_response();
    }

    match store.read_bytes(&key).await {
        Ok(bytes) => bytes.into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND.into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
