use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Multipart, Path, State};
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use crate::api::mime;
use crate::api::models::{
    ConfirmRequest, ConfirmResponse, DownloadResponse, FileSummary, PresignRequest,
    PresignResponse, UnlockRequest,
};
use crate::auth::AuthenticatedUser;
use crate::catalog::models::FileRecord;
use crate::catalog::Catalog;
use crate::error::{ApiError, ApiResult};
use crate::password;
use crate::server::AppState;
use crate::sharecode::{self, UniquenessCheck};

struct ShareCodeTaken<'a>(&'a Catalog);

#[async_trait]
impl UniquenessCheck for ShareCodeTaken<'_> {
    async fn is_taken(&self, code: &str) -> eyre::Result<bool> {
        Ok(self.0.get_file_by_share_code(code).await?.is_some())
    }
}

/// Keeps `[A-Za-z0-9.\-]`, substitutes `_` for everything else, so the
/// original file name is safe to embed in a storage key.
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn storage_key(owner_id: &str, name: &str) -> String {
    let key = format!(
        "uploads/{owner_id}/{millis}-{name}",
        millis = Utc::now().timestamp_millis(),
        name = sanitize_file_name(name),
    );
    key.chars().take(1024).collect()
}

pub async fn presign_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(owner_id): AuthenticatedUser,
    Json(request): Json<PresignRequest>,
) -> ApiResult<Json<PresignResponse>> {
    if request.file_name.trim().is_empty() {
        return Err(ApiError::Validation("fileName must not be empty".into()));
    }

    let key = storage_key(&owner_id, &request.file_name);
    let ttl = Duration::from_secs(state.config.presign_ttl_seconds);

    let upload_url = state
        .blob
        .presign_put(&key, &request.content_type, ttl)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let share_code = sharecode::allocate(&ShareCodeTaken(&state.catalog)).await?;

    state.metrics.record_bytes_presigned(request.size);

    Ok(Json(PresignResponse {
        upload_url,
        storage_key: key,
        share_code,
    }))
}

pub async fn confirm_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(owner_id): AuthenticatedUser,
    Json(request): Json<ConfirmRequest>,
) -> ApiResult<Json<ConfirmResponse>> {
    let expected_prefix = format!("uploads/{owner_id}/");
    if !request.storage_key.starts_with(&expected_prefix) {
        return Err(ApiError::Validation(
            "storageKey does not belong to the authenticated owner".into(),
        ));
    }

    let share_code = sharecode::canonicalize(&request.share_code);
    let password_hash = match request.password {
        Some(p) if !p.is_empty() => Some(password::hash(p).await?),
        _ => None,
    };

    let record = FileRecord {
        id: Uuid::new_v4(),
        owner_id,
        original_name: request.original_name,
        storage_key: request.storage_key,
        size: request.size,
        content_type: request.content_type,
        share_code: Some(share_code.clone()),
        password_hash,
        expires_at: None,
        download_count: 0,
        created_at: Utc::now(),
        tombstoned: false,
    };

    state.catalog.create_file(&record).await.map_err(|e| ApiError::Internal(e.into()))?;
    state.metrics.record_file_created();

    Ok(Json(ConfirmResponse { share_code }))
}

pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(owner_id): AuthenticatedUser,
    mut multipart: Multipart,
) -> ApiResult<Json<ConfirmResponse>> {
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut password: Option<String> = None;
    let mut bytes: Option<bytes::Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {e}")))?
    {
        match field.name().unwrap_or("") {
            "password" => {
                password = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::Validation(e.to_string()))?,
                );
            }
            "file" => {
                file_name = field.file_name().map(str::to_string);
                content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(e.to_string()))?;
                if data.len() as u64 > state.config.max_upload_bytes {
                    return Err(ApiError::Validation("upload exceeds MAX_UPLOAD_BYTES".into()));
                }
                bytes = Some(data);
            }
            _ => {}
        }
    }

    let bytes = bytes.ok_or_else(|| ApiError::Validation("missing file field".into()))?;
    let file_name = file_name.ok_or_else(|| ApiError::Validation("missing file name".into()))?;
    let content_type = content_type.unwrap_or_else(|| "application/octet-stream".to_string());

    if !mime::is_allowed(&content_type) {
        return Err(ApiError::Validation(format!(
            "content type {content_type} is not allowed"
        )));
    }

    let key = storage_key(&owner_id, &file_name);
    state
        .blob
        .put(&key, &content_type, bytes.clone())
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let share_code = sharecode::allocate(&ShareCodeTaken(&state.catalog)).await?;
    let password_hash = match password {
        Some(p) if !p.is_empty() => Some(password::hash(p).await?),
        _ => None,
    };

    let record = FileRecord {
        id: Uuid::new_v4(),
        owner_id,
        original_name: file_name,
        storage_key: key,
        size: bytes.len() as u64,
        content_type,
        share_code: Some(share_code.clone()),
        password_hash,
        expires_at: None,
        download_count: 0,
        created_at: Utc::now(),
        tombstoned: false,
    };

    state.catalog.create_file(&record).await.map_err(|e| ApiError::Internal(e.into()))?;
    state.metrics.record_file_created();

    Ok(Json(ConfirmResponse { share_code }))
}

pub async fn list_files_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(owner_id): AuthenticatedUser,
) -> ApiResult<Json<Vec<FileSummary>>> {
    let records = state
        .catalog
        .list_files_by_owner(&owner_id)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    let mut summaries = Vec::with_capacity(records.len());
    for record in records {
        let exists_in_storage = state
            .blob
            .head(&record.storage_key)
            .await
            .map_err(|e| ApiError::Upstream(e.to_string()))?
            .is_some();

        summaries.push(FileSummary {
            id: record.id.to_string(),
            original_name: record.original_name,
            size: record.size,
            content_type: record.content_type,
            share_code: record.share_code,
            has_password: record.password_hash.is_some(),
            download_count: record.download_count,
            created_at: record.created_at,
            exists_in_storage,
        });
    }

    Ok(Json(summaries))
}

async fn resolve_download(
    state: &AppState,
    record: &FileRecord,
) -> ApiResult<DownloadResponse> {
    let ttl = Duration::from_secs(state.config.presign_ttl_seconds);
    let url = state
        .blob
        .presign_get(&record.storage_key, ttl)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    state
        .catalog
        .increment_download_count(record.id)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    state.metrics.record_download_served();

    Ok(DownloadResponse {
        original_name: record.original_name.clone(),
        size: record.size,
        url,
    })
}

pub async fn resolve_share_code_handler(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> ApiResult<Json<DownloadResponse>> {
    let code = sharecode::canonicalize(&code);
    let record = state
        .catalog
        .get_file_by_share_code(&code)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .ok_or(ApiError::NotFound)?;

    if record.is_expired(Utc::now()) {
        return Err(ApiError::Gone);
    }

    if record.password_hash.is_some() {
        return Err(ApiError::Locked {
            original_name: record.original_name,
            size: record.size,
        });
    }

    Ok(Json(resolve_download(&state, &record).await?))
}

pub async fn unlock_share_code_handler(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(request): Json<UnlockRequest>,
) -> ApiResult<Json<DownloadResponse>> {
    let code = sharecode::canonicalize(&code);
    let record = state
        .catalog
        .get_file_by_share_code(&code)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .ok_or(ApiError::NotFound)?;

    if record.is_expired(Utc::now()) {
        return Err(ApiError::Gone);
    }

    let Some(hash) = record.password_hash.clone() else {
        return Ok(Json(resolve_download(&state, &record).await?));
    };

    if !password::verify(request.password, hash).await? {
        return Err(ApiError::Locked {
            original_name: record.original_name,
            size: record.size,
        });
    }

    Ok(Json(resolve_download(&state, &record).await?))
}

pub async fn delete_file_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(owner_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<axum::http::StatusCode> {
    let record = state
        .catalog
        .get_file(id)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .ok_or(ApiError::NotFound)?;

    if record.owner_id != owner_id {
        return Err(ApiError::Forbidden);
    }

    match state.blob.delete(&record.storage_key).await {
        Ok(()) => {
            state
                .catalog
                .delete_file(id)
                .await
                .map_err(|e| ApiError::Internal(e.into()))?;
        }
        Err(e) => {
            tracing::warn!(file_id = %id, error = %e, "blob delete failed, tombstoning row instead of deleting");
            state
                .catalog
                .tombstone_file(id)
                .await
                .map_err(|e| ApiError::Internal(e.into()))?;
        }
    }

    state.metrics.record_file_deleted();
    Ok(axum::http::StatusCode::NO_CONTENT)
}
