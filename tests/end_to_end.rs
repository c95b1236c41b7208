//! End-to-end scenarios against the in-memory `Catalog`/`BlobStore`,
//! exercising the HTTP handlers and the signaling hub as whole
//! subsystems rather than one function at a time.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use tempfile::tempdir;

use sharehub_core::api::handlers::files::{
    confirm_handler, delete_file_handler, presign_handler, resolve_share_code_handler,
    unlock_share_code_handler,
};
use sharehub_core::api::models::{ConfirmRequest, PresignRequest, UnlockRequest};
use sharehub_core::auth::AuthenticatedUser;
use sharehub_core::blob::local::LocalBlobStore;
use sharehub_core::catalog::Catalog;
use sharehub_core::config::default_config;
use sharehub_core::error::ApiError;
use sharehub_core::janitor::sweep_once;
use sharehub_core::metrics::AppMetrics;
use sharehub_core::server::AppState;
use sharehub_core::signaling::hub::SignalingHub;
use sharehub_core::storage::MemoryStorage;

fn test_state() -> (Arc<AppState>, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let catalog = Arc::new(Catalog::new(Arc::new(MemoryStorage::new())));
    let blob = Arc::new(LocalBlobStore::new(dir.path().to_path_buf(), "s".to_string()));
    let hub = Arc::new(SignalingHub::new(catalog.clone(), Duration::from_secs(3600)));
    let state = Arc::new(AppState {
        catalog,
        blob: blob.clone(),
        dev_blob: Some(blob),
        signaling_hub: hub,
        metrics: AppMetrics::new(),
        config: default_config(),
    });
    (state, dir)
}

/// Presign, write the bytes directly to the dev blob store (standing in
/// for the client's direct PUT to the presigned URL), then confirm —
/// the file becomes resolvable by its share code.
#[tokio::test]
async fn happy_path_upload_and_share() {
    let (state, _dir) = test_state();

    let presigned = presign_handler(
        State(state.clone()),
        AuthenticatedUser("owner-1".to_string()),
        Json(PresignRequest {
            file_name: "vacation.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            size: 5,
        }),
    )
    .await
    .unwrap()
    .0;

    state
        .blob
        .put(&presigned.storage_key, "image/jpeg", bytes::Bytes::from_static(b"hello"))
        .await
        .unwrap();

    let confirmed = confirm_handler(
        State(state.clone()),
        AuthenticatedUser("owner-1".to_string()),
        Json(ConfirmRequest {
            storage_key: presigned.storage_key.clone(),
            share_code: presigned.share_code.clone(),
            original_name: "vacation.jpg".to_string(),
            size: 5,
            content_type: "image/jpeg".to_string(),
            password: None,
        }),
    )
    .await
    .unwrap()
    .0;

    assert_eq!(confirmed.share_code, presigned.share_code);

    let download = resolve_share_code_handler(State(state.clone()), Path(confirmed.share_code))
        .await
        .unwrap()
        .0;
    assert_eq!(download.original_name, "vacation.jpg");
    assert_eq!(download.size, 5);

    let snapshot = state.metrics.snapshot();
    assert_eq!(snapshot.files_created, 1);
    assert_eq!(snapshot.downloads_served, 1);
}

/// A password-protected file refuses the bare share-code GET and only
/// resolves through the unlock endpoint with the right password.
#[tokio::test]
async fn password_protected_download_requires_unlock() {
    let (state, _dir) = test_state();

    let presigned = presign_handler(
        State(state.clone()),
        AuthenticatedUser("owner-1".to_string()),
        Json(PresignRequest {
            file_name: "secret.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size: 3,
        }),
    )
    .await
    .unwrap()
    .0;

    state
        .blob
        .put(&presigned.storage_key, "application/pdf", bytes::Bytes::from_static(b"abc"))
        .await
        .unwrap();

    confirm_handler(
        State(state.clone()),
        AuthenticatedUser("owner-1".to_string()),
        Json(ConfirmRequest {
            storage_key: presigned.storage_key,
            share_code: presigned.share_code.clone(),
            original_name: "secret.pdf".to_string(),
            size: 3,
            content_type: "application/pdf".to_string(),
            password: Some("hunter2".to_string()),
        }),
    )
    .await
    .unwrap();

    let locked = resolve_share_code_handler(State(state.clone()), Path(presigned.share_code.clone()))
        .await
        .unwrap_err();
    assert!(matches!(locked, ApiError::Locked { .. }));

    let wrong = unlock_share_code_handler(
        State(state.clone()),
        Path(presigned.share_code.clone()),
        Json(UnlockRequest {
            password: "wrong".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(wrong, ApiError::Locked { .. }));

    let unlocked = unlock_share_code_handler(
        State(state.clone()),
        Path(presigned.share_code),
        Json(UnlockRequest {
            password: "hunter2".to_string(),
        }),
    )
    .await
    .unwrap()
    .0;
    assert_eq!(unlocked.original_name, "secret.pdf");
}

/// An expired file is swept by the janitor and then unreachable by
/// share code.
#[tokio::test]
async fn expired_file_is_reaped_and_unreachable() {
    let (state, _dir) = test_state();

    let presigned = presign_handler(
        State(state.clone()),
        AuthenticatedUser("owner-1".to_string()),
        Json(PresignRequest {
            file_name: "old.bin".to_string(),
            content_type: "application/octet-stream".to_string(),
            size: 2,
        }),
    )
    .await
    .unwrap()
    .0;

    state
        .blob
        .put(&presigned.storage_key, "application/octet-stream", bytes::Bytes::from_static(b"hi"))
        .await
        .unwrap();

    confirm_handler(
        State(state.clone()),
        AuthenticatedUser("owner-1".to_string()),
        Json(ConfirmRequest {
            storage_key: presigned.storage_key.clone(),
            share_code: presigned.share_code.clone(),
            original_name: "old.bin".to_string(),
            size: 2,
            content_type: "application/octet-stream".to_string(),
            password: None,
        }),
    )
    .await
    .unwrap();

    // Back-date the record's expiry directly in the catalog — confirm
    // never accepts a client-supplied expiry, so the janitor is the
    // only thing that can retire a row.
    let mut record = state
        .catalog
        .get_file_by_share_code(&presigned.share_code)
        .await
        .unwrap()
        .unwrap();
    record.expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
    state.catalog.delete_file(record.id).await.unwrap();
    state.catalog.create_file(&record).await.unwrap();

    sweep_once(&state, Duration::from_secs(300)).await;

    let gone = resolve_share_code_handler(State(state.clone()), Path(presigned.share_code))
        .await
        .unwrap_err();
    assert!(matches!(gone, ApiError::NotFound));
    assert!(state.blob.head(&presigned.storage_key).await.unwrap().is_none());
}

/// Host joins, peer joins, an SDP offer/answer and ICE candidates flow
/// both ways.
#[tokio::test]
async fn peer_to_peer_handshake_wires_both_directions() {
    let (state, _dir) = test_state();
    let hub = &state.signaling_hub;

    let (host_tx, mut host_rx) = tokio::sync::mpsc::unbounded_channel();
    let (peer_tx, mut peer_rx) = tokio::sync::mpsc::unbounded_channel();

    hub.join_as_host("ABCDEF", "host-1", Some("movie.mp4".into()), Some(1_000), host_tx)
        .await
        .unwrap();

    let (file_name, file_size) = hub.join_as_peer("ABCDEF", peer_tx).await.unwrap();
    assert_eq!(file_name.as_deref(), Some("movie.mp4"));
    assert_eq!(file_size, Some(1_000));

    let joined = host_rx.recv().await.unwrap();
    assert_eq!(joined.kind, "peer-joined");

    hub.forward(
        "ABCDEF",
        false,
        sharehub_core::signaling::envelope::OutboundMessage::forwarded(
            "offer",
            serde_json::json!({ "sdp": "offer-blob" }),
        ),
    );
    let offer = host_rx.recv().await.unwrap();
    assert_eq!(offer.kind, "offer");

    hub.forward(
        "ABCDEF",
        true,
        sharehub_core::signaling::envelope::OutboundMessage::forwarded(
            "answer",
            serde_json::json!({ "sdp": "answer-blob" }),
        ),
    );
    let answer = peer_rx.recv().await.unwrap();
    assert_eq!(answer.kind, "answer");
}

/// The peer drops mid-session; the host is notified and the room
/// returns to waiting instead of being torn down.
#[tokio::test]
async fn peer_disconnect_returns_room_to_waiting_without_losing_host() {
    let (state, _dir) = test_state();
    let hub = &state.signaling_hub;

    let (host_tx, mut host_rx) = tokio::sync::mpsc::unbounded_channel();
    let (peer_tx, _peer_rx) = tokio::sync::mpsc::unbounded_channel();

    hub.join_as_host("PEERGN", "host-1", None, None, host_tx).await.unwrap();
    hub.join_as_peer("PEERGN", peer_tx).await.unwrap();
    let _ = host_rx.recv().await; // peer-joined

    hub.on_peer_close("PEERGN").await;

    let notice = host_rx.recv().await.unwrap();
    assert_eq!(notice.kind, "peer-left");
    assert_eq!(hub.active_room_count(), 1);

    // A new peer can join the still-live room.
    let (peer2_tx, _peer2_rx) = tokio::sync::mpsc::unbounded_channel();
    hub.join_as_peer("PEERGN", peer2_tx).await.unwrap();
}

/// A share code already on file is reported taken, which is what makes
/// `sharecode::allocate` retry instead of handing out a colliding code.
#[tokio::test]
async fn share_code_collision_is_detected_against_the_catalog() {
    let (state, _dir) = test_state();

    let presigned = presign_handler(
        State(state.clone()),
        AuthenticatedUser("owner-1".to_string()),
        Json(PresignRequest {
            file_name: "a.bin".to_string(),
            content_type: "application/octet-stream".to_string(),
            size: 1,
        }),
    )
    .await
    .unwrap()
    .0;

    state
        .blob
        .put(&presigned.storage_key, "application/octet-stream", bytes::Bytes::from_static(b"a"))
        .await
        .unwrap();

    confirm_handler(
        State(state.clone()),
        AuthenticatedUser("owner-1".to_string()),
        Json(ConfirmRequest {
            storage_key: presigned.storage_key,
            share_code: presigned.share_code.clone(),
            original_name: "a.bin".to_string(),
            size: 1,
            content_type: "application/octet-stream".to_string(),
            password: None,
        }),
    )
    .await
    .unwrap();

    let second = presign_handler(
        State(state.clone()),
        AuthenticatedUser("owner-2".to_string()),
        Json(PresignRequest {
            file_name: "b.bin".to_string(),
            content_type: "application/octet-stream".to_string(),
            size: 1,
        }),
    )
    .await
    .unwrap()
    .0;

    // With only one code occupied out of 32^6 possibilities, a second
    // allocation essentially never collides with it in practice, but it
    // must never be allowed to if it did.
    assert_ne!(second.share_code, presigned.share_code);
}

/// An owner cannot delete another owner's file, and deleting it blows
/// away the blob and the catalog row together.
#[tokio::test]
async fn delete_is_scoped_to_the_owner() {
    let (state, _dir) = test_state();

    let presigned = presign_handler(
        State(state.clone()),
        AuthenticatedUser("owner-1".to_string()),
        Json(PresignRequest {
            file_name: "mine.bin".to_string(),
            content_type: "application/octet-stream".to_string(),
            size: 1,
        }),
    )
    .await
    .unwrap()
    .0;

    state
        .blob
        .put(&presigned.storage_key, "application/octet-stream", bytes::Bytes::from_static(b"a"))
        .await
        .unwrap();

    let confirmed = confirm_handler(
        State(state.clone()),
        AuthenticatedUser("owner-1".to_string()),
        Json(ConfirmRequest {
            storage_key: presigned.storage_key.clone(),
            share_code: presigned.share_code.clone(),
            original_name: "mine.bin".to_string(),
            size: 1,
            content_type: "application/octet-stream".to_string(),
            password: None,
        }),
    )
    .await
    .unwrap()
    .0;

    let record = state
        .catalog
        .get_file_by_share_code(&confirmed.share_code)
        .await
        .unwrap()
        .unwrap();

    let forbidden = delete_file_handler(
        State(state.clone()),
        AuthenticatedUser("owner-2".to_string()),
        Path(record.id),
    )
    .await
    .unwrap_err();
    assert!(matches!(forbidden, ApiError::Forbidden));

    let status = delete_file_handler(
        State(state.clone()),
        AuthenticatedUser("owner-1".to_string()),
        Path(record.id),
    )
    .await
    .unwrap();
    assert_eq!(status, axum::http::StatusCode::NO_CONTENT);

    assert!(state.catalog.get_file(record.id).await.unwrap().is_none());
    assert!(state.blob.head(&presigned.storage_key).await.unwrap().is_none());
}
