pub mod envelope;
pub mod hub;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::server::AppState;
use envelope::{InboundMessage, OutboundMessage};
use hub::SignalingHub;

pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// First message determines the role for the lifetime of the
/// connection; everything after is state-machine-driven off it.
enum Role {
    Host { code: String },
    Peer { code: String },
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<OutboundMessage>();

    // Forward hub-originated messages to the socket. A dedicated task
    // keeps this the only writer of the socket's sink half.
    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if ws_sink.send(Message::Text(text)).await.is_err() {
                break;
            }
            if message.kind == "error" {
                // terminal on this envelope; the connection itself may
                // remain open for a retrying client.
            }
        }
        let _ = ws_sink
            .send(Message::Close(Some(CloseFrame {
                code: 1000,
                reason: "normal".into(),
            })))
            .await;
    });

    let role = match first_message(&mut ws_stream, &state.signaling_hub, &out_tx).await {
        Some(role) => role,
        None => {
            drop(out_tx);
            let _ = writer.await;
            return;
        }
    };

    if matches!(role, Role::Host { .. }) {
        state.metrics.record_room_created();
    }

    let idle_timeout = Duration::from_secs(state.config.signaling_idle_seconds);
    loop {
        let next = tokio::time::timeout(idle_timeout, ws_stream.next()).await;
        let message = match next {
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(_))) | Ok(None) | Err(_) => break,
        };

        match message {
            Message::Text(text) => {
                handle_text_message(&text, &role, &state.signaling_hub, &out_tx).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    match &role {
        Role::Host { code } => state.signaling_hub.on_host_close(code).await,
        Role::Peer { code } => state.signaling_hub.on_peer_close(code).await,
    }

    drop(out_tx);
    let _ = writer.await;
}

async fn first_message(
    ws_stream: &mut SplitStream<WebSocket>,
    hub: &SignalingHub,
    out_tx: &mpsc::UnboundedSender<OutboundMessage>,
) -> Option<Role> {
    let message = loop {
        match ws_stream.next().await {
            Some(Ok(Message::Text(text))) => break text,
            Some(Ok(Message::Close(_))) | None => return None,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!(error = %e, "signaling socket error before join");
                return None;
            }
        }
    };

    let Ok(inbound) = serde_json::from_str::<InboundMessage>(&message) else {
        let _ = out_tx.send(OutboundMessage::error("first message must be valid JSON"));
        return None;
    };

    if inbound.kind != "join" {
        let _ = out_tx.send(OutboundMessage::error("first message must be 'join'"));
        return None;
    }

    let Some(code) = inbound.room_code else {
        let _ = out_tx.send(OutboundMessage::error("join requires roomCode"));
        return None;
    };

    if let Some(host_id) = inbound.host_id {
        let file_name = inbound
            .payload
            .as_ref()
            .and_then(|p| p.get("fileName"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let file_size = inbound
            .payload
            .as_ref()
            .and_then(|p| p.get("fileSize"))
            .and_then(|v| v.as_u64());

        match hub
            .join_as_host(&code, &host_id, file_name, file_size, out_tx.clone())
            .await
        {
            Ok(()) => {
                let _ = out_tx.send(OutboundMessage::ready_as_host());
                Some(Role::Host { code })
            }
            Err(err) => {
                let _ = out_tx.send(err.into_message());
                None
            }
        }
    } else {
        match hub.join_as_peer(&code, out_tx.clone()).await {
            Ok((file_name, file_size)) => {
                let _ = out_tx.send(OutboundMessage::ready_as_peer(file_name.as_deref(), file_size));
                Some(Role::Peer { code })
            }
            Err(err) => {
                let _ = out_tx.send(err.into_message());
                None
            }
        }
    }
}

async fn handle_text_message(
    text: &str,
    role: &Role,
    hub: &SignalingHub,
    out_tx: &mpsc::UnboundedSender<OutboundMessage>,
) {
    let Ok(inbound) = serde_json::from_str::<InboundMessage>(text) else {
        debug!("dropping malformed signaling message");
        return;
    };

    let (code, is_host) = match role {
        Role::Host { code } => (code.as_str(), true),
        Role::Peer { code } => (code.as_str(), false),
    };

    match inbound.kind.as_str() {
        "offer" | "answer" | "ice-candidate" => {
            let kind: &'static str = match inbound.kind.as_str() {
                "offer" => "offer",
                "answer" => "answer",
                _ => "ice-candidate",
            };
            let payload = inbound.payload.unwrap_or(serde_json::Value::Null);
            hub.forward(code, is_host, OutboundMessage::forwarded(kind, payload));
        }
        "file-info" => {
            if is_host {
                let payload = inbound.payload.unwrap_or(serde_json::Value::Null);
                let file_name = payload.get("fileName").and_then(|v| v.as_str()).map(str::to_string);
                let file_size = payload.get("fileSize").and_then(|v| v.as_u64());
                hub.update_file_info(code, file_name, file_size);
                hub.forward(code, is_host, OutboundMessage::forwarded("file-info", payload));
            }
            // peer-sent file-info is silently ignored.
        }
        "join" => {
            let _ = out_tx.send(OutboundMessage::error("already joined"));
        }
        other => {
            debug!(kind = other, "ignoring unknown signaling message type");
        }
    }
}
