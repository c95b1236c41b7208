use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound message shape: `{"type": string, "roomCode"?, "hostId"?,
/// "payload"?: any}`. Deliberately loosely typed — the hub only
/// inspects `kind` and `room_code`/`host_id`; `offer`/`answer`/
/// `ice-candidate` payloads are opaque and forwarded verbatim.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub room_code: Option<String>,
    pub host_id: Option<String>,
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl OutboundMessage {
    pub fn ready_as_host() -> Self {
        Self {
            kind: "ready",
            payload: Some(serde_json::json!({ "role": "host" })),
        }
    }

    pub fn ready_as_peer(file_name: Option<&str>, file_size: Option<u64>) -> Self {
        Self {
            kind: "ready",
            payload: Some(serde_json::json!({
                "role": "peer",
                "fileName": file_name,
                "fileSize": file_size,
            })),
        }
    }

    pub fn peer_joined() -> Self {
        Self {
            kind: "peer-joined",
            payload: None,
        }
    }

    pub fn peer_left() -> Self {
        Self {
            kind: "peer-left",
            payload: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: "error",
            payload: Some(serde_json::json!({ "message": message.into() })),
        }
    }

    pub fn forwarded(kind: &'static str, payload: Value) -> Self {
        Self {
            kind,
            payload: Some(payload),
        }
    }
}
