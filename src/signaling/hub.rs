use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use super::envelope::OutboundMessage;
use crate::catalog::models::{RoomRecord, RoomStatus};
use crate::catalog::Catalog;

#[derive(Debug, thiserror::Error)]
pub enum SignalingError {
    #[error("Room already has a host")]
    Collision,
    #[error("Room not found or host disconnected")]
    NotFound,
    #[error("Room occupied")]
    Occupied,
}

impl SignalingError {
    pub fn into_message(self) -> OutboundMessage {
        OutboundMessage::error(self.to_string())
    }
}

type Handle = UnboundedSender<OutboundMessage>;

/// In-memory, transient presence for one room.
pub struct RoomPresence {
    pub host: Handle,
    pub peer: Option<Handle>,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
}

/// Single owning map keyed by room code. Transports never hold a pointer
/// into this map directly — they carry only their room code and role and
/// look the entry up each time.
pub struct SignalingHub {
    rooms: Arc<DashMap<String, RoomPresence>>,
    catalog: Arc<Catalog>,
    room_ttl: Duration,
    /// First time each room was observed with no matching catalog row,
    /// used to enforce the janitor's reconciliation grace period.
    orphaned_since: DashMap<String, Instant>,
}

impl SignalingHub {
    pub fn new(catalog: Arc<Catalog>, room_ttl: Duration) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            catalog,
            room_ttl,
            orphaned_since: DashMap::new(),
        }
    }

    pub fn active_room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_codes(&self) -> Vec<String> {
        self.rooms.iter().map(|e| e.key().clone()).collect()
    }

    /// First join as host: creates the in-memory slot and, best-effort,
    /// the catalog row. A catalog insert failure is tolerated and logged
    /// rather than rejecting the join, as long as the in-memory slot
    /// itself is free.
    pub async fn join_as_host(
        &self,
        code: &str,
        host_id: &str,
        file_name: Option<String>,
        file_size: Option<u64>,
        sender: Handle,
    ) -> Result<(), SignalingError> {
        if self.rooms.contains_key(code) {
            return Err(SignalingError::Collision);
        }

        self.rooms.insert(
            code.to_string(),
            RoomPresence {
                host: sender,
                peer: None,
                file_name: file_name.clone(),
                file_size,
            },
        );

        let now = Utc::now();
        let record = RoomRecord {
            code: code.to_string(),
            host_id: host_id.to_string(),
            file_name,
            file_size,
            status: RoomStatus::Waiting,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(self.room_ttl.as_secs() as i64),
        };
        if let Err(e) = self.catalog.create_room(&record).await {
            warn!(room_code = code, error = %e, "catalog room insert failed, continuing with in-memory slot");
        }

        Ok(())
    }

    /// Second join as peer: wires the peer handle in and returns the
    /// host-announced file metadata to build the `ready` reply.
    pub async fn join_as_peer(
        &self,
        code: &str,
        sender: Handle,
    ) -> Result<(Option<String>, Option<u64>), SignalingError> {
        let mut entry = self.rooms.get_mut(code).ok_or(SignalingError::NotFound)?;

        if entry.peer.is_some() {
            return Err(SignalingError::Occupied);
        }

        entry.peer = Some(sender);
        let file_name = entry.file_name.clone();
        let file_size = entry.file_size;
        drop(entry);

        let _ = self.catalog.update_room_status(code, RoomStatus::Connected).await;
        if let Some(entry) = self.rooms.get(code) {
            let _ = entry.host.send(OutboundMessage::peer_joined());
        }

        Ok((file_name, file_size))
    }

    /// Forward an opaque message from `sender_is_host` to the
    /// counterpart, or silently drop if no counterpart is present yet —
    /// this is what lets ICE candidates trickle in before the peer has
    /// joined instead of requiring them to be buffered and replayed.
    pub fn forward(&self, code: &str, sender_is_host: bool, message: OutboundMessage) {
        let Some(entry) = self.rooms.get(code) else {
            return;
        };

        if sender_is_host {
            if let Some(peer) = &entry.peer {
                let _ = peer.send(message);
            }
        } else {
            let _ = entry.host.send(message);
        }
    }

    /// Updates the file metadata attached to a room's presence, e.g. when
    /// the host sends a `file-info` announcement after the room was
    /// already created. A peer joining afterwards then sees this updated
    /// metadata instead of whatever was present at `join_as_host` time.
    pub fn update_file_info(&self, code: &str, file_name: Option<String>, file_size: Option<u64>) {
        if let Some(mut entry) = self.rooms.get_mut(code) {
            if file_name.is_some() {
                entry.file_name = file_name;
            }
            if file_size.is_some() {
                entry.file_size = file_size;
            }
        }
    }

    /// Host disconnects: broadcast `peer-left`, tear the room down
    /// entirely (in-memory and catalog).
    pub async fn on_host_close(&self, code: &str) {
        if let Some((_, presence)) = self.rooms.remove(code) {
            if let Some(peer) = &presence.peer {
                let _ = peer.send(OutboundMessage::peer_left());
            }
        }
        if let Err(e) = self.catalog.delete_room(code).await {
            warn!(room_code = code, error = %e, "failed to delete room row on host close");
        }
    }

    /// Peer disconnects: broadcast `peer-left` to host, clear the peer
    /// slot, return the room to waiting. Room and host slot survive.
    pub async fn on_peer_close(&self, code: &str) {
        if let Some(mut entry) = self.rooms.get_mut(code) {
            entry.peer = None;
            let _ = entry.host.send(OutboundMessage::peer_left());
        }
        let _ = self.catalog.update_room_status(code, RoomStatus::Waiting).await;
    }

    /// Janitor reconciliation: tear down in-memory rooms whose catalog
    /// row is gone and that have stayed orphaned past `grace`. A room
    /// first seen orphaned on this sweep is only recorded, not torn
    /// down, so a catalog write lagging a single sweep behind the
    /// in-memory join doesn't cause a spurious teardown.
    pub async fn reconcile_orphans(&self, grace: Duration) {
        for code in self.room_codes() {
            if self.catalog.get_room(&code).await.ok().flatten().is_some() {
                self.orphaned_since.remove(&code);
                continue;
            }

            let first_seen = *self
                .orphaned_since
                .entry(code.clone())
                .or_insert_with(Instant::now);

            if first_seen.elapsed() >= grace {
                self.orphaned_since.remove(&code);
                self.on_host_close(&code).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use tokio::sync::mpsc;

    fn hub() -> SignalingHub {
        SignalingHub::new(Arc::new(Catalog::new(Arc::new(MemoryStorage::new()))), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn host_then_peer_join_wires_presence() {
        let hub = hub();
        let (host_tx, _host_rx) = mpsc::unbounded_channel();
        let (peer_tx, mut peer_rx) = mpsc::unbounded_channel();

        hub.join_as_host("XYZ123", "h1", Some("a.bin".into()), Some(42), host_tx)
            .await
            .unwrap();

        let (file_name, file_size) = hub.join_as_peer("XYZ123", peer_tx).await.unwrap();
        assert_eq!(file_name.as_deref(), Some("a.bin"));
        assert_eq!(file_size, Some(42));

        // peer channel itself receives nothing from join_as_peer; host does (peer-joined)
        assert!(peer_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn second_host_join_collides() {
        let hub = hub();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        hub.join_as_host("XYZ123", "h1", None, None, tx1).await.unwrap();
        let err = hub.join_as_host("XYZ123", "h2", None, None, tx2).await.unwrap_err();
        assert!(matches!(err, SignalingError::Collision));
    }

    #[tokio::test]
    async fn peer_join_without_host_is_not_found() {
        let hub = hub();
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = hub.join_as_peer("NOPE00", tx).await.unwrap_err();
        assert!(matches!(err, SignalingError::NotFound));
    }

    #[tokio::test]
    async fn second_peer_join_is_occupied() {
        let hub = hub();
        let (host_tx, _host_rx) = mpsc::unbounded_channel();
        let (peer1_tx, _peer1_rx) = mpsc::unbounded_channel();
        let (peer2_tx, _peer2_rx) = mpsc::unbounded_channel();

        hub.join_as_host("XYZ123", "h1", None, None, host_tx).await.unwrap();
        hub.join_as_peer("XYZ123", peer1_tx).await.unwrap();
        let err = hub.join_as_peer("XYZ123", peer2_tx).await.unwrap_err();
        assert!(matches!(err, SignalingError::Occupied));
    }

    #[tokio::test]
    async fn update_file_info_is_visible_to_a_later_joining_peer() {
        let hub = hub();
        let (host_tx, _host_rx) = mpsc::unbounded_channel();
        let (peer_tx, _peer_rx) = mpsc::unbounded_channel();

        hub.join_as_host("XYZ123", "h1", None, None, host_tx).await.unwrap();
        hub.update_file_info("XYZ123", Some("a.bin".to_string()), Some(99));

        let (file_name, file_size) = hub.join_as_peer("XYZ123", peer_tx).await.unwrap();
        assert_eq!(file_name.as_deref(), Some("a.bin"));
        assert_eq!(file_size, Some(99));
    }

    #[tokio::test]
    async fn host_close_tears_down_room_and_notifies_peer() {
        let hub = hub();
        let (host_tx, _host_rx) = mpsc::unbounded_channel();
        let (peer_tx, mut peer_rx) = mpsc::unbounded_channel();

        hub.join_as_host("XYZ123", "h1", None, None, host_tx).await.unwrap();
        hub.join_as_peer("XYZ123", peer_tx).await.unwrap();

        hub.on_host_close("XYZ123").await;

        let msg = peer_rx.recv().await.unwrap();
        assert_eq!(msg.kind, "peer-left");
        assert_eq!(hub.active_room_count(), 0);
        assert!(hub.catalog.get_room("XYZ123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn peer_close_returns_room_to_waiting() {
        let hub = hub();
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let (peer_tx, _peer_rx) = mpsc::unbounded_channel();

        hub.join_as_host("XYZ123", "h1", None, None, host_tx).await.unwrap();
        hub.join_as_peer("XYZ123", peer_tx).await.unwrap();
        let _ = host_rx.recv().await; // peer-joined

        hub.on_peer_close("XYZ123").await;

        let msg = host_rx.recv().await.unwrap();
        assert_eq!(msg.kind, "peer-left");
        assert_eq!(hub.active_room_count(), 1);

        let room = hub.catalog.get_room("XYZ123").await.unwrap().unwrap();
        assert_eq!(room.status, RoomStatus::Waiting);
    }

    #[tokio::test]
    async fn reconcile_orphans_waits_out_grace_period() {
        let hub = hub();
        let (host_tx, _host_rx) = mpsc::unbounded_channel();
        let (peer_tx, mut peer_rx) = mpsc::unbounded_channel();
        hub.join_as_host("XYZ123", "h1", None, None, host_tx).await.unwrap();
        hub.join_as_peer("XYZ123", peer_tx).await.unwrap();
        hub.catalog.delete_room("XYZ123").await.unwrap();

        // First sweep only records the room as orphaned.
        hub.reconcile_orphans(Duration::from_millis(50)).await;
        assert_eq!(hub.active_room_count(), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;

        // Second sweep, past the grace period, tears it down and
        // notifies the peer.
        hub.reconcile_orphans(Duration::from_millis(50)).await;
        assert_eq!(hub.active_room_count(), 0);
        assert_eq!(peer_rx.recv().await.unwrap().kind, "peer-left");
    }

    #[tokio::test]
    async fn reconcile_orphans_clears_tracking_when_catalog_row_reappears() {
        let hub = hub();
        let (host_tx, _host_rx) = mpsc::unbounded_channel();
        hub.join_as_host("XYZ123", "h1", None, None, host_tx).await.unwrap();
        hub.catalog.delete_room("XYZ123").await.unwrap();

        hub.reconcile_orphans(Duration::from_millis(50)).await;
        assert!(hub.orphaned_since.contains_key("XYZ123"));

        // Catalog row reappears (e.g. janitor race or retry) before the
        // grace period elapses.
        let now = Utc::now();
        hub.catalog
            .create_room(&RoomRecord {
                code: "XYZ123".to_string(),
                host_id: "h1".to_string(),
                file_name: None,
                file_size: None,
                status: RoomStatus::Waiting,
                created_at: now,
                expires_at: now + chrono::Duration::seconds(3600),
            })
            .await
            .unwrap();

        hub.reconcile_orphans(Duration::from_millis(50)).await;
        assert!(!hub.orphaned_since.contains_key("XYZ123"));
        assert_eq!(hub.active_room_count(), 1);
    }
}
