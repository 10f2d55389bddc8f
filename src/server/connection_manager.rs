use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tracing::{info, warn};
use uuid::Uuid;

use crate::broadcast::BroadcastMessage;
use crate::metrics::ServerMetrics;
use crate::protocol::{PlayerId, RoomId};

pub type ConnectionId = Uuid;

/// The room a connection is currently relaying. Dropping it stops the relay task.
#[derive(Debug)]
pub(crate) struct RoomBinding {
    pub room_id: RoomId,
    pub code: String,
    pub stop: oneshot::Sender<()>,
    /// Set while the member's own leave is in flight; the relay stays quiet about it
    pub leaving: bool,
}

#[derive(Debug)]
struct ClientConnection {
    connection_id: ConnectionId,
    sender: mpsc::Sender<BroadcastMessage>,
    room: Option<RoomBinding>,
}

pub(crate) struct ConnectionManager {
    clients: DashMap<PlayerId, ClientConnection>,
    metrics: Arc<ServerMetrics>,
}

impl ConnectionManager {
    pub fn new(metrics: Arc<ServerMetrics>) -> Self {
        Self {
            clients: DashMap::new(),
            metrics,
        }
    }

    pub fn register(
        &self,
        identity: PlayerId,
        sender: mpsc::Sender<BroadcastMessage>,
    ) -> ConnectionId {
        let connection_id = Uuid::new_v4();
        let previous = self.clients.insert(
            identity,
            ClientConnection {
                connection_id,
                sender,
                room: None,
            },
        );
        self.metrics.increment_connections();
        if let Some(previous) = previous {
            // The replaced socket's send loop ends once its sender is dropped.
            self.metrics.decrement_active_connections();
            info!(%identity, replaced = %previous.connection_id, "Connection replaced");
        }
        info!(%identity, %connection_id, "Client registered");
        connection_id
    }

    /// Remove the connection if it is still the current one for `identity`.
    pub fn remove(&self, identity: &PlayerId, connection_id: ConnectionId) -> bool {
        let removed = self
            .clients
            .remove_if(identity, |_, conn| conn.connection_id == connection_id)
            .is_some();
        if removed {
            self.metrics.decrement_active_connections();
        }
        removed
    }

    pub fn contains(&self, identity: &PlayerId) -> bool {
        self.clients.contains_key(identity)
    }

    pub fn send(&self, identity: &PlayerId, message: BroadcastMessage) -> bool {
        let Some(sender) = self.clients.get(identity).map(|conn| conn.sender.clone()) else {
            return false;
        };
        match sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.metrics.increment_websocket_messages_dropped();
                warn!(%identity, "Outbound queue full, message dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Bind the connection to a room, replacing (and stopping) any previous binding.
    /// Returns `false` if the client is no longer connected.
    pub fn bind_room(&self, identity: &PlayerId, binding: RoomBinding) -> bool {
        match self.clients.get_mut(identity) {
            Some(mut conn) => {
                conn.room = Some(binding);
                true
            }
            None => false,
        }
    }

    /// Clear the binding, optionally only if it still points at `room_id`.
    pub fn unbind_room(
        &self,
        identity: &PlayerId,
        room_id: Option<&RoomId>,
    ) -> Option<RoomBinding> {
        let mut conn = self.clients.get_mut(identity)?;
        let matches = match (&conn.room, room_id) {
            (Some(binding), Some(room_id)) => binding.room_id == *room_id,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !matches {
            return None;
        }
        conn.room.take()
    }

    /// Flag the current binding as leaving (or clear the flag). Returns the bound room.
    pub fn set_leaving(&self, identity: &PlayerId, leaving: bool) -> Option<RoomId> {
        let mut conn = self.clients.get_mut(identity)?;
        let binding = conn.room.as_mut()?;
        binding.leaving = leaving;
        Some(binding.room_id)
    }

    pub fn room_code(&self, identity: &PlayerId) -> Option<String> {
        self.clients
            .get(identity)
            .and_then(|conn| conn.room.as_ref().map(|binding| binding.code.clone()))
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ServerMessage;
    use std::sync::atomic::Ordering;

    fn binding(code: &str) -> (RoomBinding, oneshot::Receiver<()>) {
        let (stop, stopped) = oneshot::channel();
        (
            RoomBinding {
                room_id: Uuid::new_v4(),
                code: code.to_string(),
                stop,
                leaving: false,
            },
            stopped,
        )
    }

    #[tokio::test]
    async fn newer_connection_replaces_older() {
        let manager = ConnectionManager::new(Arc::new(ServerMetrics::new()));
        let identity = Uuid::new_v4();
        let (old_tx, mut old_rx) = mpsc::channel(4);
        let (new_tx, mut new_rx) = mpsc::channel(4);

        let old = manager.register(identity, old_tx);
        let new = manager.register(identity, new_tx);
        assert!(manager.send(&identity, ServerMessage::Pong.into()));
        assert!(new_rx.recv().await.is_some());
        assert!(old_rx.recv().await.is_none());

        // A stale disconnect must not remove the newer connection.
        assert!(!manager.remove(&identity, old));
        assert!(manager.contains(&identity));
        assert!(manager.remove(&identity, new));
        assert_eq!(manager.len(), 0);
    }

    #[tokio::test]
    async fn rebinding_stops_the_previous_relay() {
        let manager = ConnectionManager::new(Arc::new(ServerMetrics::new()));
        let identity = Uuid::new_v4();
        let (tx, _rx) = mpsc::channel(4);
        manager.register(identity, tx);

        let (first, first_stopped) = binding("AAA234");
        let first_room = first.room_id;
        assert!(manager.bind_room(&identity, first));
        let (second, _second_stopped) = binding("BBB234");
        assert!(manager.bind_room(&identity, second));

        assert!(first_stopped.await.is_err());
        assert_eq!(manager.room_code(&identity).as_deref(), Some("BBB234"));
        assert!(manager.unbind_room(&identity, Some(&first_room)).is_none());
        assert_eq!(
            manager.set_leaving(&identity, true),
            manager.unbind_room(&identity, None).map(|b| b.room_id)
        );
        assert!(manager.room_code(&identity).is_none());
        assert_eq!(manager.set_leaving(&identity, false), None);
    }

    #[test]
    fn full_queue_counts_dropped_messages() {
        let metrics = Arc::new(ServerMetrics::new());
        let manager = ConnectionManager::new(Arc::clone(&metrics));
        let identity = Uuid::new_v4();
        let (tx, _rx) = mpsc::channel(1);
        manager.register(identity, tx);

        assert!(manager.send(&identity, ServerMessage::Pong.into()));
        assert!(!manager.send(&identity, ServerMessage::Pong.into()));
        assert_eq!(
            metrics.websocket_messages_dropped.load(Ordering::Relaxed),
            1
        );
    }
}
