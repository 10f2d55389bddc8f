use std::sync::Arc;
use tokio::sync::mpsc;

use crate::broadcast::BroadcastMessage;
use crate::channel::{InMemoryTransport, PubSubTransport};
use crate::config::Config;
use crate::coordination::RoomCoordinator;
use crate::directory::{InMemoryDirectory, RoomDirectory};
use crate::error::RoomError;
use crate::identity::{IdentityProvider, ResumableIdentityProvider};
use crate::metrics::ServerMetrics;
use crate::protocol::{PlayerId, ServerMessage};
use crate::rate_limit::RoomRateLimiter;

mod connection_manager;
mod maintenance;
mod message_router;
mod room_service;

pub use connection_manager::ConnectionId;
use connection_manager::ConnectionManager;

/// Connection hub: maps WebSocket clients onto coordinator operations and relays room
/// traffic back to them.
pub struct PartyServer {
    coordinator: Arc<RoomCoordinator>,
    directory: Arc<dyn RoomDirectory>,
    identity: Arc<dyn IdentityProvider>,
    connection_manager: ConnectionManager,
    rate_limiter: Arc<RoomRateLimiter>,
    metrics: Arc<ServerMetrics>,
    config: Arc<Config>,
}

impl PartyServer {
    /// Server backed by the in-memory directory and transport.
    pub fn new(config: Arc<Config>) -> Arc<Self> {
        let directory: Arc<dyn RoomDirectory> = Arc::new(InMemoryDirectory::new());
        let transport: Arc<dyn PubSubTransport> =
            Arc::new(InMemoryTransport::new(config.server.channel_capacity));
        Self::with_backends(
            config,
            directory,
            transport,
            Arc::new(ResumableIdentityProvider),
        )
    }

    pub fn with_backends(
        config: Arc<Config>,
        directory: Arc<dyn RoomDirectory>,
        transport: Arc<dyn PubSubTransport>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Arc<Self> {
        let metrics = Arc::new(ServerMetrics::new());
        let rate_limiter = Arc::new(RoomRateLimiter::new(config.rate_limit.clone()));
        let coordinator = Arc::new(RoomCoordinator::new(
            Arc::clone(&directory),
            transport,
            Arc::clone(&rate_limiter),
            Arc::clone(&metrics),
            &config,
        ));

        Arc::new(Self {
            coordinator,
            directory,
            identity,
            connection_manager: ConnectionManager::new(Arc::clone(&metrics)),
            rate_limiter,
            metrics,
            config,
        })
    }

    pub fn coordinator(&self) -> &Arc<RoomCoordinator> {
        &self.coordinator
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> Arc<ServerMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn resolve_identity(&self, presented: Option<&str>) -> PlayerId {
        self.identity.resolve(presented)
    }

    /// Register a connection for `identity`. A newer connection for the same identity
    /// replaces the older one.
    pub fn register_client(
        &self,
        identity: PlayerId,
        sender: mpsc::Sender<BroadcastMessage>,
    ) -> ConnectionId {
        let connection_id = self.connection_manager.register(identity, sender);
        self.send_to(&identity, ServerMessage::Welcome { identity });
        connection_id
    }

    /// Drop the connection's channel subscription. Room membership is kept so the
    /// identity can reconnect and re-join.
    pub fn unregister_client(&self, identity: &PlayerId, connection_id: ConnectionId) {
        if self.connection_manager.remove(identity, connection_id) {
            tracing::info!(%identity, %connection_id, "Client unregistered");
        }
    }

    pub fn is_connected(&self, identity: &PlayerId) -> bool {
        self.connection_manager.contains(identity)
    }

    pub fn bound_room(&self, identity: &PlayerId) -> Option<String> {
        self.connection_manager.room_code(identity)
    }

    pub(crate) fn send_to(&self, identity: &PlayerId, message: impl Into<BroadcastMessage>) {
        self.connection_manager.send(identity, message.into());
    }

    pub(crate) fn send_error(&self, identity: &PlayerId, err: &RoomError) {
        let message = if err.is_internal() {
            tracing::warn!(%identity, error = %err, "Room operation failed");
            "internal error, please retry".to_string()
        } else {
            err.to_string()
        };
        self.send_to(
            identity,
            ServerMessage::Error {
                message,
                error_code: Some(err.error_code()),
                retry_after_ms: err
                    .retry_after()
                    .map(|wait| u64::try_from(wait.as_millis()).unwrap_or(u64::MAX)),
            },
        );
    }

    pub async fn health_check(&self) -> bool {
        self.directory.health_check().await
    }
}
