use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters for the party rooms server
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    pub total_connections: AtomicU64,
    pub active_connections: AtomicU64,
    pub disconnections: AtomicU64,
    pub websocket_messages_dropped: AtomicU64,

    // Room operation metrics
    pub rooms_created: AtomicU64,
    pub rooms_deleted: AtomicU64,
    pub room_code_collisions: AtomicU64,
    pub room_creation_failures: AtomicU64,
    pub room_join_failures: AtomicU64,

    // Membership metrics
    pub players_joined: AtomicU64,
    pub players_left: AtomicU64,
    pub players_kicked: AtomicU64,
    pub host_migrations: AtomicU64,

    // Game metrics
    pub games_started: AtomicU64,
    pub games_finished: AtomicU64,

    // Channel metrics
    pub broadcasts_sent: AtomicU64,
    pub broadcasts_lagged: AtomicU64,
    pub channel_resubscribes: AtomicU64,
    pub retry_attempts: AtomicU64,
    pub retry_successes: AtomicU64,

    // Rate limiting & errors
    pub rate_limit_rejections: AtomicU64,
    pub validation_errors: AtomicU64,
    pub internal_errors: AtomicU64,

    // Cleanup metrics
    pub stale_rooms_cleaned: AtomicU64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MetricsSnapshot {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub connections: ConnectionMetrics,
    pub rooms: RoomMetrics,
    pub players: PlayerMetrics,
    pub channel: ChannelMetrics,
    pub errors: ErrorMetrics,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConnectionMetrics {
    pub total_connections: u64,
    pub active_connections: u64,
    pub disconnections: u64,
    pub websocket_messages_dropped: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RoomMetrics {
    pub rooms_created: u64,
    pub rooms_deleted: u64,
    pub room_code_collisions: u64,
    pub room_creation_failures: u64,
    pub room_join_failures: u64,
    pub games_started: u64,
    pub games_finished: u64,
    pub stale_rooms_cleaned: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlayerMetrics {
    pub players_joined: u64,
    pub players_left: u64,
    pub players_kicked: u64,
    pub host_migrations: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChannelMetrics {
    pub broadcasts_sent: u64,
    pub broadcasts_lagged: u64,
    pub channel_resubscribes: u64,
    pub retry_attempts: u64,
    pub retry_successes: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorMetrics {
    pub rate_limit_rejections: u64,
    pub validation_errors: u64,
    pub internal_errors: u64,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // Connection metrics
    pub fn increment_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active_connections(&self) {
        // Use fetch_update for atomic check-then-decrement to prevent underflow
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_sub(1)
            });
        self.disconnections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_websocket_messages_dropped(&self) {
        self.websocket_messages_dropped
            .fetch_add(1, Ordering::Relaxed);
    }

    // Room operation metrics
    pub fn increment_rooms_created(&self) {
        self.rooms_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rooms_deleted(&self) {
        self.rooms_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_room_code_collisions(&self) {
        self.room_code_collisions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_room_creation_failures(&self) {
        self.room_creation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_room_join_failures(&self) {
        self.room_join_failures.fetch_add(1, Ordering::Relaxed);
    }

    // Membership metrics
    pub fn increment_players_joined(&self) {
        self.players_joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_players_left(&self) {
        self.players_left.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_players_kicked(&self) {
        self.players_kicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_host_migrations(&self) {
        self.host_migrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_games_started(&self) {
        self.games_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_games_finished(&self) {
        self.games_finished.fetch_add(1, Ordering::Relaxed);
    }

    // Channel metrics
    pub fn increment_broadcasts_sent(&self) {
        self.broadcasts_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_broadcasts_lagged(&self, count: u64) {
        self.broadcasts_lagged.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_channel_resubscribes(&self) {
        self.channel_resubscribes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retry_attempts(&self) {
        self.retry_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retry_successes(&self) {
        self.retry_successes.fetch_add(1, Ordering::Relaxed);
    }

    // Rate limiting & errors
    pub fn increment_rate_limit_rejections(&self) {
        self.rate_limit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_validation_errors(&self) {
        self.validation_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_internal_errors(&self) {
        self.internal_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_stale_rooms_cleaned(&self, count: u64) {
        self.stale_rooms_cleaned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        MetricsSnapshot {
            timestamp: chrono::Utc::now(),
            connections: ConnectionMetrics {
                total_connections: load(&self.total_connections),
                active_connections: load(&self.active_connections),
                disconnections: load(&self.disconnections),
                websocket_messages_dropped: load(&self.websocket_messages_dropped),
            },
            rooms: RoomMetrics {
                rooms_created: load(&self.rooms_created),
                rooms_deleted: load(&self.rooms_deleted),
                room_code_collisions: load(&self.room_code_collisions),
                room_creation_failures: load(&self.room_creation_failures),
                room_join_failures: load(&self.room_join_failures),
                games_started: load(&self.games_started),
                games_finished: load(&self.games_finished),
                stale_rooms_cleaned: load(&self.stale_rooms_cleaned),
            },
            players: PlayerMetrics {
                players_joined: load(&self.players_joined),
                players_left: load(&self.players_left),
                players_kicked: load(&self.players_kicked),
                host_migrations: load(&self.host_migrations),
            },
            channel: ChannelMetrics {
                broadcasts_sent: load(&self.broadcasts_sent),
                broadcasts_lagged: load(&self.broadcasts_lagged),
                channel_resubscribes: load(&self.channel_resubscribes),
                retry_attempts: load(&self.retry_attempts),
                retry_successes: load(&self.retry_successes),
            },
            errors: ErrorMetrics {
                rate_limit_rejections: load(&self.rate_limit_rejections),
                validation_errors: load(&self.validation_errors),
                internal_errors: load(&self.internal_errors),
            },
        }
    }
}
