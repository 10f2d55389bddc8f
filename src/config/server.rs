//! Room lifecycle and channel behaviour configuration.

use super::defaults::{
    default_channel_capacity, default_finished_room_timeout, default_idle_room_timeout,
    default_max_players, default_resubscribe_attempts, default_resubscribe_initial_delay_ms,
    default_resubscribe_max_delay_ms, default_room_cleanup_interval, default_room_code_attempts,
};
use serde::{Deserialize, Serialize};

/// Server configuration for room and channel management.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Max players assigned to freshly created rooms
    #[serde(default = "default_max_players")]
    pub default_max_players: u8,
    /// Interval for the room cleanup task (seconds)
    #[serde(default = "default_room_cleanup_interval")]
    pub room_cleanup_interval: u64,
    /// Finished rooms untouched for this long are deleted (seconds)
    #[serde(default = "default_finished_room_timeout")]
    pub finished_room_timeout: u64,
    /// Rooms of any status untouched for this long are deleted (seconds)
    #[serde(default = "default_idle_room_timeout")]
    pub idle_room_timeout: u64,
    /// How many codes to try before giving up on room creation
    #[serde(default = "default_room_code_attempts")]
    pub room_code_attempts: u32,
    /// Per-room broadcast buffer; slower receivers lose the oldest messages
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Re-subscribe attempts before a room is treated as closed
    #[serde(default = "default_resubscribe_attempts")]
    pub resubscribe_attempts: u32,
    #[serde(default = "default_resubscribe_initial_delay_ms")]
    pub resubscribe_initial_delay_ms: u64,
    #[serde(default = "default_resubscribe_max_delay_ms")]
    pub resubscribe_max_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_max_players: default_max_players(),
            room_cleanup_interval: default_room_cleanup_interval(),
            finished_room_timeout: default_finished_room_timeout(),
            idle_room_timeout: default_idle_room_timeout(),
            room_code_attempts: default_room_code_attempts(),
            channel_capacity: default_channel_capacity(),
            resubscribe_attempts: default_resubscribe_attempts(),
            resubscribe_initial_delay_ms: default_resubscribe_initial_delay_ms(),
            resubscribe_max_delay_ms: default_resubscribe_max_delay_ms(),
        }
    }
}
