//! Rate limit bucket configuration.

use super::defaults::{
    default_create_room_limit, default_game_action_limit, default_join_room_limit,
    default_send_clue_limit,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Admission limit for a single bucket: at most `max_requests` per sliding `window_ms`.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct BucketLimit {
    pub max_requests: u32,
    pub window_ms: u64,
}

impl BucketLimit {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Rate limiting configuration, one entry per named bucket.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_create_room_limit", alias = "createRoom")]
    pub create_room: BucketLimit,
    #[serde(default = "default_join_room_limit", alias = "joinRoom")]
    pub join_room: BucketLimit,
    #[serde(default = "default_game_action_limit", alias = "gameAction")]
    pub game_action: BucketLimit,
    #[serde(default = "default_send_clue_limit", alias = "sendClue")]
    pub send_clue: BucketLimit,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            create_room: default_create_room_limit(),
            join_room: default_join_room_limit(),
            game_action: default_game_action_limit(),
            send_clue: default_send_clue_limit(),
        }
    }
}

impl RateLimitConfig {
    /// Longest window across all buckets; used to decide when an idle entry can be pruned.
    pub fn longest_window(&self) -> Duration {
        [
            self.create_room,
            self.join_room,
            self.game_action,
            self.send_clue,
        ]
        .iter()
        .map(BucketLimit::window)
        .max()
        .unwrap_or(Duration::from_secs(60))
    }
}
