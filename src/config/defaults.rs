//! Default value functions for configuration fields.
//!
//! These back the `#[serde(default = ...)]` attributes across the configuration
//! types so that partially specified JSON documents always deserialize.

use super::logging::LogFormat;
use super::rate_limit::BucketLimit;

// =============================================================================
// Port & Root Config
// =============================================================================

pub const fn default_port() -> u16 {
    3540
}

// =============================================================================
// Server Defaults
// =============================================================================

pub const fn default_max_players() -> u8 {
    8
}

pub const fn default_room_cleanup_interval() -> u64 {
    60
}

pub const fn default_finished_room_timeout() -> u64 {
    900 // 15 minutes
}

pub const fn default_idle_room_timeout() -> u64 {
    7200 // 2 hours
}

pub const fn default_room_code_attempts() -> u32 {
    10
}

pub const fn default_channel_capacity() -> usize {
    256
}

pub const fn default_resubscribe_attempts() -> u32 {
    5
}

pub const fn default_resubscribe_initial_delay_ms() -> u64 {
    100
}

pub const fn default_resubscribe_max_delay_ms() -> u64 {
    3000
}

// =============================================================================
// Rate Limit Defaults
// =============================================================================

pub const fn default_create_room_limit() -> BucketLimit {
    BucketLimit {
        max_requests: 5,
        window_ms: 60_000,
    }
}

pub const fn default_join_room_limit() -> BucketLimit {
    BucketLimit {
        max_requests: 10,
        window_ms: 60_000,
    }
}

pub const fn default_game_action_limit() -> BucketLimit {
    BucketLimit {
        max_requests: 100,
        window_ms: 10_000,
    }
}

pub const fn default_send_clue_limit() -> BucketLimit {
    BucketLimit {
        max_requests: 20,
        window_ms: 60_000,
    }
}

// =============================================================================
// Protocol Defaults
// =============================================================================

pub const fn default_room_code_length() -> usize {
    6
}

pub const fn default_max_display_name_length() -> usize {
    24
}

pub const fn default_max_game_id_length() -> usize {
    32
}

pub const fn default_min_players() -> u8 {
    2
}

pub const fn default_max_players_limit() -> u8 {
    20
}

pub const fn default_allow_unicode_names() -> bool {
    true
}

pub const fn default_allow_spaces_in_names() -> bool {
    true
}

pub fn default_allowed_name_symbols() -> Vec<char> {
    vec!['-', '_', '.', '\'']
}

// =============================================================================
// Engine Defaults
// =============================================================================

pub const fn default_max_rounds() -> u32 {
    3
}

pub const fn default_turn_seconds() -> u32 {
    60
}

pub const fn default_free_tier_participants() -> usize {
    8
}

pub const fn default_plus_tier_participants() -> usize {
    16
}

pub const fn default_daily_slice_len() -> usize {
    5
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "party-rooms.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    false
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Text
}

// =============================================================================
// WebSocket Defaults
// =============================================================================

pub fn default_cors_origins() -> String {
    "http://localhost:3000,http://localhost:5173".to_string()
}

pub const fn default_max_message_size() -> usize {
    65536 // 64KB
}

pub const fn default_outbound_queue_size() -> usize {
    64
}
