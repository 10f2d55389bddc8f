#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Party Rooms
//!
//! Room coordination for small multiplayer party games: a room directory with short
//! join codes, a realtime channel per room with presence, host-authoritative turn
//! engines, and a deterministic daily challenge.
//!
//! Everything runs in memory. The directory and channel transport sit behind traits
//! so other backends can be plugged in.

/// Shared outbound messages with cached JSON encoding
pub mod broadcast;

/// Realtime room channels: transport trait, presence and subscriptions
pub mod channel;

/// Server configuration and environment variables
pub mod config;

/// Room lifecycle and membership coordination
pub mod coordination;

/// Deterministic daily challenge and streaks
pub mod daily;

/// Persistent room and membership store
pub mod directory;

/// Host-authoritative turn engine
pub mod engine;

/// Error types surfaced to clients
pub mod error;

/// Stable per-device identity
pub mod identity;

/// Structured logging configuration
pub mod logging;

/// Metrics collection and reporting
pub mod metrics;

/// WebSocket message protocol definitions
pub mod protocol;

/// Rate limiting implementation
pub mod rate_limit;

/// Retry logic utilities
pub mod retry;

/// Connection hub mapping clients onto room operations
pub mod server;

/// WebSocket connection handling
pub mod websocket;
