//! Room coordination
//!
//! The coordinator is the only writer of room state. It validates input, applies
//! admission limits, performs the directory writes and publishes the resulting
//! channel events.

pub mod room_coordinator;

pub use room_coordinator::{JoinedRoom, LeaveOutcome, RoomCoordinator, CLUE_ACTION};
