//! Room directory: the durable store of rooms and their members.
//!
//! The directory is the source of truth for membership, host identity, game selection
//! and room status. Every operation touches rows of a single room, and each write is
//! atomic on its own: capacity checks happen inside the membership insert, status and
//! host changes are compare-and-set. Multi-step sequences are composed (and compensated)
//! by the coordinator.

mod in_memory;

pub use in_memory::InMemoryDirectory;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::protocol::{PlayerId, Room, RoomId, RoomPlayer, RoomStatus, RoomSummary};

/// Returned (inside `anyhow::Error`) when a room insert collides with a live code.
#[derive(Debug, thiserror::Error)]
#[error("room code {0} is already in use")]
pub struct RoomCodeTaken(pub String);

/// Values for a membership row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewMember {
    pub user_id: PlayerId,
    pub display_name: String,
    pub is_ready: bool,
}

/// Outcome of an atomic membership insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipInsert {
    Inserted(RoomPlayer),
    /// The identity was already a member; the stored row is returned unchanged
    Existing(RoomPlayer),
    Full { max_players: u8 },
    NotJoinable(RoomStatus),
    RoomMissing,
}

/// Outcome of a conditional room write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomUpdate {
    Updated(Room),
    /// The precondition did not hold; carries the room as stored
    Rejected(Room),
    Missing,
}

/// Which rows of a room changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Room,
    Players,
    Deleted,
}

/// Row-change notification published after every committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryChange {
    pub room_id: RoomId,
    pub code: String,
    pub kind: ChangeKind,
}

/// Directory abstraction for room and membership storage
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    /// Insert a new room row. Fails with [`RoomCodeTaken`] if the code is in use.
    async fn insert_room(&self, room: Room) -> Result<Room>;

    async fn get_room(&self, room_id: &RoomId) -> Result<Option<Room>>;

    async fn get_room_by_code(&self, code: &str) -> Result<Option<Room>>;

    /// Delete a room and cascade to its members. Returns the deleted row.
    async fn delete_room(&self, room_id: &RoomId) -> Result<Option<Room>>;

    /// Set the host only if the stored host still equals `expected`.
    async fn compare_and_set_host(
        &self,
        room_id: &RoomId,
        expected: &PlayerId,
        new_host: &PlayerId,
    ) -> Result<RoomUpdate>;

    /// Set the selected game; rejected unless the room is waiting.
    async fn set_game(&self, room_id: &RoomId, game_id: &str) -> Result<RoomUpdate>;

    async fn set_visibility(&self, room_id: &RoomId, is_public: bool) -> Result<RoomUpdate>;

    /// Set capacity; rejected if it would drop below the current member count.
    async fn set_max_players(&self, room_id: &RoomId, max_players: u8) -> Result<RoomUpdate>;

    /// Advance `from -> from.next()`; rejected if the stored status is not `from`.
    async fn advance_status(&self, room_id: &RoomId, from: RoomStatus) -> Result<RoomUpdate>;

    /// Refresh `updated_at` without publishing a change. Returns `false` if the room
    /// is gone.
    async fn touch_room(&self, room_id: &RoomId) -> Result<bool>;

    /// Insert a membership row, re-checking status and capacity in the same write.
    async fn insert_player(&self, room_id: &RoomId, member: NewMember) -> Result<MembershipInsert>;

    async fn delete_player(&self, room_id: &RoomId, user_id: &PlayerId)
        -> Result<Option<RoomPlayer>>;

    async fn set_player_ready(
        &self,
        room_id: &RoomId,
        user_id: &PlayerId,
        ready: bool,
    ) -> Result<Option<RoomPlayer>>;

    /// Members ordered by `(joined_at, seq)`.
    async fn list_players(&self, room_id: &RoomId) -> Result<Vec<RoomPlayer>>;

    /// Public rooms still waiting for players.
    async fn list_public_rooms(&self) -> Result<Vec<RoomSummary>>;

    /// Delete finished rooms idle past `finished_timeout` and any room idle past
    /// `idle_timeout`. Returns the deleted rooms.
    async fn cleanup_stale_rooms(
        &self,
        finished_timeout: chrono::Duration,
        idle_timeout: chrono::Duration,
    ) -> Result<Vec<Room>>;

    async fn room_count(&self) -> Result<usize>;

    /// Receive a notification for every committed write.
    fn subscribe_changes(&self) -> broadcast::Receiver<DirectoryChange>;

    async fn health_check(&self) -> bool;
}
