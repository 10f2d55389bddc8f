use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of a connected player
pub type PlayerId = Uuid;
/// Unique identifier for rooms
pub type RoomId = Uuid;

/// Lifecycle status of a room. Only ever advances `Waiting -> Playing -> Finished`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    #[default]
    Waiting,
    Playing,
    Finished,
}

impl RoomStatus {
    /// The single status this one may advance to, if any.
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Playing),
            Self::Playing => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Playing => "playing",
            Self::Finished => "finished",
        }
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A room row as stored in the directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub code: String,
    pub host_id: PlayerId,
    pub game_id: Option<String>,
    pub status: RoomStatus,
    pub is_public: bool,
    pub max_players: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    /// A freshly created, private, waiting room hosted by `host_id`.
    pub fn new(code: String, host_id: PlayerId, max_players: u8) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code,
            host_id,
            game_id: None,
            status: RoomStatus::Waiting,
            is_public: false,
            max_players,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_joinable(&self) -> bool {
        self.status == RoomStatus::Waiting
    }
}

/// Membership row linking a player identity to a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomPlayer {
    pub id: Uuid,
    pub room_id: RoomId,
    pub user_id: PlayerId,
    pub display_name: String,
    pub is_ready: bool,
    pub joined_at: DateTime<Utc>,
    /// Insertion sequence; secondary ordering key after `joined_at`.
    pub seq: u64,
}

impl RoomPlayer {
    /// Ordering key used for rosters and host migration.
    pub fn join_order(&self) -> (DateTime<Utc>, u64) {
        (self.joined_at, self.seq)
    }
}

/// Ephemeral presence announcement for one subscriber of a room channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceRecord {
    pub id: PlayerId,
    pub name: String,
    pub connected_at: DateTime<Utc>,
}

/// Public listing entry returned by `/rooms`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomSummary {
    pub code: String,
    pub game_id: Option<String>,
    pub player_count: usize,
    pub max_players: u8,
    pub created_at: DateTime<Utc>,
}
