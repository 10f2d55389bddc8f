use serde::{Deserialize, Serialize};

use super::error_codes::ErrorCode;
use super::types::{PlayerId, PresenceRecord, Room, RoomPlayer};

/// Opaque game snapshot carried over a room channel. The channel never looks
/// inside `state`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameSnapshot {
    pub game_id: String,
    pub revision: u64,
    pub state: serde_json::Value,
}

impl GameSnapshot {
    /// Placeholder snapshot used when a host starts a game without engine state.
    pub fn empty(game_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            revision: 0,
            state: serde_json::Value::Null,
        }
    }
}

/// Player intent forwarded to the host; the host's engine decides its effect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerAction {
    pub identity: PlayerId,
    pub action_name: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Broadcast payloads on a room channel, framed as `{"type": ..., "payload": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum ChannelEvent {
    /// Host-only full snapshot; receivers replace their view wholesale
    GameStateUpdate(GameSnapshot),
    /// Any member; interpreted by the host
    PlayerAction(PlayerAction),
    /// Sent once by the host when the room enters `playing`
    HostStartGame(GameSnapshot),
    /// Instructs every subscriber to tear down
    RoomClosed { reason: String },
}

impl ChannelEvent {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::GameStateUpdate(_) => "GAME_STATE_UPDATE",
            Self::PlayerAction(_) => "PLAYER_ACTION",
            Self::HostStartGame(_) => "HOST_START_GAME",
            Self::RoomClosed { .. } => "ROOM_CLOSED",
        }
    }

    /// Events only the current host may publish.
    pub const fn requires_host(&self) -> bool {
        matches!(
            self,
            Self::GameStateUpdate(_) | Self::HostStartGame(_) | Self::RoomClosed { .. }
        )
    }

    /// Events that follow a directory status change and are only emitted by the
    /// coordinator after that change commits.
    pub const fn is_lifecycle(&self) -> bool {
        matches!(self, Self::HostStartGame(_) | Self::RoomClosed { .. })
    }
}

/// A channel event stamped with its sender.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BroadcastEnvelope {
    pub from: PlayerId,
    pub event: ChannelEvent,
}

/// Message types sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    /// Create a room and become its host
    CreateRoom { display_name: String },
    /// Join an existing room by code
    JoinRoom {
        room_code: String,
        display_name: String,
    },
    /// Leave the current room
    LeaveRoom,
    /// Host removes another member
    KickPlayer { target: PlayerId },
    SelectGame { game_id: String },
    SetVisibility { is_public: bool },
    SetMaxPlayers { max_players: u8 },
    /// Toggle own readiness (non-host members)
    SetReady { ready: bool },
    /// Host starts the selected game; the snapshot is broadcast once as `HOST_START_GAME`
    StartGame {
        #[serde(default)]
        snapshot: Option<GameSnapshot>,
    },
    FinishGame,
    CloseRoom {
        #[serde(default)]
        reason: Option<String>,
    },
    /// Repair a missing host after observing one
    MigrateHost,
    /// Publish an event on the room channel
    Broadcast { event: ChannelEvent },
    /// Heartbeat to maintain connection
    Ping,
}

/// Payload for the RoomJoined server message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomJoinedPayload {
    pub room: Room,
    pub roster: Vec<RoomPlayer>,
    pub you: RoomPlayer,
}

/// Message types sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    /// First message on every connection; carries the identity to present on reconnect
    Welcome { identity: PlayerId },
    RoomJoined(Box<RoomJoinedPayload>),
    RoomLeft { room_code: String },
    /// Directory state of the bound room changed
    RoomUpdated { room: Room },
    /// Full roster, ordered by join time
    RosterUpdated { roster: Vec<RoomPlayer> },
    /// Full presence set for the bound room
    PresenceSync { members: Vec<PresenceRecord> },
    ChannelEvent(BroadcastEnvelope),
    RoomClosed { room_code: String, reason: String },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_code: Option<ErrorCode>,
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_after_ms: Option<u64>,
    },
    Pong,
}

impl ServerMessage {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            error_code: Some(code),
            retry_after_ms: None,
        }
    }
}
