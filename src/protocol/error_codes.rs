use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for structured error handling on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    InvalidInput,
    InvalidRoomCode,
    InvalidDisplayName,
    InvalidGameId,
    InvalidMaxPlayers,
    MessageTooLarge,

    // Room errors
    RoomNotFound,
    RoomNotJoinable,
    RoomFull,
    NotInRoom,
    AlreadyInRoom,
    NoGameSelected,
    InvalidRoomState,

    // Authority errors
    NotHost,

    // Rate limiting
    RateLimitExceeded,

    // Server errors
    StorageError,
    TransportError,
    InternalError,
}

impl ErrorCode {
    /// Returns a human-readable description of this error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidInput => {
                "The provided input is invalid or malformed. Check your request parameters."
            }
            Self::InvalidRoomCode => {
                "The room code is invalid. Room codes use letters and digits without 0, O, 1 or I."
            }
            Self::InvalidDisplayName => {
                "The display name is invalid. Names must be non-empty and use allowed characters."
            }
            Self::InvalidGameId => {
                "The game id is invalid. Use lowercase letters, digits, '-' and '_'."
            }
            Self::InvalidMaxPlayers => {
                "The requested player limit is outside the allowed range for this room."
            }
            Self::MessageTooLarge => "The message exceeds the maximum allowed size.",
            Self::RoomNotFound => "No room exists with that code. It may have been closed.",
            Self::RoomNotJoinable => {
                "The room has already started or finished and is no longer accepting players."
            }
            Self::RoomFull => "The room has reached its maximum number of players.",
            Self::NotInRoom => "You must join a room before performing this action.",
            Self::AlreadyInRoom => "You are already in a room. Leave it before joining another.",
            Self::NoGameSelected => "A game must be selected before the room can start.",
            Self::InvalidRoomState => {
                "The room is not in a state that allows this action. Refresh and try again."
            }
            Self::NotHost => "Only the room host can perform this action.",
            Self::RateLimitExceeded => {
                "Too many requests in a short period. Wait before trying again."
            }
            Self::StorageError => {
                "A storage error occurred while processing your request. Please try again later."
            }
            Self::TransportError => {
                "The room channel is unavailable. The connection will be re-established."
            }
            Self::InternalError => {
                "An internal server error occurred. Please try again or contact support."
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
