use std::time::Duration;
use thiserror::Error;

use crate::protocol::ErrorCode;
use crate::rate_limit::{RateBucket, RateLimitError};

/// Errors surfaced by room coordination.
///
/// Validation and authorization failures are returned immediately and never retried.
/// `Persistence` means the directory rejected or failed a write; no partial state is left
/// behind. `Transport` is raised by the room channel and triggers a re-subscribe.
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("{bucket} rate limit exceeded; retry in {}ms", .retry_after.as_millis())]
    RateLimited {
        bucket: RateBucket,
        retry_after: Duration,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A specific field failed its shape check
    #[error("invalid input: {reason}")]
    InvalidField { code: ErrorCode, reason: String },
    #[error("room {0} not found")]
    RoomNotFound(String),
    #[error("room {code} is {status} and no longer accepting players")]
    RoomNotJoinable { code: String, status: String },
    #[error("room {code} is full ({max_players} players)")]
    RoomFull { code: String, max_players: u8 },
    #[error("only the host can do that")]
    NotHost,
    #[error("not a member of room {0}")]
    NotMember(String),
    #[error("no game selected")]
    NoGameSelected,
    #[error("invalid room transition: {0}")]
    InvalidTransition(String),
    #[error("persistence error: {0}")]
    Persistence(anyhow::Error),
    #[error("transport error: {0}")]
    Transport(String),
}

impl RoomError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Stable wire code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::RateLimited { .. } => ErrorCode::RateLimitExceeded,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::InvalidField { code, .. } => *code,
            Self::RoomNotFound(_) => ErrorCode::RoomNotFound,
            Self::RoomNotJoinable { .. } => ErrorCode::RoomNotJoinable,
            Self::RoomFull { .. } => ErrorCode::RoomFull,
            Self::NotHost => ErrorCode::NotHost,
            Self::NotMember(_) => ErrorCode::NotInRoom,
            Self::NoGameSelected => ErrorCode::NoGameSelected,
            Self::InvalidTransition(_) => ErrorCode::InvalidRoomState,
            Self::Persistence(_) => ErrorCode::StorageError,
            Self::Transport(_) => ErrorCode::TransportError,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Whether the failure came from infrastructure rather than the caller.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Transport(_))
    }
}

impl From<RateLimitError> for RoomError {
    fn from(err: RateLimitError) -> Self {
        Self::RateLimited {
            bucket: err.bucket(),
            retry_after: err.retry_after(),
        }
    }
}

pub type RoomResult<T> = Result<T, RoomError>;
