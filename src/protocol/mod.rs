// Protocol module: wire messages, room data model, codes and validation

pub mod error_codes;
pub mod messages;
pub mod room_codes;
pub mod types;
pub mod validation;

pub use error_codes::ErrorCode;

pub use types::{PlayerId, PresenceRecord, Room, RoomId, RoomPlayer, RoomStatus, RoomSummary};

pub use messages::{
    BroadcastEnvelope, ChannelEvent, ClientMessage, GameSnapshot, PlayerAction,
    RoomJoinedPayload, ServerMessage,
};
