//! Presence and broadcast channel, one topic per room code.
//!
//! Broadcasts are best-effort and at-most-once: a receiver that falls more than the
//! topic capacity behind silently loses the oldest messages. Presence is always delivered
//! as the complete current set so a subscriber that missed updates heals on the next one.
//! Anything that must survive a dropped message lives in the directory.

mod in_memory;
mod session;

pub use in_memory::InMemoryTransport;
pub use session::{ChannelSession, SessionEvent};

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::broadcast::BroadcastMessage;
use crate::protocol::{BroadcastEnvelope, PlayerId, PresenceRecord};

/// What a topic delivers to its subscribers.
#[derive(Debug, Clone)]
pub enum ChannelMessage {
    /// A `ServerMessage::ChannelEvent`, serialized at most once for all subscribers
    Broadcast(BroadcastMessage),
    /// Full presence set ordered by `(connected_at, id)`
    PresenceSync(Arc<Vec<PresenceRecord>>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The topic was closed or never opened; its room is gone
    #[error("channel {0} is closed")]
    TopicClosed(String),
    /// The transport dropped; re-subscribing may succeed
    #[error("channel {0} is unavailable: {1}")]
    Unavailable(String, String),
}

impl ChannelError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(..))
    }
}

/// Pub/sub transport carrying room channels.
#[async_trait]
pub trait PubSubTransport: Send + Sync {
    /// Make a topic available to subscribers. Called once the room row exists.
    async fn open(&self, topic: &str) -> Result<(), ChannelError>;

    async fn subscribe(&self, topic: &str)
        -> Result<broadcast::Receiver<ChannelMessage>, ChannelError>;

    /// Deliver to current subscribers. Returns how many receivers were reached.
    async fn broadcast(&self, topic: &str, envelope: BroadcastEnvelope)
        -> Result<usize, ChannelError>;

    /// Announce (or refresh) presence; every subscriber receives the full set.
    async fn track(&self, topic: &str, presence: PresenceRecord) -> Result<(), ChannelError>;

    async fn untrack(&self, topic: &str, id: &PlayerId) -> Result<(), ChannelError>;

    async fn presence(&self, topic: &str) -> Result<Vec<PresenceRecord>, ChannelError>;

    /// Close the topic; existing subscribers see the stream end and cannot re-subscribe.
    async fn close(&self, topic: &str) -> Result<(), ChannelError>;
}
