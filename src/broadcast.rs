//! Shared outbound messages for fan-out to many connections
//!
//! A room channel delivers the same message to every subscriber. `BroadcastMessage`
//! wraps it in an `Arc` and caches its JSON encoding so that N subscribers cost N
//! pointer clones and one serialization.

use bytes::Bytes;
use std::sync::{Arc, OnceLock};

use crate::protocol::{BroadcastEnvelope, ServerMessage};

/// An Arc-wrapped server message with a lazily computed, shared JSON encoding.
#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    inner: Arc<ServerMessage>,
    /// Shared by every clone, so only the first sender serializes
    serialized_json: Arc<OnceLock<Bytes>>,
}

impl BroadcastMessage {
    #[inline]
    pub fn new(message: ServerMessage) -> Self {
        Self {
            inner: Arc::new(message),
            serialized_json: Arc::new(OnceLock::new()),
        }
    }

    #[inline]
    pub fn message(&self) -> &ServerMessage {
        &self.inner
    }

    /// The channel envelope, when this message carries one.
    pub fn envelope(&self) -> Option<&BroadcastEnvelope> {
        match &*self.inner {
            ServerMessage::ChannelEvent(envelope) => Some(envelope),
            _ => None,
        }
    }

    /// Get or compute serialized JSON bytes
    pub fn get_or_serialize_json(&self) -> Result<Bytes, serde_json::Error> {
        if let Some(bytes) = self.serialized_json.get() {
            return Ok(bytes.clone());
        }

        let bytes = Bytes::from(serde_json::to_vec(&*self.inner)?);
        // A concurrent sender may have won the race; either encoding is identical.
        Ok(self.serialized_json.get_or_init(|| bytes).clone())
    }

    #[inline]
    pub fn is_serialized(&self) -> bool {
        self.serialized_json.get().is_some()
    }
}

impl From<ServerMessage> for BroadcastMessage {
    fn from(msg: ServerMessage) -> Self {
        Self::new(msg)
    }
}

impl AsRef<ServerMessage> for BroadcastMessage {
    fn as_ref(&self) -> &ServerMessage {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ChannelEvent;
    use uuid::Uuid;

    #[test]
    fn clones_share_serialization() {
        let message = BroadcastMessage::new(ServerMessage::Pong);
        let clone = message.clone();
        assert!(!clone.is_serialized());

        let bytes = message.get_or_serialize_json().unwrap();
        assert!(clone.is_serialized());
        assert_eq!(clone.get_or_serialize_json().unwrap(), bytes);
        assert_eq!(&bytes[..], br#"{"type":"Pong"}"#);
    }

    #[test]
    fn envelope_accessor() {
        let from = Uuid::new_v4();
        let message = BroadcastMessage::new(ServerMessage::ChannelEvent(BroadcastEnvelope {
            from,
            event: ChannelEvent::RoomClosed {
                reason: "done".to_string(),
            },
        }));
        assert_eq!(message.envelope().map(|e| e.from), Some(from));
        assert!(BroadcastMessage::new(ServerMessage::Pong).envelope().is_none());
    }
}
