use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::{ChannelError, ChannelMessage, PubSubTransport};
use crate::broadcast::BroadcastMessage;
use crate::protocol::{BroadcastEnvelope, PlayerId, PresenceRecord, ServerMessage};

struct Topic {
    sender: broadcast::Sender<ChannelMessage>,
    /// Sorted by `(connected_at, id)`
    presence: Vec<PresenceRecord>,
}

impl Topic {
    fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            presence: Vec::new(),
        }
    }

    fn sync_presence(&self) {
        let snapshot = Arc::new(self.presence.clone());
        let _ = self.sender.send(ChannelMessage::PresenceSync(snapshot));
    }
}

/// Process-local transport backed by one tokio broadcast channel per topic.
pub struct InMemoryTransport {
    topics: DashMap<String, Topic>,
    capacity: usize,
}

impl InMemoryTransport {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn is_open(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    pub fn open_topics(&self) -> usize {
        self.topics.len()
    }

    /// Drop every current subscription on `topic` as a network partition would; the
    /// topic stays open and its presence set is cleared.
    pub fn drop_subscribers(&self, topic: &str) -> bool {
        let Some(mut entry) = self.topics.get_mut(topic) else {
            return false;
        };
        let capacity = self.capacity;
        *entry.value_mut() = Topic::new(capacity);
        true
    }

    fn closed(topic: &str) -> ChannelError {
        ChannelError::TopicClosed(topic.to_string())
    }
}

#[async_trait]
impl PubSubTransport for InMemoryTransport {
    async fn open(&self, topic: &str) -> Result<(), ChannelError> {
        let capacity = self.capacity;
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(capacity));
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
    ) -> Result<broadcast::Receiver<ChannelMessage>, ChannelError> {
        self.topics
            .get(topic)
            .map(|entry| entry.sender.subscribe())
            .ok_or_else(|| Self::closed(topic))
    }

    async fn broadcast(
        &self,
        topic: &str,
        envelope: BroadcastEnvelope,
    ) -> Result<usize, ChannelError> {
        let entry = self.topics.get(topic).ok_or_else(|| Self::closed(topic))?;
        let message = BroadcastMessage::new(ServerMessage::ChannelEvent(envelope));
        // Sending with no subscribers is not an error for a best-effort channel.
        Ok(entry
            .sender
            .send(ChannelMessage::Broadcast(message))
            .unwrap_or(0))
    }

    async fn track(&self, topic: &str, presence: PresenceRecord) -> Result<(), ChannelError> {
        let mut entry = self
            .topics
            .get_mut(topic)
            .ok_or_else(|| Self::closed(topic))?;
        let members = &mut entry.presence;
        members.retain(|p| p.id != presence.id);
        members.push(presence);
        members.sort_by(|a, b| (a.connected_at, a.id).cmp(&(b.connected_at, b.id)));
        entry.sync_presence();
        Ok(())
    }

    async fn untrack(&self, topic: &str, id: &PlayerId) -> Result<(), ChannelError> {
        let Some(mut entry) = self.topics.get_mut(topic) else {
            // Untracking from a closed topic is a no-op.
            return Ok(());
        };
        let before = entry.presence.len();
        entry.presence.retain(|p| p.id != *id);
        if entry.presence.len() != before {
            entry.sync_presence();
        }
        Ok(())
    }

    async fn presence(&self, topic: &str) -> Result<Vec<PresenceRecord>, ChannelError> {
        self.topics
            .get(topic)
            .map(|entry| entry.presence.clone())
            .ok_or_else(|| Self::closed(topic))
    }

    async fn close(&self, topic: &str) -> Result<(), ChannelError> {
        // Dropping the sender ends every receiver's stream.
        self.topics.remove(topic);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ChannelEvent;
    use chrono::{Duration, Utc};
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};
    use uuid::Uuid;

    fn presence(name: &str, offset_ms: i64) -> PresenceRecord {
        PresenceRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            connected_at: Utc::now() + Duration::milliseconds(offset_ms),
        }
    }

    fn closed_event(from: PlayerId) -> BroadcastEnvelope {
        BroadcastEnvelope {
            from,
            event: ChannelEvent::RoomClosed {
                reason: "test".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn subscribing_requires_an_open_topic() {
        let transport = InMemoryTransport::new(16);
        assert_eq!(
            transport.subscribe("AB7KQ2").await.unwrap_err(),
            ChannelError::TopicClosed("AB7KQ2".to_string())
        );
        transport.open("AB7KQ2").await.unwrap();
        assert!(transport.subscribe("AB7KQ2").await.is_ok());
    }

    #[tokio::test]
    async fn presence_is_always_the_full_ordered_set() {
        let transport = InMemoryTransport::new(16);
        transport.open("ROOM22").await.unwrap();
        let mut rx = transport.subscribe("ROOM22").await.unwrap();

        let late = presence("late", 50);
        let early = presence("early", 0);
        transport.track("ROOM22", late.clone()).await.unwrap();
        transport.track("ROOM22", early.clone()).await.unwrap();

        let _first = rx.recv().await.unwrap();
        let ChannelMessage::PresenceSync(set) = rx.recv().await.unwrap() else {
            panic!("expected presence sync");
        };
        let names: Vec<_> = set.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["early", "late"]);

        transport.untrack("ROOM22", &early.id).await.unwrap();
        let ChannelMessage::PresenceSync(set) = rx.recv().await.unwrap() else {
            panic!("expected presence sync");
        };
        assert_eq!(set.as_slice(), [late]);
    }

    #[tokio::test]
    async fn lagging_receivers_lose_oldest_messages() {
        let transport = InMemoryTransport::new(2);
        transport.open("LAG234").await.unwrap();
        let mut rx = transport.subscribe("LAG234").await.unwrap();
        let from = Uuid::new_v4();

        for _ in 0..5 {
            transport.broadcast("LAG234", closed_event(from)).await.unwrap();
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
        assert!(rx.recv().await.is_ok());
        assert!(rx.recv().await.is_ok());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_reaches_nobody() {
        let transport = InMemoryTransport::new(4);
        transport.open("NOB234").await.unwrap();
        let reached = transport
            .broadcast("NOB234", closed_event(Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(reached, 0);
    }

    #[tokio::test]
    async fn close_ends_streams_and_blocks_resubscribe() {
        let transport = InMemoryTransport::new(4);
        transport.open("CLS234").await.unwrap();
        let mut rx = transport.subscribe("CLS234").await.unwrap();

        transport.close("CLS234").await.unwrap();
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
        assert!(transport.subscribe("CLS234").await.is_err());
        assert!(transport.untrack("CLS234", &Uuid::new_v4()).await.is_ok());
    }

    #[tokio::test]
    async fn dropped_subscribers_can_resubscribe() {
        let transport = InMemoryTransport::new(4);
        transport.open("DRP234").await.unwrap();
        let mut rx = transport.subscribe("DRP234").await.unwrap();
        transport
            .track("DRP234", presence("a", 0))
            .await
            .unwrap();
        let _ = rx.recv().await;

        assert!(transport.drop_subscribers("DRP234"));
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
        assert!(transport.presence("DRP234").await.unwrap().is_empty());
        assert!(transport.subscribe("DRP234").await.is_ok());
    }
}
