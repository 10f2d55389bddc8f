use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use super::{ChannelError, ChannelMessage, PubSubTransport};
use crate::broadcast::BroadcastMessage;
use crate::metrics::ServerMetrics;
use crate::protocol::{PresenceRecord, ServerMessage};
use crate::retry::{RetryConfig, RetryExecutor};

/// What a subscriber observes on its room channel.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Broadcast(BroadcastMessage),
    Presence(Arc<Vec<PresenceRecord>>),
    /// Messages were overwritten before this subscriber read them
    Lagged(u64),
    /// The subscription dropped and was re-established; broadcasts in between are lost
    /// and durable state must be re-read from the directory
    Resubscribed,
    /// The topic is gone or the retry budget ran out. Terminal.
    Closed,
}

/// One subscriber's membership in a room channel, with automatic re-subscription.
pub struct ChannelSession {
    transport: Arc<dyn PubSubTransport>,
    topic: String,
    presence: PresenceRecord,
    receiver: Option<broadcast::Receiver<ChannelMessage>>,
    retry: RetryConfig,
    metrics: Option<Arc<ServerMetrics>>,
}

impl std::fmt::Debug for ChannelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSession")
            .field("topic", &self.topic)
            .field("presence", &self.presence)
            .field("subscribed", &self.receiver.is_some())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ChannelSession {
    /// Subscribe to `topic` and announce `presence`.
    pub async fn join(
        transport: Arc<dyn PubSubTransport>,
        topic: impl Into<String>,
        presence: PresenceRecord,
        retry: RetryConfig,
        metrics: Option<Arc<ServerMetrics>>,
    ) -> Result<Self, ChannelError> {
        let topic = topic.into();
        let receiver = subscribe_and_track(&*transport, &topic, &presence).await?;
        Ok(Self {
            transport,
            topic,
            presence,
            receiver: Some(receiver),
            retry,
            metrics,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_closed(&self) -> bool {
        self.receiver.is_none()
    }

    /// Wait for the next event. Re-subscribes transparently when the transport drops.
    pub async fn next_event(&mut self) -> SessionEvent {
        let Some(receiver) = self.receiver.as_mut() else {
            return SessionEvent::Closed;
        };

        match receiver.recv().await {
            Ok(ChannelMessage::Broadcast(message)) => SessionEvent::Broadcast(message),
            Ok(ChannelMessage::PresenceSync(members)) => SessionEvent::Presence(members),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(topic = %self.topic, skipped, "Channel receiver lagged");
                if let Some(metrics) = &self.metrics {
                    metrics.add_broadcasts_lagged(skipped);
                }
                SessionEvent::Lagged(skipped)
            }
            Err(RecvError::Closed) => match self.resubscribe().await {
                Ok(receiver) => {
                    self.receiver = Some(receiver);
                    if let Some(metrics) = &self.metrics {
                        metrics.increment_channel_resubscribes();
                    }
                    SessionEvent::Resubscribed
                }
                Err(err) => {
                    tracing::info!(topic = %self.topic, error = %err, "Channel closed");
                    self.receiver = None;
                    SessionEvent::Closed
                }
            },
        }
    }

    async fn resubscribe(&self) -> Result<broadcast::Receiver<ChannelMessage>, ChannelError> {
        let executor = match &self.metrics {
            Some(metrics) => RetryExecutor::with_metrics(self.retry.clone(), Arc::clone(metrics)),
            None => RetryExecutor::new(self.retry.clone()),
        };
        let presence = PresenceRecord {
            connected_at: chrono::Utc::now(),
            ..self.presence.clone()
        };

        executor
            .execute_with_condition(
                "channel.resubscribe",
                || subscribe_and_track(&*self.transport, &self.topic, &presence),
                ChannelError::is_retryable,
            )
            .await
    }

    /// Withdraw presence. The subscription ends when the session is dropped.
    pub async fn leave(mut self) {
        self.receiver = None;
        if let Err(err) = self
            .transport
            .untrack(&self.topic, &self.presence.id)
            .await
        {
            tracing::debug!(topic = %self.topic, error = %err, "Failed to untrack presence");
        }
    }
}

async fn subscribe_and_track(
    transport: &dyn PubSubTransport,
    topic: &str,
    presence: &PresenceRecord,
) -> Result<broadcast::Receiver<ChannelMessage>, ChannelError> {
    // Subscribe first so our own presence sync is observed.
    let receiver = transport.subscribe(topic).await?;
    transport.track(topic, presence.clone()).await?;
    Ok(receiver)
}

impl SessionEvent {
    /// The channel event carried by a broadcast, if any.
    pub fn envelope(&self) -> Option<&crate::protocol::BroadcastEnvelope> {
        match self {
            Self::Broadcast(message) => message.envelope(),
            _ => None,
        }
    }

    /// The server message to forward to a connected client, if this event produces one.
    pub fn server_message(&self) -> Option<BroadcastMessage> {
        match self {
            Self::Broadcast(message) => Some(message.clone()),
            Self::Presence(members) => Some(BroadcastMessage::new(ServerMessage::PresenceSync {
                members: members.as_ref().clone(),
            })),
            _ => None,
        }
    }
}
