use crate::broadcast::BroadcastMessage;
use crate::protocol::PlayerId;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;

/// Write one message as a text frame. `Err` means the socket is gone.
pub(super) async fn send_text_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &BroadcastMessage,
    player_id: &PlayerId,
) -> Result<(), ()> {
    let bytes = match message.get_or_serialize_json() {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(%player_id, "Failed to serialize message: {}", e);
            return Ok(());
        }
    };
    let Ok(text) = std::str::from_utf8(&bytes) else {
        tracing::error!(%player_id, "Serialized message is not UTF-8");
        return Ok(());
    };

    if sender.send(Message::Text(text.into())).await.is_err() {
        tracing::warn!(%player_id, "Failed to send message, connection closed");
        return Err(());
    }
    Ok(())
}
