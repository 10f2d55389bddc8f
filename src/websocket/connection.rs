use crate::broadcast::BroadcastMessage;
use crate::error::RoomError;
use crate::protocol::{ClientMessage, ErrorCode, PlayerId};
use crate::server::PartyServer;
use axum::extract::ws::{Message, WebSocket};
use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::sending::send_text_message;

pub(super) async fn handle_socket(
    socket: WebSocket,
    server: Arc<PartyServer>,
    player_id: PlayerId,
    addr: SocketAddr,
) {
    let (mut sender, mut receiver) = socket.split();
    let queue_capacity = server.config().websocket.outbound_queue_size.max(1);
    let (tx, mut rx) = mpsc::channel::<BroadcastMessage>(queue_capacity);

    let connection_id = server.register_client(player_id, tx);
    tracing::info!(%player_id, client_addr = %addr, "WebSocket connection established");

    // Outgoing: drain the queue until every sender is dropped or the socket fails.
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if send_text_message(&mut sender, &message, &player_id)
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let server_clone = Arc::clone(&server);
    let mut receive_task = tokio::spawn(async move {
        let max_size = server_clone.config().websocket.max_message_size;
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!(%player_id, "WebSocket error: {}", e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    if text.len() > max_size {
                        tracing::warn!(
                            %player_id,
                            size = text.len(),
                            max = max_size,
                            "Message exceeds size limit"
                        );
                        server_clone.send_error(
                            &player_id,
                            &RoomError::InvalidField {
                                code: ErrorCode::MessageTooLarge,
                                reason: format!(
                                    "message too large ({} bytes, max {max_size} bytes)",
                                    text.len()
                                ),
                            },
                        );
                        continue;
                    }

                    let client_message = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(message) => message,
                        Err(err) => {
                            tracing::debug!(%player_id, error = %err, "Rejected client frame");
                            server_clone.metrics().increment_validation_errors();
                            server_clone.send_error(
                                &player_id,
                                &RoomError::invalid(format!("malformed message: {err}")),
                            );
                            continue;
                        }
                    };
                    server_clone
                        .handle_client_message(player_id, client_message)
                        .await;
                }
                Message::Binary(_) => {
                    server_clone.send_error(
                        &player_id,
                        &RoomError::invalid("binary frames are not supported"),
                    );
                }
                Message::Close(_) => break,
                // axum answers pings itself.
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => receive_task.abort(),
        _ = &mut receive_task => send_task.abort(),
    }

    server.unregister_client(&player_id, connection_id);
    tracing::info!(%player_id, client_addr = %addr, "WebSocket connection closed");
}
