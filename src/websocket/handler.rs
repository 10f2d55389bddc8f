use crate::server::PartyServer;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, Query, State};
use axum::response::Response;
use std::net::SocketAddr;
use std::sync::Arc;

use super::connection::handle_socket;

/// Query parameters accepted on `/ws`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ConnectQuery {
    /// Identity from a previous `Welcome`, presented to resume membership
    #[serde(default)]
    pub identity: Option<String>,
}

/// WebSocket handler for the room protocol
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(server): State<Arc<PartyServer>>,
    Query(query): Query<ConnectQuery>,
) -> Response {
    let identity = server.resolve_identity(query.identity.as_deref());
    let max_message_size = server.config().websocket.max_message_size;
    // Frames past the limit still reach the connection loop, which answers with
    // MESSAGE_TOO_LARGE instead of dropping the socket.
    ws.max_message_size(max_message_size.saturating_mul(4))
        .on_upgrade(move |socket| handle_socket(socket, server, identity, addr))
}
