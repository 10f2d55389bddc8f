
use futures_util::{SinkExt, StreamExt};
use party_rooms::protocol::{ClientMessage, ErrorCode, PlayerId, ServerMessage};
use party_rooms::server::PartyServer;
use party_rooms::websocket::serve;
use std::net::SocketAddr;
use std::sync::Arc;
use test_helpers::test_config;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_test_server() -> SocketAddr {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let server = PartyServer::new(Arc::new(test_config()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        serve(listener, server).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, identity: Option<PlayerId>) -> (Socket, PlayerId) {
    let url = match identity {
        Some(identity) => format!("ws://{addr}/ws?identity={identity}"),
        None => format!("ws://{addr}/ws"),
    };
    let (mut socket, _) = timeout(Duration::from_secs(10), connect_async(&url))
        .await
        .expect("WebSocket connection timed out")
        .expect("Failed to connect");

    match recv(&mut socket).await {
        ServerMessage::Welcome { identity } => (socket, identity),
        other => panic!("expected Welcome, got {other:?}"),
    }
}

async fn send(socket: &mut Socket, message: &ClientMessage) {
    let json = serde_json::to_string(message).unwrap();
    socket.send(Message::Text(json.into())).await.unwrap();
}

async fn recv(socket: &mut Socket) -> ServerMessage {
    loop {
        let frame = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn recv_until(socket: &mut Socket, pred: impl Fn(&ServerMessage) -> bool) -> ServerMessage {
    loop {
        let message = recv(socket).await;
        if pred(&message) {
            return message;
        }
    }
}

#[tokio::test]
async fn test_create_join_and_roster_over_websocket() {
    let addr = start_test_server().await;
    let (mut host, host_id) = connect(addr, None).await;
    let (mut guest, guest_id) = connect(addr, None).await;
    assert_ne!(host_id, guest_id);

    send(
        &mut host,
        &ClientMessage::CreateRoom {
            display_name: "Host".to_string(),
        },
    )
    .await;
    let code = match recv(&mut host).await {
        ServerMessage::RoomJoined(payload) => {
            assert_eq!(payload.you.user_id, host_id);
            payload.room.code
        }
        other => panic!("expected RoomJoined, got {other:?}"),
    };

    send(
        &mut guest,
        &ClientMessage::JoinRoom {
            room_code: code.to_lowercase(),
            display_name: "P2".to_string(),
        },
    )
    .await;
    match recv(&mut guest).await {
        ServerMessage::RoomJoined(payload) => {
            let names: Vec<_> = payload
                .roster
                .iter()
                .map(|p| p.display_name.as_str())
                .collect();
            assert_eq!(names, ["Host", "P2"]);
        }
        other => panic!("expected RoomJoined, got {other:?}"),
    }

    recv_until(&mut host, |m| {
        matches!(m, ServerMessage::RosterUpdated { roster } if roster.len() == 2)
    })
    .await;
}

#[tokio::test]
async fn test_reconnect_with_identity_resumes_membership() {
    let addr = start_test_server().await;
    let (mut host, _) = connect(addr, None).await;
    send(
        &mut host,
        &ClientMessage::CreateRoom {
            display_name: "Host".to_string(),
        },
    )
    .await;
    let code = match recv(&mut host).await {
        ServerMessage::RoomJoined(payload) => payload.room.code,
        other => panic!("expected RoomJoined, got {other:?}"),
    };

    let (mut guest, guest_id) = connect(addr, None).await;
    let join = ClientMessage::JoinRoom {
        room_code: code.clone(),
        display_name: "Guest".to_string(),
    };
    send(&mut guest, &join).await;
    let first_seat = match recv(&mut guest).await {
        ServerMessage::RoomJoined(payload) => payload.you.id,
        other => panic!("expected RoomJoined, got {other:?}"),
    };
    guest.close(None).await.unwrap();

    let (mut resumed, resumed_id) = connect(addr, Some(guest_id)).await;
    assert_eq!(resumed_id, guest_id);
    send(&mut resumed, &join).await;
    match recv(&mut resumed).await {
        ServerMessage::RoomJoined(payload) => {
            assert_eq!(payload.you.id, first_seat);
            assert_eq!(payload.roster.len(), 2);
        }
        other => panic!("expected RoomJoined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_and_oversized_frames_are_rejected() {
    let addr = start_test_server().await;
    let (mut socket, _) = connect(addr, None).await;

    socket
        .send(Message::Text("{\"type\":\"Teleport\"}".into()))
        .await
        .unwrap();
    match recv(&mut socket).await {
        ServerMessage::Error { error_code, .. } => {
            assert_eq!(error_code, Some(ErrorCode::InvalidInput));
        }
        other => panic!("expected Error, got {other:?}"),
    }

    let max = test_config().websocket.max_message_size;
    let oversized = format!(
        "{{\"type\":\"CreateRoom\",\"data\":{{\"display_name\":\"{}\"}}}}",
        "x".repeat(max)
    );
    socket.send(Message::Text(oversized.into())).await.unwrap();
    match recv(&mut socket).await {
        ServerMessage::Error { error_code, .. } => {
            assert_eq!(error_code, Some(ErrorCode::MessageTooLarge));
        }
        other => panic!("expected Error, got {other:?}"),
    }

    // The connection survives both rejections.
    send(&mut socket, &ClientMessage::Ping).await;
    assert!(matches!(recv(&mut socket).await, ServerMessage::Pong));
}

#[tokio::test]
async fn test_http_endpoints() {
    let addr = start_test_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("OK"));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /rooms HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("[]"));
}
