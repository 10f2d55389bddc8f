use crate::config::Config;
use crate::metrics::MetricsSnapshot;
use crate::protocol::RoomSummary;
use crate::server::PartyServer;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::handler::websocket_handler;

/// Create the Axum router with WebSocket support
pub fn create_router(cors_origins: &str) -> axum::Router<Arc<PartyServer>> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    // Parse CORS origins
    let cors = if cors_origins == "*" {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
            .collect();

        if origins.is_empty() {
            tracing::warn!("No valid CORS origins configured, using permissive CORS");
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    axum::Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/rooms", get(public_rooms))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Health check endpoint
async fn health_check(
    State(server): State<Arc<PartyServer>>,
) -> axum::response::Result<&'static str> {
    if server.health_check().await {
        Ok("OK")
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE.into())
    }
}

async fn metrics_handler(State(server): State<Arc<PartyServer>>) -> Json<MetricsSnapshot> {
    Json(server.metrics().snapshot())
}

/// Public rooms still waiting for players.
async fn public_rooms(
    State(server): State<Arc<PartyServer>>,
) -> Result<Json<Vec<RoomSummary>>, StatusCode> {
    match server.coordinator().public_rooms().await {
        Ok(rooms) => Ok(Json(rooms)),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to list public rooms");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Serve `server` on an already bound listener until the future is dropped or fails.
pub async fn serve(listener: TcpListener, server: Arc<PartyServer>) -> anyhow::Result<()> {
    let app = create_router(&server.config().websocket.cors_origins).with_state(server);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Build an in-memory server from `config`, start its maintenance tasks and serve it.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let server = PartyServer::new(Arc::new(config));
    let maintenance = server.spawn_maintenance();

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Starting party rooms server");

    let result = serve(listener, server).await;
    for task in maintenance {
        task.abort();
    }
    result
}
