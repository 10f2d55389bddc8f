// WebSocket module - organized into focused submodules
//
// - handler: WebSocket upgrade handler (entry point)
// - connection: per-socket send and receive loops
// - sending: outbound frame encoding
// - routes: HTTP route setup (health, metrics, public rooms)

mod connection;
mod handler;
mod routes;
mod sending;

pub use handler::{websocket_handler, ConnectQuery};
pub use routes::{create_router, run_server, serve};
