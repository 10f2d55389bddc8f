//! WebSocket endpoint configuration.

use super::defaults::{
    default_cors_origins, default_max_message_size, default_outbound_queue_size,
};
use serde::{Deserialize, Serialize};

/// WebSocket configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebSocketConfig {
    /// Comma separated list of allowed origins, or "*"
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
    /// Largest accepted inbound text frame (bytes)
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Outbound messages buffered per connection before new ones are dropped
    #[serde(default = "default_outbound_queue_size")]
    pub outbound_queue_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            cors_origins: default_cors_origins(),
            max_message_size: default_max_message_size(),
            outbound_queue_size: default_outbound_queue_size(),
        }
    }
}

impl WebSocketConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_message_size < 256 {
            anyhow::bail!(
                "websocket.max_message_size must be at least 256 bytes (configured: {})",
                self.max_message_size
            );
        }
        if self.outbound_queue_size == 0 {
            anyhow::bail!("websocket.outbound_queue_size must be greater than zero");
        }
        Ok(())
    }
}
