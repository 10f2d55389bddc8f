//! Configuration module for the party rooms server.
//!
//! Configuration is read from JSON documents layered over compiled defaults, with
//! environment variable overrides on top.
//!
//! # Module Structure
//!
//! - [`crate::config::types`]: Root `Config` struct
//! - [`server`]: Room lifecycle and channel reconnection settings
//! - [`rate_limit`]: Per-bucket admission limits
//! - [`protocol`]: Room code shape and display name rules
//! - [`engine`]: Turn engine defaults and tier ceilings
//! - [`logging`]: Logging configuration
//! - [`websocket`]: WebSocket endpoint settings
//! - [`crate::config::loader`]: Configuration loading functions
//! - [`crate::config::validation`]: Configuration validation functions
//! - [`crate::config::defaults`]: Default value functions

pub mod defaults;
pub mod engine;
pub mod loader;
pub mod logging;
pub mod protocol;
pub mod rate_limit;
pub mod server;
pub mod types;
pub mod validation;
pub mod websocket;

pub use engine::EngineSettings;

pub use loader::{load, load_file};

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use protocol::{DisplayNameValidationConfig, ProtocolConfig};

pub use rate_limit::{BucketLimit, RateLimitConfig};

pub use server::ServerConfig;

pub use types::Config;

pub use validation::validate_config;

pub use websocket::WebSocketConfig;
