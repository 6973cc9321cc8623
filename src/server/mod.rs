//! WebSocket signaling server
//!
//! Accepts TCP connections, upgrades them to WebSocket on the configured
//! path, and runs one signaling session per connection.

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use listener::SignalingServer;
