//! Utility functions and helper methods for the game server.
//!
//! This module provides convenient factory functions and utilities
//! for creating server instances with different configurations.

use crate::{config::ServerConfig, server::GameServer};

/// Creates a new game server with default configuration.
///
/// This is a convenience function for quickly setting up a server
/// with sensible defaults for development and testing: it binds
/// `127.0.0.1:8080` and runs the `echo` worker on `/echo` and the `chat`
/// worker on `/chat`.
///
/// # Returns
///
/// A new `GameServer` instance configured with default settings.
///
/// # Example
///
/// ```rust
/// # #[tokio::main]
/// # async fn main() {
/// use game_server::create_server;
///
/// let server = create_server();
/// # }
/// ```
pub fn create_server() -> GameServer {
    GameServer::new(ServerConfig::default())
}

/// Creates a new game server with custom configuration.
///
/// This function allows full customization of server behavior
/// through the provided configuration object.
///
/// # Arguments
///
/// * `config` - A `ServerConfig` instance with desired settings
///
/// # Returns
///
/// A new `GameServer` instance configured with the provided settings.
///
/// # Example
///
/// ```rust
/// # #[tokio::main]
/// # async fn main() {
/// use game_server::{create_server_with_config, ServerConfig};
/// use game_server::config::WorkerSpec;
///
/// let config = ServerConfig {
///     bind_address: "0.0.0.0:9000".parse().unwrap(),
///     max_connections: 5000,
///     workers: vec![WorkerSpec::new("chat", "/lobby")],
///     ..Default::default()
/// };
///
/// let server = create_server_with_config(config);
/// # }
/// ```
pub fn create_server_with_config(config: ServerConfig) -> GameServer {
    GameServer::new(config)
}