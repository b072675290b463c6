//! Core server implementation and connection handling.
//!
//! This module contains the main game server structure, the gateway handler
//! and the logic for handling client connections.

pub mod core;
pub mod gateway;
pub mod handlers;

pub use core::{GameServer, ServerStats};
pub use gateway::GatewayHandler;
pub use handlers::WebSocketSession;
