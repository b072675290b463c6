//! # Game Server - Message Routing Core
//!
//! The networking and routing core of a script-driven multiplayer server.
//! It accepts WebSocket sessions, gives every session a logical client id and
//! moves messages between the network and script workers that hold all of
//! the game logic.
//!
//! ## Design Philosophy
//!
//! The server core contains **NO game logic**. It provides infrastructure only:
//!
//! * **WebSocket transport** - one task per connection, publishing session lifecycle events
//! * **Gateway** - the single place where sessions become client ids and back
//! * **Runtime host** - binds script workers to addresses and routes client events to them
//! * **Event buses** - ordered, non-blocking fan-out between the components
//!
//! ## Architecture Overview
//!
//! ```text
//!   sessions ──► transport bus ──► GatewayHandler ──► runtime bus ──► RuntimeHost
//!      ▲                              │    ▲                              │
//!      └────────── send_async ────────┘    └──────────── Send ────────────┘
//! ```
//!
//! Every handler runs its callbacks one at a time on its own worker, so the
//! [`ClientRegistry`](connection::ClientRegistry) and the worker table need no
//! locking beyond what read-only observers require.
//!
//! ### Message Flow
//!
//! 1. A client connects on a path such as `/chat`; the transport publishes `SessionOpened`
//! 2. The gateway registers the session and publishes `ClientCreated`
//! 3. Each text frame becomes `MessageReceived`, decoded by the gateway's codec
//! 4. The worker bound to the address answers with `Send` commands
//! 5. The gateway encodes each `Send` and queues it on the client's session
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use game_server::{create_server_with_config, ServerConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), game_server::ServerError> {
//! let server = create_server_with_config(ServerConfig::default());
//! server.start().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! The server uses structured error types ([`ServerError`]) to categorize failures:
//!
//! * **Network errors** - binding and handshake failures
//! * **Bus errors** - a saturated subscriber queue, which stops the server
//! * **Internal errors** - handler failures
//!
//! Undecodable messages, sends to departed clients and duplicate disconnect
//! notifications are dropped, never reported as errors.

// Re-export core types and functions for easy access
pub use config::{ServerConfig, WorkerSpec};
pub use error::{CodecError, RegistryError, ServerError, WorkerError};
pub use events::{RuntimeEvent, RuntimeEventKind, TransportEvent, TransportEventKind};
pub use server::{GameServer, GatewayHandler, ServerStats};
pub use types::{Address, ClientId, SessionId};
pub use utils::{create_server, create_server_with_config};

// Public module declarations
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod messaging;
pub mod runtime;
pub mod server;
pub mod types;
pub mod utils;

#[cfg(test)]
mod tests;
