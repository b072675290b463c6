//! Client registry and transport session handles.
//!
//! This module tracks which transport session belongs to which logical
//! client, and defines the handle the core uses to talk back to a session.

pub mod client;
pub mod registry;
pub mod session;

pub use client::ClientEntry;
pub use registry::ClientRegistry;
pub use session::{SessionRef, TransportSession};
