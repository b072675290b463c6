//! # Event Bus
//!
//! Typed publish/subscribe buses and serialized handlers used by the omgs game
//! server to move events between the network layer and the script runtime.
//!
//! ## Building Blocks
//!
//! - [`BusEvent`] - a tagged event type with a cheap, copyable discriminant
//! - [`EventBus`] - one bus per domain; producers publish, subscribers receive a
//!   private, ordered sub-stream of the kinds they asked for
//! - [`Handler`] - a named actor that merges any number of bus subscriptions into
//!   one mailbox and runs its callbacks one at a time
//! - [`ShutdownState`] - shared flags used to coordinate graceful shutdown
//!
//! ## Ordering Guarantees
//!
//! Every subscriber of a bus observes matching events in the order in which the
//! `publish` calls completed, regardless of how many producers publish
//! concurrently. A [`Handler`] never runs two of its callbacks at the same time,
//! so handler state can be plain owned data without internal locking.
//!
//! ## Example
//!
//! ```rust,no_run
//! use event_bus::{BusEvent, EventBus, Handler, KindFilter};
//!
//! #[derive(Debug, Clone)]
//! enum Ping {
//!     Hello(u32),
//!     Bye,
//! }
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! enum PingKind {
//!     Hello,
//!     Bye,
//! }
//!
//! impl BusEvent for Ping {
//!     type Kind = PingKind;
//!     fn kind(&self) -> PingKind {
//!         match self {
//!             Ping::Hello(_) => PingKind::Hello,
//!             Ping::Bye => PingKind::Bye,
//!         }
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = EventBus::<Ping>::new("pings", 1024);
//! let handle = Handler::new("counter", 0u32)
//!     .on(&bus, KindFilter::only(PingKind::Hello), |total, event| {
//!         if let Ping::Hello(n) = event {
//!             *total += n;
//!         }
//!         Ok(())
//!     })
//!     .start();
//!
//! bus.publish(Ping::Hello(2))?;
//! bus.publish(Ping::Bye)?;
//! let total = handle.stop().await?;
//! assert_eq!(total, 2);
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod error;
pub mod event;
pub mod handler;
pub mod shutdown;
pub mod stats;

#[cfg(test)]
mod tests;

pub use bus::{EventBus, Subscription};
pub use error::{BusError, HandlerError};
pub use event::{BusEvent, KindFilter};
pub use handler::{Handler, HandlerHandle, DEFAULT_MAILBOX_CAPACITY};
pub use shutdown::ShutdownState;
pub use stats::BusStats;
