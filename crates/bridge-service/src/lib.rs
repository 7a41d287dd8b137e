//! # bridge-service
//!
//! Application layer: turns gateway notifications into broker messages.
//!
//! Notifications flow through the [`router::Router`] (filter and extract),
//! the [`serializer`] (envelope) and the [`dispatcher::Dispatcher`]
//! (headers, transactional send). [`bridge::Bridge`] owns both connections
//! and coordinates shutdown.

pub mod app;
pub mod bridge;
pub mod cli;
pub mod dispatcher;
pub mod router;
pub mod serializer;
pub mod shutdown;

#[cfg(test)]
mod test_support;

pub use bridge::{Bridge, BridgeError, BridgeState};
pub use dispatcher::{Ack, DispatchError, Dispatcher};
pub use router::{RouteOutcome, Router};
pub use serializer::{serialize, EventEnvelope, SerializeError};
pub use shutdown::{ShutdownOutcome, SHUTDOWN_TIMEOUT};
