//! Connection ports
//!
//! The bridge only talks to the broker and the gateway through these traits,
//! so the infrastructure crates can be swapped for fakes in tests.

mod broker;
mod gateway;

pub use broker::{BrokerConnection, MessageHeaders};
pub use gateway::{GatewaySession, NotificationStream};
