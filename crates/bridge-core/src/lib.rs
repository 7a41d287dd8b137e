//! # bridge-core
//!
//! Domain layer for the gateway-to-broker bridge.
//!
//! This crate has no I/O. It defines the gateway event catalog, the
//! notification shape handed to the router, the message headers every
//! published event carries, and the two ports (`BrokerConnection`,
//! `GatewaySession`) that the infrastructure crates implement.

pub mod error;
pub mod events;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{BrokerError, BrokerResult, GatewayError, GatewayResult};
pub use events::{GatewayEventType, GatewayNotification, IgnoreSet, ShardInfo, DISPATCH_OP};
pub use traits::{BrokerConnection, GatewaySession, MessageHeaders, NotificationStream};
