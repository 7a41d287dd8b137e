//! # bridge-broker
//!
//! STOMP client used to publish gateway events.
//!
//! [`connect`] validates a `stomp://` URI, opens a TCP stream and performs
//! the CONNECT handshake. The resulting [`StompConnection`] implements
//! [`bridge_core::BrokerConnection`] and is safe to share between tasks.

pub mod connection;
pub mod connector;
pub mod error;
pub mod frame;
pub mod uri;

pub use connection::{ConnectOptions, SessionInfo, StompConnection};
pub use connector::{connect, connect_with_options};
pub use error::ConnectionError;
pub use uri::{ConnectionParameters, ConnectionUri, DEFAULT_PORT};
