//! # bridge-gateway
//!
//! Client side of the upstream gateway.
//!
//! [`DiscordSession`] implements [`bridge_core::GatewaySession`] over a
//! websocket: Hello, Identify or Resume, heartbeats, and reconnects.
//! [`RestClient`] checks the token before the session is opened.

pub mod protocol;
pub mod rest;
pub mod session;

pub use rest::{CurrentUser, RestClient};
pub use session::{DiscordSession, SessionConfig};
