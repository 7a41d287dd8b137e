//! Gateway events
//!
//! Event catalog, the notification shape produced by a gateway session, and
//! the ignore filter applied before any serialization work.

mod event_types;
mod ignore;
mod notification;

pub use event_types::GatewayEventType;
pub use ignore::IgnoreSet;
pub use notification::{GatewayNotification, ShardInfo, DISPATCH_OP};
