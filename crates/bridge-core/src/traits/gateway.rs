//! Gateway session port

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::GatewayResult;
use crate::events::{GatewayNotification, ShardInfo};

/// Stream of notifications yielded by an open session
pub type NotificationStream = BoxStream<'static, GatewayNotification>;

/// A long-lived gateway session
#[async_trait]
pub trait GatewaySession: Send + Sync {
    /// Shard identity of this session
    fn shard(&self) -> ShardInfo;

    /// Open the session and subscribe to its notifications
    ///
    /// The stream ends when the session is closed or fails permanently.
    async fn open(&self) -> GatewayResult<NotificationStream>;

    /// Close the session. Calling it again is a no-op.
    async fn close(&self) -> GatewayResult<()>;
}
