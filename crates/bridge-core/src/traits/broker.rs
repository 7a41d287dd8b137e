//! Broker connection port

use async_trait::async_trait;

use crate::error::BrokerResult;

/// Delivery headers attached to every published message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeaders {
    /// Destination queue or topic
    pub destination: String,
    /// MIME type of the body
    pub content_type: String,
    /// Body length in bytes
    pub content_length: usize,
    /// Whether the broker must persist the message
    pub persistent: bool,
    /// Message priority
    pub priority: u8,
    /// Absolute expiry as Unix milliseconds
    pub expires: i64,
}

/// An open, ready-to-use broker connection
///
/// Implementations must accept concurrent calls from many tasks. Each call
/// writes its frame atomically; no ordering is guaranteed between calls
/// made by different tasks.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Whether sends must be wrapped in BEGIN/COMMIT to be durable
    fn requires_transactions(&self) -> bool;

    /// Open a transaction
    async fn begin(&self, transaction: &str) -> BrokerResult<()>;

    /// Send a message, optionally inside a transaction
    async fn send(
        &self,
        headers: &MessageHeaders,
        transaction: Option<&str>,
        body: &[u8],
    ) -> BrokerResult<()>;

    /// Commit a transaction and wait until the broker confirms it
    async fn commit(&self, transaction: &str) -> BrokerResult<()>;

    /// Roll back a transaction
    async fn abort(&self, transaction: &str) -> BrokerResult<()>;

    /// Close the connection. Calling it again is a no-op.
    async fn disconnect(&self) -> BrokerResult<()>;
}
