//! Dispatcher
//!
//! Attaches delivery headers to a serialized event and publishes it. When
//! the broker needs explicit transactions every message gets its own
//! BEGIN/SEND/COMMIT; a failed send rolls the transaction back.
//! Failures are returned to the caller and never retried.

use bridge_core::{BrokerConnection, BrokerError, MessageHeaders};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// How long the broker may hold an unconsumed message
pub const CONSUME_WINDOW_MINUTES: i64 = 5;

/// Content type of every published body
pub const CONTENT_TYPE: &str = "application/json; charset=utf8";

/// Priority of every published message
pub const PRIORITY: u8 = 10;

/// A message the broker accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Transaction the message was committed in, if any
    pub transaction: Option<String>,
    /// Body length
    pub bytes: usize,
    /// Expiry sent with the message, Unix milliseconds
    pub expires_at_ms: i64,
}

/// A message could not be published
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("send failed: {0}")]
    Send(#[source] BrokerError),

    #[error("commit failed: {0}")]
    Commit(#[source] BrokerError),
}

/// Expiry for a message sent at `sent_at`, in Unix milliseconds
pub fn expiry_ms(sent_at: DateTime<Utc>) -> i64 {
    (sent_at + chrono::Duration::minutes(CONSUME_WINDOW_MINUTES)).timestamp_millis()
}

/// Delivery headers for one message
pub fn message_headers(destination: &str, body_len: usize, sent_at: DateTime<Utc>) -> MessageHeaders {
    MessageHeaders {
        destination: destination.to_string(),
        content_type: CONTENT_TYPE.to_string(),
        content_length: body_len,
        persistent: true,
        priority: PRIORITY,
        expires: expiry_ms(sent_at),
    }
}

/// Publishes serialized events to one destination
#[derive(Debug, Clone)]
pub struct Dispatcher {
    destination: String,
}

impl Dispatcher {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Publish `body`, logging exactly one record for the attempt
    pub async fn dispatch(
        &self,
        conn: &dyn BrokerConnection,
        event_type: &str,
        body: &[u8],
    ) -> Result<Ack, DispatchError> {
        let result = self.publish(conn, body).await;

        match &result {
            Ok(ack) => debug!(
                event_type,
                destination = %self.destination,
                bytes = ack.bytes,
                transaction = ack.transaction.as_deref().unwrap_or("-"),
                "dispatched event"
            ),
            Err(e) => error!(
                event_type,
                destination = %self.destination,
                bytes = body.len(),
                error = %e,
                "failed to dispatch event"
            ),
        }
        result
    }

    async fn publish(&self, conn: &dyn BrokerConnection, body: &[u8]) -> Result<Ack, DispatchError> {
        let headers = message_headers(&self.destination, body.len(), Utc::now());
        let expires_at_ms = headers.expires;

        if !conn.requires_transactions() {
            conn.send(&headers, None, body)
                .await
                .map_err(DispatchError::Send)?;
            return Ok(Ack {
                transaction: None,
                bytes: body.len(),
                expires_at_ms,
            });
        }

        let transaction = format!("tx-{}", Uuid::new_v4());
        conn.begin(&transaction).await.map_err(DispatchError::Send)?;

        if let Err(e) = conn.send(&headers, Some(&transaction), body).await {
            if !e.is_fatal() {
                if let Err(abort_err) = conn.abort(&transaction).await {
                    warn!(transaction = %transaction, error = %abort_err, "failed to abort transaction");
                }
            }
            return Err(DispatchError::Send(e));
        }

        conn.commit(&transaction)
            .await
            .map_err(DispatchError::Commit)?;

        Ok(Ack {
            transaction: Some(transaction),
            bytes: body.len(),
            expires_at_ms,
        })
    }
}
