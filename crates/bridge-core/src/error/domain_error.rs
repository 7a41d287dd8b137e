//! Domain errors - failures reported through the connection ports

use thiserror::Error;

/// Errors raised by an open broker connection
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Network I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The broker sent something that does not follow the protocol
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The broker answered with an ERROR frame
    #[error("Broker error: {message}")]
    ErrorFrame { message: String, details: String },

    /// No receipt arrived for a frame that requested one
    #[error("Timed out waiting for receipt {0}")]
    ReceiptTimeout(String),

    /// The connection is no longer usable
    #[error("Connection closed")]
    Closed,
}

impl BrokerError {
    /// Check if the connection must be considered unusable after this error
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Closed)
    }
}

/// Result type for broker operations
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Errors raised by a gateway session
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The token was rejected
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// A REST request failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// The websocket could not be established
    #[error("Connection error: {0}")]
    Connect(String),

    /// The gateway closed the connection
    #[error("Gateway closed the connection ({code}): {reason}")]
    Closed { code: u16, reason: String },

    /// Unexpected frame or payload
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// `open` was called on a session that is already open
    #[error("Session already open")]
    AlreadyOpen,
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
