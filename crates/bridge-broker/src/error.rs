//! Connection setup errors

use bridge_core::BrokerError;
use thiserror::Error;

/// Errors raised while validating a URI or establishing a connection
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Broker URI is required")]
    MissingUri,

    #[error("Failed to parse broker URI: {0}")]
    UriParse(String),

    #[error("Invalid broker URI scheme '{0}', expected 'stomp'")]
    InvalidScheme(String),

    #[error("Broker URI has a username but no password")]
    CredentialsIncomplete,

    #[error("Failed to connect to broker: {0}")]
    Connect(#[source] BrokerError),
}

impl ConnectionError {
    /// Whether the error was detected before any network I/O
    #[must_use]
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Connect(_))
    }
}

impl From<BrokerError> for ConnectionError {
    fn from(err: BrokerError) -> Self {
        Self::Connect(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors() {
        assert!(ConnectionError::MissingUri.is_validation());
        assert!(ConnectionError::InvalidScheme("amqp".to_string()).is_validation());
        assert!(!ConnectionError::Connect(BrokerError::Closed).is_validation());
    }

    #[test]
    fn test_display() {
        let err = ConnectionError::InvalidScheme("amqp".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid broker URI scheme 'amqp', expected 'stomp'"
        );
    }
}
