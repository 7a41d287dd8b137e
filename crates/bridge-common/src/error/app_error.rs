//! Application error types
//!
//! Errors that abort startup. Per-event failures never reach this type; they
//! are logged where they happen and the bridge keeps running.

use crate::config::ConfigError;

/// Boxed cause carried by the broker and gateway variants
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Startup-fatal error
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // Broker errors
    #[error("Broker error: {0}")]
    Broker(#[source] BoxError),

    // Gateway errors
    #[error("Gateway error: {0}")]
    Gateway(#[source] BoxError),

    #[error("Gateway session ended")]
    GatewayEnded,
}

impl AppError {
    /// Wrap a broker-side failure, keeping it as the source
    pub fn broker<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Broker(Box::new(err))
    }

    /// Wrap a gateway-side failure, keeping it as the source
    pub fn gateway<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Gateway(Box::new(err))
    }

    /// Get a stable error code for the terminal diagnostic
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Broker(_) => "BROKER_ERROR",
            Self::Gateway(_) | Self::GatewayEnded => "GATEWAY_ERROR",
        }
    }

    /// Process exit status for this error
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Broker(_) | Self::Gateway(_) | Self::GatewayEnded => 1,
        }
    }
}

/// Result type alias using `AppError`
pub type AppResult<T> = Result<T, AppError>;
