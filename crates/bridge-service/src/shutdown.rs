//! Shutdown signals and the shutdown watchdog

use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Time allowed for graceful shutdown before the process is forced out
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// How shutdown ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Both connections closed within the timeout
    Clean,
    /// The watchdog fired first
    TimedOut,
    /// A second interrupt arrived during shutdown
    Forced,
}

impl ShutdownOutcome {
    pub fn is_clean(self) -> bool {
        matches!(self, Self::Clean)
    }

    /// Process exit status for this outcome
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::TimedOut | Self::Forced => 1,
        }
    }
}

/// Which signal started shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

/// Wait for Ctrl+C or SIGTERM
///
/// If a handler cannot be installed the error is logged and that signal is
/// never reported, so the other one still works.
pub async fn wait_for_signal() -> Signal {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
            Signal::Interrupt
        }
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
            Signal::Terminate
        }
    }
}

/// Run `shutdown`, giving up early if `interrupt` resolves first
pub async fn shutdown_or_force<S, I>(shutdown: S, interrupt: I) -> ShutdownOutcome
where
    S: Future<Output = ShutdownOutcome>,
    I: Future<Output = ()>,
{
    tokio::select! {
        outcome = shutdown => outcome,
        () = interrupt => {
            warn!("Received second interrupt, forcing exit");
            ShutdownOutcome::Forced
        }
    }
}

/// Second Ctrl+C during shutdown
pub async fn second_interrupt() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
