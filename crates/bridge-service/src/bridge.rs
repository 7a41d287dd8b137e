//! Bridge lifecycle
//!
//! Owns the broker connection and the gateway session. `start` opens the
//! session and pumps every notification through the router on its own
//! task; `shutdown` closes both connections under a watchdog.

use crate::dispatcher::Dispatcher;
use crate::router::Router;
use crate::shutdown::ShutdownOutcome;
use bridge_core::{BrokerConnection, GatewayError, GatewaySession, IgnoreSet};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Lifecycle state of a [`Bridge`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Constructed, gateway not opened yet
    Idle,
    /// Events flow from the gateway to the broker
    Running,
    /// Connections are being (or have been) closed
    ShuttingDown,
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to open gateway session: {0}")]
    Open(#[from] GatewayError),

    #[error("bridge already started")]
    AlreadyStarted,
}

pub struct Bridge {
    broker: Arc<dyn BrokerConnection>,
    session: Arc<dyn GatewaySession>,
    router: Arc<Router>,
    state: Mutex<BridgeState>,
    pump: Mutex<Option<JoinHandle<()>>>,
    stream_ended: Arc<watch::Sender<bool>>,
}

impl Bridge {
    pub fn new(
        broker: Arc<dyn BrokerConnection>,
        session: Arc<dyn GatewaySession>,
        dispatcher: Dispatcher,
        ignore: IgnoreSet,
    ) -> Self {
        let router = Router::new(broker.clone(), dispatcher, ignore, session.shard());
        let (stream_ended, _) = watch::channel(false);

        Self {
            broker,
            session,
            router: Arc::new(router),
            state: Mutex::new(BridgeState::Idle),
            pump: Mutex::new(None),
            stream_ended: Arc::new(stream_ended),
        }
    }

    pub fn state(&self) -> BridgeState {
        *self.state.lock()
    }

    /// Open the gateway session and start forwarding events
    ///
    /// The bridge only enters [`BridgeState::Running`] when the session
    /// opened successfully.
    pub async fn start(&self) -> Result<(), BridgeError> {
        if self.state() != BridgeState::Idle {
            return Err(BridgeError::AlreadyStarted);
        }

        let mut stream = self.session.open().await?;

        {
            let mut state = self.state.lock();
            if *state != BridgeState::Idle {
                return Err(BridgeError::AlreadyStarted);
            }
            *state = BridgeState::Running;
        }

        let router = self.router.clone();
        let stream_ended = self.stream_ended.clone();
        let handle = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                let router = router.clone();
                tokio::spawn(async move {
                    router.handle(notification).await;
                });
            }
            info!("gateway event stream ended");
            stream_ended.send_replace(true);
        });
        *self.pump.lock() = Some(handle);

        info!(shard = %self.router.shard(), "bridge running");
        Ok(())
    }

    /// Resolve once the gateway stops delivering events
    pub async fn stream_ended(&self) {
        let mut rx = self.stream_ended.subscribe();
        let _ = rx.wait_for(|ended| *ended).await;
    }

    /// Close gateway and broker concurrently, bounded by `timeout`
    ///
    /// A close failure on one side is logged and does not stop the other.
    /// Calling this again after the first call is a no-op.
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownOutcome {
        {
            let mut state = self.state.lock();
            if *state == BridgeState::ShuttingDown {
                debug!("shutdown already in progress");
                return ShutdownOutcome::Clean;
            }
            *state = BridgeState::ShuttingDown;
        }
        info!(timeout_secs = timeout.as_secs(), "shutting down bridge");

        let close_both = async {
            let (gateway, broker) = tokio::join!(self.session.close(), self.broker.disconnect());
            if let Err(e) = gateway {
                error!(error = %e, "failed to close gateway session");
            }
            if let Err(e) = broker {
                error!(error = %e, "failed to disconnect from broker");
            }
        };

        match tokio::time::timeout(timeout, close_both).await {
            Ok(()) => {
                info!("bridge stopped");
                ShutdownOutcome::Clean
            }
            Err(_) => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "Shutdown timeout reached, forcing shutdown"
                );
                ShutdownOutcome::TimedOut
            }
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if let Some(handle) = self.pump.lock().take() {
            handle.abort();
        }
    }
}
