//! In-memory fakes shared by the unit tests

use async_trait::async_trait;
use bridge_core::{
    BrokerConnection, BrokerError, BrokerResult, GatewayNotification, GatewayResult,
    GatewaySession, MessageHeaders, NotificationStream, ShardInfo,
};
use futures::channel::mpsc;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Begin(String),
    Send {
        destination: String,
        transaction: Option<String>,
        body: Vec<u8>,
    },
    Commit(String),
    Abort(String),
    Disconnect,
}

/// Broker that records every call
#[derive(Default)]
pub struct RecordingBroker {
    pub calls: Mutex<Vec<Call>>,
    pub headers: Mutex<Vec<MessageHeaders>>,
    pub non_transactional: bool,
    pub fail_sends: AtomicUsize,
    pub fail_commits: AtomicUsize,
    pub disconnect_delay: Option<Duration>,
    pub disconnects: AtomicUsize,
}

impl RecordingBroker {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn sends(&self) -> Vec<Vec<u8>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Send { body, .. } => Some(body.clone()),
                _ => None,
            })
            .collect()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl BrokerConnection for RecordingBroker {
    fn requires_transactions(&self) -> bool {
        !self.non_transactional
    }

    async fn begin(&self, transaction: &str) -> BrokerResult<()> {
        self.calls.lock().push(Call::Begin(transaction.to_string()));
        Ok(())
    }

    async fn send(
        &self,
        headers: &MessageHeaders,
        transaction: Option<&str>,
        body: &[u8],
    ) -> BrokerResult<()> {
        if Self::take_failure(&self.fail_sends) {
            return Err(BrokerError::Protocol("send rejected".to_string()));
        }
        self.headers.lock().push(headers.clone());
        self.calls.lock().push(Call::Send {
            destination: headers.destination.clone(),
            transaction: transaction.map(str::to_string),
            body: body.to_vec(),
        });
        Ok(())
    }

    async fn commit(&self, transaction: &str) -> BrokerResult<()> {
        if Self::take_failure(&self.fail_commits) {
            return Err(BrokerError::ReceiptTimeout("commit-0".to_string()));
        }
        self.calls.lock().push(Call::Commit(transaction.to_string()));
        Ok(())
    }

    async fn abort(&self, transaction: &str) -> BrokerResult<()> {
        self.calls.lock().push(Call::Abort(transaction.to_string()));
        Ok(())
    }

    async fn disconnect(&self) -> BrokerResult<()> {
        if let Some(delay) = self.disconnect_delay {
            tokio::time::sleep(delay).await;
        }
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(Call::Disconnect);
        Ok(())
    }
}

/// Gateway session fed from a channel held by the test
pub struct ChannelSession {
    shard: ShardInfo,
    stream: Mutex<Option<mpsc::UnboundedReceiver<GatewayNotification>>>,
    pub fail_open: bool,
    pub closed: AtomicBool,
    pub close_delay: Option<Duration>,
}

impl ChannelSession {
    pub fn new(shard: ShardInfo) -> (Self, mpsc::UnboundedSender<GatewayNotification>) {
        let (tx, rx) = mpsc::unbounded();
        (
            Self {
                shard,
                stream: Mutex::new(Some(rx)),
                fail_open: false,
                closed: AtomicBool::new(false),
                close_delay: None,
            },
            tx,
        )
    }
}

#[async_trait]
impl GatewaySession for ChannelSession {
    fn shard(&self) -> ShardInfo {
        self.shard
    }

    async fn open(&self) -> GatewayResult<NotificationStream> {
        if self.fail_open {
            return Err(bridge_core::GatewayError::InvalidToken("401".to_string()));
        }
        let rx = self
            .stream
            .lock()
            .take()
            .ok_or(bridge_core::GatewayError::AlreadyOpen)?;
        Ok(rx.boxed())
    }

    async fn close(&self) -> GatewayResult<()> {
        if let Some(delay) = self.close_delay {
            tokio::time::sleep(delay).await;
        }
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
