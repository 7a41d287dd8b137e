//! Fake gateway session and notification builders

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bridge_core::{
    GatewayError, GatewayNotification, GatewayResult, GatewaySession, NotificationStream,
    ShardInfo,
};
use futures::channel::mpsc;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;

/// Gateway session whose events are pushed by the test
pub struct ScriptedSession {
    shard: ShardInfo,
    events: Mutex<Option<mpsc::UnboundedReceiver<GatewayNotification>>>,
    closed: AtomicBool,
}

/// Handle used to push notifications into a [`ScriptedSession`]
#[derive(Clone)]
pub struct SessionFeed {
    tx: mpsc::UnboundedSender<GatewayNotification>,
    sequence: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

impl ScriptedSession {
    pub fn new(shard: ShardInfo) -> (Self, SessionFeed) {
        let (tx, rx) = mpsc::unbounded();
        (
            Self {
                shard,
                events: Mutex::new(Some(rx)),
                closed: AtomicBool::new(false),
            },
            SessionFeed {
                tx,
                sequence: std::sync::Arc::default(),
            },
        )
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl SessionFeed {
    /// Push a dispatch with a structured payload
    pub fn dispatch(&self, event_type: &str, payload: Value) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self
            .tx
            .unbounded_send(GatewayNotification::dispatch(event_type, seq, payload));
    }

    /// Push a dispatch that only carries raw JSON text
    pub fn dispatch_raw(&self, event_type: &str, raw: &str) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self
            .tx
            .unbounded_send(GatewayNotification::dispatch_raw(event_type, seq, raw));
    }

    /// Push a non-dispatch frame
    pub fn control(&self, op: u8) {
        let _ = self.tx.unbounded_send(GatewayNotification::control(op));
    }

    /// End the event stream
    pub fn end(&self) {
        self.tx.close_channel();
    }
}

#[async_trait]
impl GatewaySession for ScriptedSession {
    fn shard(&self) -> ShardInfo {
        self.shard
    }

    async fn open(&self) -> GatewayResult<NotificationStream> {
        let rx = self.events.lock().take().ok_or(GatewayError::AlreadyOpen)?;
        Ok(rx.boxed())
    }

    async fn close(&self) -> GatewayResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
