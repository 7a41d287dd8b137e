//! Gateway session client.
//!
//! Connects over websocket, waits for Hello, identifies (or resumes) and
//! then keeps the connection alive until it is closed. Dispatch frames are
//! handed to the consumer through a bounded channel exposed as a stream.
//! Recoverable drops reconnect with bounded exponential backoff.

use async_trait::async_trait;
use bridge_core::{
    GatewayError, GatewayNotification, GatewayResult, GatewaySession, NotificationStream,
    ShardInfo,
};
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::protocol::{
    is_recoverable, CloseCode, GatewayMessage, IdentifyPayload, IdentifyProperties,
    InboundMessage, OpCode, ResumePayload,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Buffered notifications before the session waits on the consumer
const CHANNEL_CAPACITY: usize = 256;

/// Session settings
#[derive(Clone)]
pub struct SessionConfig {
    /// Token as configured; a `Bot ` prefix is dropped for Identify
    pub token: String,
    pub gateway_url: String,
    pub shard: ShardInfo,
    pub intents: u64,
    pub properties: IdentifyProperties,
    pub hello_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl SessionConfig {
    pub fn new(
        token: impl Into<String>,
        gateway_url: impl Into<String>,
        shard: ShardInfo,
        intents: u64,
    ) -> Self {
        Self {
            token: token.into(),
            gateway_url: gateway_url.into(),
            shard,
            intents,
            properties: IdentifyProperties::default(),
            hello_timeout: Duration::from_secs(20),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }

    fn identify_token(&self) -> String {
        self.token
            .strip_prefix("Bot ")
            .unwrap_or(&self.token)
            .to_string()
    }

    fn identify_payload(&self) -> IdentifyPayload {
        IdentifyPayload {
            token: self.identify_token(),
            properties: self.properties.clone(),
            shard: self.shard.as_pair(),
            intents: self.intents,
            large_threshold: None,
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("token", &"***")
            .field("gateway_url", &self.gateway_url)
            .field("shard", &self.shard)
            .field("intents", &self.intents)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
struct ResumeState {
    session_id: String,
    resume_url: Option<String>,
}

/// Why a connection stopped being driven
enum Exit {
    Shutdown,
    ConsumerGone,
    Reconnect { resume: bool },
    Fatal(GatewayError),
}

struct Inner {
    config: SessionConfig,
    sequence: Mutex<Option<u64>>,
    resume: RwLock<Option<ResumeState>>,
}

/// A gateway session for one shard
pub struct DiscordSession {
    inner: Arc<Inner>,
    opened: AtomicBool,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DiscordSession {
    pub fn new(config: SessionConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                config,
                sequence: Mutex::new(None),
                resume: RwLock::new(None),
            }),
            opened: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            shutdown,
            task: Mutex::new(None),
        }
    }

    /// Id of the current gateway session, once READY has been received
    pub fn session_id(&self) -> Option<String> {
        self.inner.resume.read().as_ref().map(|r| r.session_id.clone())
    }

    /// Last sequence number received
    pub fn last_sequence(&self) -> Option<u64> {
        *self.inner.sequence.lock()
    }
}

#[async_trait]
impl GatewaySession for DiscordSession {
    fn shard(&self) -> ShardInfo {
        self.inner.config.shard
    }

    async fn open(&self) -> GatewayResult<NotificationStream> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(GatewayError::Closed {
                code: 1000,
                reason: "session was closed".to_string(),
            });
        }
        if self.opened.swap(true, Ordering::SeqCst) {
            return Err(GatewayError::AlreadyOpen);
        }

        let (ws, interval) = match self.inner.handshake().await {
            Ok(pair) => pair,
            Err(e) => {
                self.opened.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(run(
            Arc::clone(&self.inner),
            ws,
            interval,
            tx,
            self.shutdown.subscribe(),
        ));
        *self.task.lock() = Some(task);

        info!(shard = %self.inner.config.shard, "opened gateway connection");
        Ok(rx.boxed())
    }

    async fn close(&self) -> GatewayResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self.shutdown.send(true);

        let task = self.task.lock().take();
        if let Some(task) = task {
            let abort = task.abort_handle();
            if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
                warn!("gateway task did not stop in time");
                abort.abort();
            }
        }
        Ok(())
    }
}

impl Drop for DiscordSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

impl Inner {
    /// Connect, wait for Hello and send Identify or Resume
    async fn handshake(&self) -> GatewayResult<(WsStream, Duration)> {
        let resume = self.resume.read().clone();
        let url = match resume.as_ref().and_then(|r| r.resume_url.as_deref()) {
            Some(resume_url) => resume_url_with_query(resume_url, &self.config.gateway_url),
            None => self.config.gateway_url.clone(),
        };

        let (mut ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| GatewayError::Connect(e.to_string()))?;

        let hello = tokio::time::timeout(self.config.hello_timeout, wait_for_hello(&mut ws))
            .await
            .map_err(|_| GatewayError::Protocol("timed out waiting for Hello".to_string()))??;
        let interval = Duration::from_millis(hello.heartbeat_interval.max(1));

        let sequence = *self.sequence.lock();
        let message = match (resume, sequence) {
            (Some(state), Some(seq)) => {
                info!(session_id = %state.session_id, seq, "resuming gateway session");
                GatewayMessage::resume(&ResumePayload {
                    token: self.config.identify_token(),
                    session_id: state.session_id,
                    seq,
                })
            }
            _ => {
                debug!(shard = %self.config.shard, intents = self.config.intents, "identifying");
                GatewayMessage::identify(&self.config.identify_payload())
            }
        }
        .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        send_message(&mut ws, &message).await?;
        Ok((ws, interval))
    }

    fn forget_session(&self) {
        *self.resume.write() = None;
        *self.sequence.lock() = None;
    }

    /// Drive one connection until it ends
    async fn drive(
        &self,
        ws: &mut WsStream,
        interval: Duration,
        tx: &mut mpsc::Sender<GatewayNotification>,
        shutdown: &mut watch::Receiver<bool>,
        attempt: &mut u32,
    ) -> Exit {
        let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
        let mut heartbeat = tokio::time::interval_at(Instant::now() + interval.mul_f64(jitter), interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut acked = true;

        loop {
            tokio::select! {
                _ = shutdown.changed() => return Exit::Shutdown,
                _ = heartbeat.tick() => {
                    if !acked {
                        warn!("heartbeat was not acknowledged, reconnecting");
                        return Exit::Reconnect { resume: true };
                    }
                    acked = false;
                    if let Err(e) = self.send_heartbeat(ws).await {
                        warn!(error = %e, "failed to send heartbeat");
                        return Exit::Reconnect { resume: true };
                    }
                }
                frame = ws.next() => match frame {
                    None => {
                        warn!("gateway connection ended");
                        return Exit::Reconnect { resume: true };
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "gateway connection failed");
                        return Exit::Reconnect { resume: true };
                    }
                    Some(Ok(Message::Text(text))) => {
                        if let Some(exit) = self.handle_text(&text, ws, tx, &mut acked, attempt).await {
                            return exit;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => return close_exit(frame),
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    async fn handle_text(
        &self,
        text: &str,
        ws: &mut WsStream,
        tx: &mut mpsc::Sender<GatewayNotification>,
        acked: &mut bool,
        attempt: &mut u32,
    ) -> Option<Exit> {
        let msg = match InboundMessage::from_json(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "failed to decode gateway frame");
                return None;
            }
        };
        if let Some(s) = msg.s {
            *self.sequence.lock() = Some(s);
        }

        match msg.opcode() {
            Some(OpCode::Dispatch) => {
                if let Some(ready) = msg.as_ready() {
                    debug!(session_id = %ready.session_id, "READY");
                    *self.resume.write() = Some(ResumeState {
                        session_id: ready.session_id,
                        resume_url: ready.resume_gateway_url,
                    });
                    *attempt = 0;
                } else if msg.t.as_deref() == Some("RESUMED") {
                    info!("gateway session resumed");
                    *attempt = 0;
                }
                if tx.send(msg.into_notification()).await.is_err() {
                    return Some(Exit::ConsumerGone);
                }
            }
            Some(OpCode::Heartbeat) => {
                if let Err(e) = self.send_heartbeat(ws).await {
                    warn!(error = %e, "failed to answer heartbeat request");
                    return Some(Exit::Reconnect { resume: true });
                }
            }
            Some(OpCode::HeartbeatAck) => *acked = true,
            Some(OpCode::Reconnect) => {
                info!("gateway asked for a reconnect");
                return Some(Exit::Reconnect { resume: true });
            }
            Some(OpCode::InvalidSession) => {
                let resumable = msg.invalid_session_resumable();
                warn!(resumable, "gateway invalidated the session");
                return Some(Exit::Reconnect { resume: resumable });
            }
            _ => debug!(op = msg.op, "ignoring gateway frame"),
        }
        None
    }

    async fn send_heartbeat(&self, ws: &mut WsStream) -> GatewayResult<()> {
        let sequence = *self.sequence.lock();
        send_message(ws, &GatewayMessage::heartbeat(sequence)).await
    }
}

async fn run(
    inner: Arc<Inner>,
    mut ws: WsStream,
    mut interval: Duration,
    mut tx: mpsc::Sender<GatewayNotification>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt = 0u32;
    loop {
        match inner
            .drive(&mut ws, interval, &mut tx, &mut shutdown, &mut attempt)
            .await
        {
            Exit::Shutdown => {
                let _ = ws
                    .close(Some(CloseFrame {
                        code: WsCloseCode::Normal,
                        reason: "".into(),
                    }))
                    .await;
                info!("gateway session closed");
                return;
            }
            Exit::ConsumerGone => {
                let _ = ws.close(None).await;
                debug!("notification consumer went away");
                return;
            }
            Exit::Fatal(err) => {
                error!(error = %err, "gateway session ended");
                return;
            }
            Exit::Reconnect { resume } => {
                if !resume {
                    inner.forget_session();
                }
                let _ = ws.close(None).await;

                loop {
                    let delay = backoff_delay(
                        attempt,
                        inner.config.initial_backoff,
                        inner.config.max_backoff,
                    );
                    attempt = attempt.saturating_add(1);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting to gateway");

                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => return,
                    }

                    match inner.handshake().await {
                        Ok((new_ws, new_interval)) => {
                            ws = new_ws;
                            interval = new_interval;
                            break;
                        }
                        Err(GatewayError::Closed { code, reason }) if !is_recoverable(code) => {
                            error!(code, %reason, "gateway refused the session");
                            return;
                        }
                        Err(e) => warn!(error = %e, "gateway reconnect failed"),
                    }
                }
            }
        }
    }
}

async fn wait_for_hello(ws: &mut WsStream) -> GatewayResult<crate::protocol::HelloPayload> {
    while let Some(frame) = ws.next().await {
        match frame.map_err(|e| GatewayError::Connect(e.to_string()))? {
            Message::Text(text) => {
                if let Some(hello) = InboundMessage::from_json(&text)
                    .ok()
                    .and_then(|m| m.as_hello())
                {
                    return Ok(hello);
                }
            }
            Message::Close(frame) => {
                let (code, reason) = close_parts(frame);
                return Err(GatewayError::Closed { code, reason });
            }
            _ => {}
        }
    }
    Err(GatewayError::Connect(
        "connection closed before Hello".to_string(),
    ))
}

async fn send_message(ws: &mut WsStream, message: &GatewayMessage) -> GatewayResult<()> {
    let text = message
        .to_json()
        .map_err(|e| GatewayError::Protocol(e.to_string()))?;
    ws.send(Message::Text(text))
        .await
        .map_err(|e| GatewayError::Connect(e.to_string()))
}

fn close_parts(frame: Option<CloseFrame<'_>>) -> (u16, String) {
    frame.map_or((1005, String::new()), |f| {
        (u16::from(f.code), f.reason.into_owned())
    })
}

fn close_exit(frame: Option<CloseFrame<'_>>) -> Exit {
    let (code, reason) = close_parts(frame);
    if is_recoverable(code) {
        let resume = CloseCode::from_u16(code).map_or(true, CloseCode::can_resume);
        warn!(code, %reason, resume, "gateway closed the connection");
        Exit::Reconnect { resume }
    } else {
        Exit::Fatal(GatewayError::Closed { code, reason })
    }
}

/// `initial * 2^attempt`, capped at `max`
pub(crate) fn backoff_delay(attempt: u32, initial: Duration, max: Duration) -> Duration {
    initial.saturating_mul(1u32 << attempt.min(16)).min(max)
}

/// Carry the version/encoding query of the configured URL over to a resume URL
pub(crate) fn resume_url_with_query(resume_url: &str, gateway_url: &str) -> String {
    let (Ok(mut resume), Ok(gateway)) = (Url::parse(resume_url), Url::parse(gateway_url)) else {
        return resume_url.to_string();
    };
    if resume.query().is_none() {
        resume.set_query(gateway.query());
    }
    resume.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    type ServerWs = WebSocketStream<TcpStream>;

    async fn listen() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/?v=10&encoding=json", listener.local_addr().unwrap());
        (listener, url)
    }

    async fn accept(listener: &TcpListener) -> ServerWs {
        let (stream, _) = listener.accept().await.unwrap();
        accept_async(stream).await.unwrap()
    }

    async fn send(ws: &mut ServerWs, value: Value) {
        ws.send(Message::Text(value.to_string())).await.unwrap();
    }

    /// Next client payload, skipping heartbeats
    async fn recv(ws: &mut ServerWs) -> Value {
        loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => {
                    let value: Value = serde_json::from_str(&text).unwrap();
                    if value["op"] != 1 {
                        return value;
                    }
                }
                Message::Close(_) => return json!({"closed": true}),
                _ => {}
            }
        }
    }

    fn config(url: &str) -> SessionConfig {
        let mut config = SessionConfig::new("Bot abc", url, ShardInfo::new(1, 2), 513);
        config.hello_timeout = Duration::from_secs(2);
        config.initial_backoff = Duration::from_millis(10);
        config
    }

    fn hello() -> Value {
        json!({"op": 10, "d": {"heartbeat_interval": 60000}})
    }

    #[test]
    fn test_backoff_delay() {
        let initial = Duration::from_secs(1);
        let max = Duration::from_secs(60);
        assert_eq!(backoff_delay(0, initial, max), Duration::from_secs(1));
        assert_eq!(backoff_delay(3, initial, max), Duration::from_secs(8));
        assert_eq!(backoff_delay(10, initial, max), max);
        assert_eq!(backoff_delay(u32::MAX, initial, max), max);
    }

    #[test]
    fn test_resume_url_with_query() {
        assert_eq!(
            resume_url_with_query(
                "wss://gateway-us-east1-b.discord.gg",
                "wss://gateway.discord.gg/?v=10&encoding=json"
            ),
            "wss://gateway-us-east1-b.discord.gg/?v=10&encoding=json"
        );
        assert_eq!(
            resume_url_with_query("wss://r.example/?v=9", "wss://g.example/?v=10"),
            "wss://r.example/?v=9"
        );
    }

    #[test]
    fn test_identify_token_drops_bot_prefix() {
        let config = SessionConfig::new("Bot abc", "ws://x", ShardInfo::single(), 1);
        assert_eq!(config.identify_token(), "abc");
        let config = SessionConfig::new("abc", "ws://x", ShardInfo::single(), 1);
        assert_eq!(config.identify_token(), "abc");
        assert!(!format!("{config:?}").contains("abc"));
    }

    #[tokio::test]
    async fn test_identify_and_forward_dispatches() {
        let (listener, url) = listen().await;
        let server = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            send(&mut ws, hello()).await;
            let identify = recv(&mut ws).await;
            send(&mut ws, json!({"op": 0, "t": "READY", "s": 1, "d": {"session_id": "s-1", "_trace": ["x"]}})).await;
            send(&mut ws, json!({"op": 11})).await;
            send(&mut ws, json!({"op": 0, "t": "MESSAGE_CREATE", "s": 2, "d": {"content": "hi"}})).await;
            send(&mut ws, json!({"op": 0, "t": "BRAND_NEW_EVENT", "s": 3, "d": {"x": 1}})).await;
            let closing = recv(&mut ws).await;
            (identify, closing)
        });

        let session = DiscordSession::new(config(&url));
        let mut stream = session.open().await.unwrap();

        let ready = stream.next().await.unwrap();
        assert_eq!(ready.business_event(), Some("READY"));
        let message = stream.next().await.unwrap();
        assert_eq!(message.business_event(), Some("MESSAGE_CREATE"));
        assert_eq!(message.payload.unwrap()["content"], "hi");
        let unknown = stream.next().await.unwrap();
        assert_eq!(unknown.raw.as_deref(), Some(r#"{"x":1}"#));

        assert_eq!(session.session_id().as_deref(), Some("s-1"));
        assert_eq!(session.last_sequence(), Some(3));

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert!(stream.next().await.is_none());

        let (identify, closing) = server.await.unwrap();
        assert_eq!(identify["op"], 2);
        assert_eq!(identify["d"]["token"], "abc");
        assert_eq!(identify["d"]["shard"], json!([1, 2]));
        assert_eq!(identify["d"]["intents"], 513);
        assert_eq!(closing, json!({"closed": true}));
    }

    #[tokio::test]
    async fn test_open_twice() {
        let (listener, url) = listen().await;
        let _server = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            send(&mut ws, hello()).await;
            let _ = recv(&mut ws).await;
            let _ = recv(&mut ws).await;
        });

        let session = DiscordSession::new(config(&url));
        let _stream = session.open().await.unwrap();
        assert!(matches!(session.open().await, Err(GatewayError::AlreadyOpen)));
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_fails_without_hello() {
        let (listener, url) = listen().await;
        tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            let _ = ws.close(None).await;
        });

        let session = DiscordSession::new(config(&url));
        assert!(session.open().await.is_err());
    }

    #[tokio::test]
    async fn test_authentication_failure_ends_stream() {
        let (listener, url) = listen().await;
        let server = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            send(&mut ws, hello()).await;
            let _ = recv(&mut ws).await;
            let _ = ws
                .close(Some(CloseFrame {
                    code: WsCloseCode::from(4004),
                    reason: "Authentication failed".into(),
                }))
                .await;
            // A reconnect attempt would show up as a second accept
            tokio::time::timeout(Duration::from_millis(300), listener.accept())
                .await
                .is_err()
        });

        let session = DiscordSession::new(config(&url));
        let mut stream = session.open().await.unwrap();
        let next = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .unwrap();
        assert!(next.is_none());
        assert!(server.await.unwrap(), "client reconnected after a fatal close code");
    }

    #[tokio::test]
    async fn test_reconnect_request_resumes_session() {
        let (listener, url) = listen().await;
        let resume_url = url.clone();
        let server = tokio::spawn(async move {
            let mut first = accept(&listener).await;
            send(&mut first, hello()).await;
            let _identify = recv(&mut first).await;
            send(
                &mut first,
                json!({"op": 0, "t": "READY", "s": 1, "d": {"session_id": "s-9", "resume_gateway_url": resume_url}}),
            )
            .await;
            send(&mut first, json!({"op": 0, "t": "MESSAGE_CREATE", "s": 2, "d": {}})).await;
            send(&mut first, json!({"op": 7, "d": null})).await;

            let mut second = accept(&listener).await;
            send(&mut second, hello()).await;
            let resume = recv(&mut second).await;
            send(&mut second, json!({"op": 0, "t": "RESUMED", "s": 3, "d": {}})).await;
            let _ = recv(&mut second).await;
            resume
        });

        let session = DiscordSession::new(config(&url));
        let mut stream = session.open().await.unwrap();

        let names: Vec<String> = (&mut stream)
            .take(3)
            .map(|n| n.event_type.unwrap_or_default())
            .collect()
            .await;
        assert_eq!(names, vec!["READY", "MESSAGE_CREATE", "RESUMED"]);

        session.close().await.unwrap();
        let resume = server.await.unwrap();
        assert_eq!(resume["op"], 6);
        assert_eq!(resume["d"]["session_id"], "s-9");
        assert_eq!(resume["d"]["seq"], 2);
        assert_eq!(resume["d"]["token"], "abc");
    }
}
