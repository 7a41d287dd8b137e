//! An open STOMP connection.
//!
//! The stream is split once the handshake succeeds. Writes go through a
//! single mutex so each frame reaches the wire in one piece; a background
//! reader resolves receipts and notices when the broker goes away, and a
//! second task keeps the negotiated heart-beat.

use async_trait::async_trait;
use bridge_core::{BrokerConnection, BrokerError, BrokerResult, MessageHeaders};
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf,
};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::frame::{names, read_frame, Command, Frame, Headers};
use crate::uri::ConnectionParameters;

/// Tunables for a connection
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// How long to wait for CONNECTED
    pub handshake_timeout: Duration,
    /// How long to wait for a RECEIPT
    pub receipt_timeout: Duration,
    /// Whether publishers must wrap sends in a transaction
    pub transactional: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            receipt_timeout: Duration::from_secs(10),
            transactional: true,
        }
    }
}

/// What the broker told us in CONNECTED
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    pub version: Option<String>,
    pub session: Option<String>,
    pub server: Option<String>,
    /// Negotiated (outgoing, incoming) heart-beat; zero means disabled
    pub heartbeat: (Duration, Duration),
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type ReceiptTx = oneshot::Sender<BrokerResult<()>>;

struct Shared {
    writer: Mutex<BoxedWriter>,
    pending: SyncMutex<HashMap<String, ReceiptTx>>,
    closed: AtomicBool,
    disconnecting: AtomicBool,
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Mark the connection dead and release every receipt waiter
    fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let waiters: Vec<ReceiptTx> = self.pending.lock().drain().map(|(_, tx)| tx).collect();
        for tx in waiters {
            let _ = tx.send(Err(BrokerError::Closed));
        }
    }

    fn resolve(&self, receipt_id: &str, result: BrokerResult<()>) {
        match self.pending.lock().remove(receipt_id) {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => debug!(receipt_id, "receipt with no waiter"),
        }
    }

    async fn write_bytes(&self, bytes: &[u8]) -> BrokerResult<()> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }

        let mut writer = self.writer.lock().await;
        let result = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            drop(writer);
            self.mark_closed();
            return Err(BrokerError::Io(e));
        }
        Ok(())
    }
}

/// A connected STOMP client
pub struct StompConnection {
    shared: Arc<Shared>,
    info: SessionInfo,
    options: ConnectOptions,
    receipt_seq: AtomicU64,
    disconnected: AtomicBool,
    tasks: SyncMutex<Vec<JoinHandle<()>>>,
}

impl StompConnection {
    /// Run the CONNECT handshake over an already open stream
    pub async fn establish<S>(
        stream: S,
        params: &ConnectionParameters,
        options: ConnectOptions,
    ) -> BrokerResult<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);
        let mut writer: BoxedWriter = Box::new(write_half);

        let connect = Frame::new(Command::Connect, params.connect_headers());
        writer.write_all(&connect.encode()).await?;
        writer.flush().await?;

        let reply = tokio::time::timeout(options.handshake_timeout, read_frame(&mut reader))
            .await
            .map_err(|_| {
                BrokerError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "timed out waiting for CONNECTED",
                ))
            })??;

        let frame = match reply {
            None => return Err(BrokerError::Closed),
            Some(frame) => frame,
        };

        match frame.command {
            Command::Connected => {}
            Command::Error => return Err(error_from_frame(&frame)),
            other => {
                return Err(BrokerError::Protocol(format!(
                    "expected CONNECTED, got {other}"
                )))
            }
        }

        let info = SessionInfo {
            version: frame.header(names::VERSION).map(str::to_string),
            session: frame.header(names::SESSION).map(str::to_string),
            server: frame.header(names::SERVER).map(str::to_string),
            heartbeat: negotiate_heartbeat(params.heartbeat(), frame.header(names::HEART_BEAT)),
        };

        info!(
            version = info.version.as_deref().unwrap_or("1.0"),
            server = info.server.as_deref().unwrap_or("unknown"),
            heartbeat_ms = info.heartbeat.0.as_millis() as u64,
            incoming_heartbeat_ms = info.heartbeat.1.as_millis() as u64,
            "STOMP session established"
        );

        let shared = Arc::new(Shared {
            writer: Mutex::new(writer),
            pending: SyncMutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            disconnecting: AtomicBool::new(false),
        });

        let mut tasks = vec![tokio::spawn(reader_loop(
            reader,
            Arc::clone(&shared),
            read_deadline(info.heartbeat.1),
        ))];
        if !info.heartbeat.0.is_zero() {
            tasks.push(tokio::spawn(heartbeat_loop(
                info.heartbeat.0,
                Arc::clone(&shared),
            )));
        }

        Ok(Self {
            shared,
            info,
            options,
            receipt_seq: AtomicU64::new(0),
            disconnected: AtomicBool::new(false),
            tasks: SyncMutex::new(tasks),
        })
    }

    pub fn session_info(&self) -> &SessionInfo {
        &self.info
    }

    /// Whether the connection can no longer carry frames
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    async fn write_frame(&self, frame: &Frame) -> BrokerResult<()> {
        trace!(command = %frame.command, "sending frame");
        self.shared.write_bytes(&frame.encode()).await
    }

    /// Send a frame carrying a receipt header and wait for the RECEIPT
    async fn write_with_receipt(&self, mut frame: Frame) -> BrokerResult<()> {
        let n = self.receipt_seq.fetch_add(1, Ordering::Relaxed);
        let receipt_id = format!("{}-{n}", frame.command.as_str().to_ascii_lowercase());
        frame.headers.add(names::RECEIPT, receipt_id.as_str());

        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().insert(receipt_id.clone(), tx);
        if self.shared.is_closed() {
            self.shared.pending.lock().remove(&receipt_id);
            return Err(BrokerError::Closed);
        }

        if let Err(e) = self.write_frame(&frame).await {
            self.shared.pending.lock().remove(&receipt_id);
            return Err(e);
        }

        match tokio::time::timeout(self.options.receipt_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BrokerError::Closed),
            Err(_) => {
                self.shared.pending.lock().remove(&receipt_id);
                Err(BrokerError::ReceiptTimeout(receipt_id))
            }
        }
    }

    fn stop_tasks(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

#[async_trait]
impl BrokerConnection for StompConnection {
    fn requires_transactions(&self) -> bool {
        self.options.transactional
    }

    async fn begin(&self, transaction: &str) -> BrokerResult<()> {
        let frame = Frame::new(
            Command::Begin,
            Headers::new().with(names::TRANSACTION, transaction),
        );
        self.write_frame(&frame).await
    }

    async fn send(
        &self,
        headers: &MessageHeaders,
        transaction: Option<&str>,
        body: &[u8],
    ) -> BrokerResult<()> {
        let mut frame_headers = Headers::new()
            .with(names::DESTINATION, headers.destination.as_str())
            .with(names::CONTENT_TYPE, headers.content_type.as_str())
            .with(names::CONTENT_LENGTH, headers.content_length.to_string())
            .with(names::PERSISTENT, headers.persistent.to_string())
            .with(names::PRIORITY, headers.priority.to_string())
            .with(names::EXPIRES, headers.expires.to_string());
        if let Some(tx) = transaction {
            frame_headers.add(names::TRANSACTION, tx);
        }

        let frame = Frame::new(Command::Send, frame_headers).with_body(body);
        self.write_frame(&frame).await
    }

    async fn commit(&self, transaction: &str) -> BrokerResult<()> {
        let frame = Frame::new(
            Command::Commit,
            Headers::new().with(names::TRANSACTION, transaction),
        );
        self.write_with_receipt(frame).await
    }

    async fn abort(&self, transaction: &str) -> BrokerResult<()> {
        let frame = Frame::new(
            Command::Abort,
            Headers::new().with(names::TRANSACTION, transaction),
        );
        self.write_frame(&frame).await
    }

    async fn disconnect(&self) -> BrokerResult<()> {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.shared.disconnecting.store(true, Ordering::SeqCst);

        let result = if self.shared.is_closed() {
            Ok(())
        } else {
            match self
                .write_with_receipt(Frame::new(Command::Disconnect, Headers::new()))
                .await
            {
                Err(BrokerError::Closed) => Ok(()),
                other => other,
            }
        };

        {
            let mut writer = self.shared.writer.lock().await;
            let _ = writer.shutdown().await;
        }
        self.shared.mark_closed();
        self.stop_tasks();

        match &result {
            Ok(()) => info!("STOMP connection closed"),
            Err(e) => warn!(error = %e, "STOMP connection closed without confirmation"),
        }
        result
    }
}

impl Drop for StompConnection {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

impl std::fmt::Debug for StompConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StompConnection")
            .field("info", &self.info)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn error_from_frame(frame: &Frame) -> BrokerError {
    BrokerError::ErrorFrame {
        message: frame
            .header(names::MESSAGE)
            .unwrap_or("unspecified error")
            .to_string(),
        details: frame.body_text(),
    }
}

/// Work out the heart-beat intervals from both sides' offers
///
/// Each direction uses the larger of the two offers, or is disabled when
/// either side offers zero.
pub(crate) fn negotiate_heartbeat(
    client: (Duration, Duration),
    server: Option<&str>,
) -> (Duration, Duration) {
    let parse = |s: &str| s.trim().parse::<u64>().ok().map(Duration::from_millis);
    let (sx, sy) = match server.and_then(|h| h.split_once(',')) {
        Some((sx, sy)) => match (parse(sx), parse(sy)) {
            (Some(sx), Some(sy)) => (sx, sy),
            _ => return (Duration::ZERO, Duration::ZERO),
        },
        None => return (Duration::ZERO, Duration::ZERO),
    };

    let pick = |ours: Duration, theirs: Duration| {
        if ours.is_zero() || theirs.is_zero() {
            Duration::ZERO
        } else {
            ours.max(theirs)
        }
    };
    (pick(client.0, sy), pick(client.1, sx))
}

/// Missed incoming heart-beats tolerated before the broker counts as gone
const HEARTBEAT_TOLERANCE: u32 = 2;

/// Longest silence allowed from the broker, if incoming heart-beats are on
pub(crate) fn read_deadline(incoming: Duration) -> Option<Duration> {
    (!incoming.is_zero()).then(|| incoming * HEARTBEAT_TOLERANCE)
}

enum Inbound {
    Frame,
    HeartBeat,
    Silent,
}

/// Wait up to `limit` for any byte from the broker
///
/// Leading EOLs are heart-beats and are consumed here so that each one
/// restarts the deadline.
async fn next_inbound<R>(reader: &mut R, limit: Duration) -> std::io::Result<Inbound>
where
    R: AsyncBufRead + Unpin,
{
    let eol = match tokio::time::timeout(limit, reader.fill_buf()).await {
        Err(_) => return Ok(Inbound::Silent),
        Ok(buf) => buf?
            .iter()
            .take_while(|&&b| matches!(b, b'\n' | b'\r'))
            .count(),
    };
    if eol == 0 {
        return Ok(Inbound::Frame);
    }
    reader.consume(eol);
    Ok(Inbound::HeartBeat)
}

async fn reader_loop<S>(
    mut reader: BufReader<ReadHalf<S>>,
    shared: Arc<Shared>,
    idle_timeout: Option<Duration>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    loop {
        if let Some(limit) = idle_timeout {
            match next_inbound(&mut reader, limit).await {
                Ok(Inbound::Frame) => {}
                Ok(Inbound::HeartBeat) => continue,
                Ok(Inbound::Silent) => {
                    warn!(
                        timeout_ms = limit.as_millis() as u64,
                        "no heart-beat from broker, closing connection"
                    );
                    shared.mark_closed();
                    break;
                }
                Err(e) => {
                    if !shared.disconnecting.load(Ordering::SeqCst) {
                        warn!(error = %e, "failed to read from broker");
                    }
                    shared.mark_closed();
                    break;
                }
            }
        }

        match read_frame(&mut reader).await {
            Ok(Some(frame)) => match frame.command {
                Command::Receipt => {
                    if let Some(id) = frame.header(names::RECEIPT_ID) {
                        shared.resolve(id, Ok(()));
                    }
                }
                Command::Error => {
                    let err = error_from_frame(&frame);
                    warn!(error = %err, "broker sent ERROR frame");
                    if let Some(id) = frame.header(names::RECEIPT_ID) {
                        shared.resolve(id, Err(err));
                    }
                    // The broker closes the connection after an ERROR
                    shared.mark_closed();
                    break;
                }
                other => debug!(command = %other, "ignoring unexpected frame"),
            },
            Ok(None) => {
                if !shared.disconnecting.load(Ordering::SeqCst) {
                    warn!("broker closed the connection");
                }
                shared.mark_closed();
                break;
            }
            Err(e) => {
                if !shared.disconnecting.load(Ordering::SeqCst) {
                    warn!(error = %e, "failed to read from broker");
                }
                shared.mark_closed();
                break;
            }
        }
    }
}

async fn heartbeat_loop(interval: Duration, shared: Arc<Shared>) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if shared.is_closed() {
            break;
        }
        if let Err(e) = shared.write_bytes(b"\n").await {
            warn!(error = %e, "failed to send heart-beat");
            break;
        }
    }
}
