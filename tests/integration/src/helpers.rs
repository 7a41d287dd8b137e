//! In-process STOMP broker for integration tests
//!
//! Listens on an ephemeral port, answers CONNECT with CONNECTED, records
//! every client frame and acknowledges any frame that asks for a receipt.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use bridge_broker::frame::{names, read_frame, Command, Frame, Headers};
use parking_lot::Mutex;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Default)]
struct State {
    frames: Mutex<Vec<Frame>>,
    withheld_commit_receipts: AtomicUsize,
    connections: AtomicUsize,
}

/// Fake broker instance that manages its own accept loop
pub struct FakeBroker {
    pub addr: SocketAddr,
    state: Arc<State>,
    _handle: JoinHandle<()>,
}

impl FakeBroker {
    /// Bind to `127.0.0.1:0` and start accepting connections
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(State::default());

        let accept_state = state.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_state.connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(stream, accept_state.clone()));
            }
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    /// URI pointing at this broker
    pub fn uri(&self, userinfo: &str, vhost: &str) -> String {
        format!("stomp://{userinfo}{}/{vhost}", self.addr)
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Every frame received so far
    pub fn frames(&self) -> Vec<Frame> {
        self.state.frames.lock().clone()
    }

    pub fn frames_of(&self, command: Command) -> Vec<Frame> {
        self.state
            .frames
            .lock()
            .iter()
            .filter(|f| f.command == command)
            .cloned()
            .collect()
    }

    /// Do not answer the next `n` COMMIT receipts
    pub fn withhold_commit_receipts(&self, n: usize) {
        self.state.withheld_commit_receipts.store(n, Ordering::SeqCst);
    }

    /// Wait until at least `count` frames of `command` arrived
    pub async fn wait_for(&self, command: Command, count: usize) -> Result<Vec<Frame>> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let frames = self.frames_of(command);
            if frames.len() >= count {
                return Ok(frames);
            }
            if tokio::time::Instant::now() >= deadline {
                bail!("expected {count} {command:?} frames, got {}", frames.len());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

async fn serve(stream: TcpStream, state: Arc<State>) {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    while let Ok(Some(frame)) = read_frame(&mut reader).await {
        state.frames.lock().push(frame.clone());

        let reply = match frame.command {
            Command::Connect | Command::Stomp => Some(Frame::new(
                Command::Connected,
                Headers::new()
                    .with(names::VERSION, "1.2")
                    .with(names::HEART_BEAT, "0,0")
                    .with(names::SESSION, "session-1")
                    .with(names::SERVER, "fake-broker/1.0"),
            )),
            _ => match frame.header(names::RECEIPT) {
                Some(_) if frame.command == Command::Commit && take(&state.withheld_commit_receipts) => {
                    None
                }
                Some(id) => Some(Frame::new(
                    Command::Receipt,
                    Headers::new().with(names::RECEIPT_ID, id),
                )),
                None => None,
            },
        };

        if let Some(reply) = reply {
            if write.write_all(&reply.encode()).await.is_err() {
                return;
            }
        }
        if frame.command == Command::Disconnect {
            let _ = write.shutdown().await;
            return;
        }
    }
}

fn take(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}
