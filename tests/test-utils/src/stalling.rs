//! Broker endpoint that stops answering at a chosen point of the handshake

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use services_common::stomp::{Command, Frame};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// Where the broker goes quiet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stall {
    /// TCP accepted, WebSocket upgrade never answered
    BeforeUpgrade,
    /// Upgrade done, CONNECT read, CONNECTED never sent
    BeforeConnected,
    /// CONNECTED sent promising `heart_beat_ms` both ways, then silence
    AfterConnected { heart_beat_ms: u64 },
}

#[derive(Default)]
struct Counters {
    accepted: AtomicUsize,
    connects: AtomicUsize,
}

/// Broker that holds sockets open without ever completing a session
pub struct StallingBroker {
    addr: SocketAddr,
    counters: Arc<Counters>,
    handle: JoinHandle<()>,
}

impl std::fmt::Debug for StallingBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StallingBroker")
            .field("addr", &self.addr)
            .field("accepted", &self.accepted())
            .field("connects", &self.connects())
            .finish_non_exhaustive()
    }
}

impl StallingBroker {
    /// Bind an ephemeral port and stall every session at `stall`
    pub async fn spawn(stall: Stall) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        let counters = Arc::new(Counters::default());

        let accept_counters = Arc::clone(&counters);
        let handle = tokio::spawn(async move {
            let mut sessions = JoinSet::new();
            while let Ok((stream, _peer)) = listener.accept().await {
                accept_counters.accepted.fetch_add(1, Ordering::SeqCst);
                let counters = Arc::clone(&accept_counters);
                sessions.spawn(async move {
                    if let Err(err) = stall_session(stall, stream, counters).await {
                        debug!(error = %err, "stalled session ended");
                    }
                });
            }
        });

        Ok(Self {
            addr,
            counters,
            handle,
        })
    }

    /// Endpoint to put in `ClientConfig::ws_url`
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws/websocket", self.addr)
    }

    /// TCP connections accepted so far
    #[must_use]
    pub fn accepted(&self) -> usize {
        self.counters.accepted.load(Ordering::SeqCst)
    }

    /// CONNECT frames received so far
    #[must_use]
    pub fn connects(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }
}

impl Drop for StallingBroker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn stall_session(stall: Stall, stream: TcpStream, counters: Arc<Counters>) -> Result<()> {
    if stall == Stall::BeforeUpgrade {
        let _held = stream;
        std::future::pending::<()>().await;
        return Ok(());
    }

    let mut ws = accept_async(stream).await?;
    while let Some(message) = ws.next().await {
        let Message::Text(text) = message? else {
            continue;
        };
        for frame in Frame::parse_all(&text)? {
            if !matches!(frame.command, Command::Connect | Command::Stomp) {
                continue;
            }
            counters.connects.fetch_add(1, Ordering::SeqCst);
            if let Stall::AfterConnected { heart_beat_ms } = stall {
                let connected = Frame::new(Command::Connected)
                    .with_header("version", "1.2")
                    .with_header("heart-beat", format!("{heart_beat_ms},{heart_beat_ms}"));
                ws.send(Message::Text(connected.encode())).await?;
            }
        }
    }
    Ok(())
}
