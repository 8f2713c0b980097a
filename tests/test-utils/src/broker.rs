//! In-process STOMP broker over WebSocket
//!
//! Accepts any number of client sessions, answers the handshake, records what
//! clients send and lets tests push ticks and order updates or cut every
//! session to force a reconnect.

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use services_common::stomp::{Command, Frame};
use services_common::{
    InstrumentToken, OrderUpdateEvent, Tick, ORDERS_QUEUE, ORDERS_SUBSCRIPTION_ID,
    SUBSCRIBE_DESTINATION, TICKS_QUEUE, TICKS_SUBSCRIPTION_ID, UNSUBSCRIBE_DESTINATION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tracing::{debug, warn};

use crate::recorders::tokens_in;

enum SessionCommand {
    Push(String),
    Drop,
}

#[derive(Default)]
struct BrokerState {
    upgrade_queries: Mutex<Vec<String>>,
    frames: Mutex<Vec<Frame>>,
    sessions: Mutex<Vec<mpsc::UnboundedSender<SessionCommand>>>,
    connections: AtomicUsize,
}

impl BrokerState {
    fn broadcast(&self, text: &str) -> usize {
        let mut sessions = self.sessions.lock();
        sessions.retain(|tx| tx.send(SessionCommand::Push(text.to_string())).is_ok());
        sessions.len()
    }
}

/// Local broker the live connection can be pointed at
pub struct MockStompBroker {
    addr: SocketAddr,
    state: Arc<BrokerState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl std::fmt::Debug for MockStompBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStompBroker")
            .field("addr", &self.addr)
            .field("connections", &self.connection_count())
            .finish_non_exhaustive()
    }
}

impl MockStompBroker {
    /// Bind an ephemeral port and start accepting sessions
    pub async fn spawn() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(BrokerState::default());
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let accept_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _peer)) => {
                            let state = Arc::clone(&accept_state);
                            tokio::spawn(async move {
                                if let Err(err) = handle_session(state, stream).await {
                                    warn!(error = %err, "broker session ended with error");
                                }
                            });
                        }
                        Err(err) => {
                            warn!(error = %err, "broker accept failed");
                            break;
                        }
                    },
                }
            }
        });

        Ok(Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle,
        })
    }

    /// Endpoint to put in `ClientConfig::ws_url`
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws/websocket", self.addr)
    }

    /// Sessions that completed the STOMP handshake
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// `token` query parameter of every upgrade request
    #[must_use]
    pub fn tokens_seen(&self) -> Vec<String> {
        self.state
            .upgrade_queries
            .lock()
            .iter()
            .filter_map(|query| {
                query.split('&').find_map(|pair| {
                    pair.strip_prefix("token=").map(ToString::to_string)
                })
            })
            .collect()
    }

    /// Every frame received from clients, in arrival order
    #[must_use]
    pub fn frames(&self) -> Vec<Frame> {
        self.state.frames.lock().clone()
    }

    /// Destinations of every SUBSCRIBE frame
    #[must_use]
    pub fn queue_subscriptions(&self) -> Vec<String> {
        self.frames_of(Command::Subscribe)
            .iter()
            .filter_map(|f| f.header("destination").map(ToString::to_string))
            .collect()
    }

    /// Token lists published to the subscribe destination
    #[must_use]
    pub fn subscribes(&self) -> Vec<Vec<InstrumentToken>> {
        self.sends_to(SUBSCRIBE_DESTINATION)
    }

    /// Token lists published to the unsubscribe destination
    #[must_use]
    pub fn unsubscribes(&self) -> Vec<Vec<InstrumentToken>> {
        self.sends_to(UNSUBSCRIBE_DESTINATION)
    }

    /// Deliver one tick batch to every live session
    ///
    /// Returns how many sessions it was handed to.
    pub fn push_ticks(&self, ticks: &[Tick]) -> Result<usize> {
        let frame = Frame::new(Command::Message)
            .with_header("subscription", TICKS_SUBSCRIPTION_ID)
            .with_header("destination", TICKS_QUEUE)
            .with_header("content-type", "application/json")
            .with_body(serde_json::to_string(ticks)?);
        Ok(self.state.broadcast(&frame.encode()))
    }

    /// Deliver one order update to every live session
    pub fn push_order(&self, event: &OrderUpdateEvent) -> Result<usize> {
        let frame = Frame::new(Command::Message)
            .with_header("subscription", ORDERS_SUBSCRIPTION_ID)
            .with_header("destination", ORDERS_QUEUE)
            .with_header("content-type", "application/json")
            .with_body(serde_json::to_string(event)?);
        Ok(self.state.broadcast(&frame.encode()))
    }

    /// Close every live session from the server side
    pub fn drop_connections(&self) {
        for tx in self.state.sessions.lock().drain(..) {
            let _ = tx.send(SessionCommand::Drop);
        }
    }

    /// Stop accepting sessions
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.drop_connections();
        self.handle.abort();
    }

    fn frames_of(&self, command: Command) -> Vec<Frame> {
        self.state
            .frames
            .lock()
            .iter()
            .filter(|f| f.command == command)
            .cloned()
            .collect()
    }

    fn sends_to(&self, destination: &str) -> Vec<Vec<InstrumentToken>> {
        self.frames_of(Command::Send)
            .iter()
            .filter(|f| f.header("destination") == Some(destination))
            .map(|f| tokens_in(&f.body))
            .collect()
    }
}

impl Drop for MockStompBroker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn handle_session(state: Arc<BrokerState>, stream: TcpStream) -> Result<()> {
    let query = Arc::new(Mutex::new(String::new()));
    let captured = Arc::clone(&query);
    let ws = accept_hdr_async(stream, move |req: &Request, resp: Response| {
        *captured.lock() = req.uri().query().unwrap_or_default().to_string();
        Ok(resp)
    })
    .await?;
    state.upgrade_queries.lock().push(query.lock().clone());

    let (mut sink, mut source) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(SessionCommand::Push(text)) => sink.send(Message::Text(text)).await?,
                Some(SessionCommand::Drop) | None => {
                    let _ = sink.close().await;
                    break;
                }
            },
            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    for frame in Frame::parse_all(&text)? {
                        let command = frame.command;
                        state.frames.lock().push(frame);
                        match command {
                            Command::Connect | Command::Stomp => {
                                let connected = Frame::new(Command::Connected)
                                    .with_header("version", "1.2")
                                    .with_header("heart-beat", "0,0");
                                sink.send(Message::Text(connected.encode())).await?;
                                state.connections.fetch_add(1, Ordering::SeqCst);
                                state.sessions.lock().push(tx.clone());
                            }
                            Command::Disconnect => {
                                debug!("client disconnected");
                                return Ok(());
                            }
                            _ => {}
                        }
                    }
                }
                Some(Ok(Message::Ping(payload))) => sink.send(Message::Pong(payload)).await?,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err.into()),
            },
        }
    }
    Ok(())
}
