//! STOMP-over-WebSocket session with fixed-delay reconnect

use super::routing::FrameRouter;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use services_common::stomp::{Command, Frame, HeartBeat};
use services_common::{
    ClientConfig, ConnectionState, FanOutBus, OrderUpdateEvent, ServiceError, ServiceResult,
    TickBatch, TokenProvider, WireSink, ORDERS_QUEUE, ORDERS_SUBSCRIPTION_ID, TICKS_QUEUE,
    TICKS_SUBSCRIPTION_ID,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = futures_util::stream::SplitSink<WsStream, Message>;
type WsRead = futures_util::stream::SplitStream<WsStream>;
type Handshake = (WsWrite, WsRead, HeartBeat, Vec<Frame>);

/// Heart-beat sent to the broker: a bare end-of-line
const HEART_BEAT: &str = "\n";

/// Period for timers whose branch is disabled
const IDLE_PLACEHOLDER: Duration = Duration::from_secs(3600);

/// How a session ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Server closed the socket
    Closed,
    /// `close()` was called
    Shutdown,
}

/// Live connection to the broker
///
/// Owns a background task that keeps one STOMP session open, reconnecting
/// after a fixed delay whenever it drops. Outbound frames are queued and sent
/// by that task.
pub struct TransportConnection {
    state: Arc<watch::Sender<ConnectionState>>,
    outbound: mpsc::UnboundedSender<Frame>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for TransportConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConnection")
            .field("state", &*self.state.borrow())
            .field("shutdown", &*self.shutdown.borrow())
            .finish()
    }
}

impl TransportConnection {
    /// Start the session loop
    ///
    /// Fails with `MissingToken` when no bearer token is available and with
    /// `InvalidConfig` when the broker URL does not parse. Must be called
    /// within a tokio runtime.
    pub fn connect(
        config: &ClientConfig,
        tokens: Arc<dyn TokenProvider>,
        ticks: FanOutBus<TickBatch>,
        orders: FanOutBus<OrderUpdateEvent>,
    ) -> ServiceResult<Self> {
        if tokens.token().is_none() {
            error!("Cannot establish live connection: token is missing");
            return Err(ServiceError::MissingToken);
        }
        let endpoint = Url::parse(&config.ws_url).map_err(|e| {
            ServiceError::InvalidConfig(format!("invalid broker URL '{}': {e}", config.ws_url))
        })?;

        let state = Arc::new(watch::Sender::new(ConnectionState::Disconnected));
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let session = SessionLoop {
            endpoint,
            tokens,
            router: FrameRouter::new(ticks, orders),
            state: Arc::clone(&state),
            reconnect_delay: config.reconnect_delay(),
            handshake_timeout: config.handshake_timeout(),
            heart_beat: config.heart_beat(),
        };
        let task = tokio::spawn(session.run(outbound_rx, shutdown_rx));

        Ok(Self {
            state,
            outbound,
            shutdown,
            task: Mutex::new(Some(task)),
        })
    }

    /// Hot stream of connection states, replaying the latest
    #[must_use]
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Current connection state
    #[must_use]
    pub fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Send DISCONNECT, close the socket and stop reconnecting
    pub async fn close(&self) {
        self.shutdown.send_replace(true);
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Live connection task ended abnormally");
            }
        }
        self.state.send_replace(ConnectionState::Disconnected);
        info!("Live connection closed");
    }
}

impl WireSink for TransportConnection {
    fn is_connected(&self) -> bool {
        self.current_state().is_connected()
    }

    fn publish(&self, destination: &str, body: String) -> ServiceResult<()> {
        if !self.is_connected() {
            return Err(ServiceError::NotConnected(destination.to_string()));
        }
        self.outbound
            .send(Frame::send(destination, body))
            .map_err(|_| ServiceError::NotConnected("live connection task stopped".to_string()))
    }
}

impl Drop for TransportConnection {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

struct SessionLoop {
    endpoint: Url,
    tokens: Arc<dyn TokenProvider>,
    router: FrameRouter,
    state: Arc<watch::Sender<ConnectionState>>,
    reconnect_delay: Duration,
    handshake_timeout: Duration,
    heart_beat: Duration,
}

impl SessionLoop {
    async fn run(
        self,
        mut outbound: mpsc::UnboundedReceiver<Frame>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut attempt: u64 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }
            let Some(token) = self.tokens.token() else {
                warn!("Token no longer available, live connection stopped");
                break;
            };
            attempt += 1;

            let mut stale = 0usize;
            while outbound.try_recv().is_ok() {
                stale += 1;
            }
            if stale > 0 {
                debug!(stale, "Discarded frames queued while disconnected");
            }

            self.set_state(ConnectionState::Connecting);
            match self.session(&token, &mut outbound, &mut shutdown).await {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::Closed) => info!(attempt, "Live connection closed by server"),
                Err(e) => warn!(attempt, error = %e, "Live connection failed"),
            }
            self.set_state(ConnectionState::Disconnected);

            let stop = tokio::select! {
                () = tokio::time::sleep(self.reconnect_delay) => false,
                changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
            };
            if stop {
                break;
            }
            info!(
                delay_ms = self.reconnect_delay.as_millis() as u64,
                "Reconnecting live connection"
            );
        }

        self.set_state(ConnectionState::Disconnected);
        debug!("Live connection loop finished");
    }

    async fn session(
        &self,
        token: &str,
        outbound: &mut mpsc::UnboundedReceiver<Frame>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ServiceResult<SessionEnd> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("token", token);

        info!(endpoint = %self.endpoint, "Opening live connection");
        let handshake = tokio::time::timeout(self.handshake_timeout, self.handshake(&url));
        let (mut write, mut read, beats, pending) = tokio::select! {
            result = handshake => result.map_err(|_| {
                ServiceError::ConnectionFailed(format!(
                    "no STOMP session within {} ms",
                    self.handshake_timeout.as_millis()
                ))
            })??,
            () = shutdown_requested(shutdown) => return Ok(SessionEnd::Shutdown),
        };

        send_frame(&mut write, &Frame::subscribe(TICKS_SUBSCRIPTION_ID, TICKS_QUEUE)).await?;
        send_frame(&mut write, &Frame::subscribe(ORDERS_SUBSCRIPTION_ID, ORDERS_QUEUE)).await?;
        self.set_state(ConnectionState::Connected);
        info!(
            outgoing_ms = beats.outgoing.map(|d| d.as_millis() as u64),
            incoming_ms = beats.incoming.map(|d| d.as_millis() as u64),
            "Live connection established"
        );

        for frame in &pending {
            self.router.route(frame)?;
        }

        let beat_period = beats.outgoing.unwrap_or(IDLE_PLACEHOLDER);
        let mut beat = tokio::time::interval_at(Instant::now() + beat_period, beat_period);
        beat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let read_limit = beats.incoming.map(|d| d * 2);
        let silence = tokio::time::sleep(read_limit.unwrap_or(IDLE_PLACEHOLDER));
        tokio::pin!(silence);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        let _ = send_frame(&mut write, &Frame::disconnect()).await;
                        let _ = write.close().await;
                        return Ok(SessionEnd::Shutdown);
                    }
                }
                frame = outbound.recv() => match frame {
                    Some(frame) => send_frame(&mut write, &frame).await?,
                    None => return Ok(SessionEnd::Shutdown),
                },
                _ = beat.tick(), if beats.outgoing.is_some() => {
                    write
                        .send(Message::Text(HEART_BEAT.to_string()))
                        .await
                        .map_err(|e| ServiceError::ConnectionFailed(e.to_string()))?;
                }
                () = &mut silence, if read_limit.is_some() => {
                    return Err(ServiceError::ConnectionFailed(format!(
                        "broker silent for {} ms",
                        read_limit.unwrap_or_default().as_millis()
                    )));
                }
                message = read.next() => {
                    if let Some(limit) = read_limit {
                        silence.as_mut().reset(Instant::now() + limit);
                    }
                    match message {
                        Some(Ok(Message::Text(text))) => self.dispatch(&text)?,
                        Some(Ok(Message::Binary(data))) => {
                            let text = String::from_utf8(data).map_err(|e| {
                                ServiceError::Protocol(format!("non UTF-8 frame: {e}"))
                            })?;
                            self.dispatch(&text)?;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write
                                .send(Message::Pong(data))
                                .await
                                .map_err(|e| ServiceError::ConnectionFailed(e.to_string()))?;
                        }
                        Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Closed),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(ServiceError::ConnectionFailed(e.to_string())),
                    }
                }
            }
        }
    }

    /// Upgrade the socket, send CONNECT and wait for CONNECTED
    async fn handshake(&self, url: &Url) -> ServiceResult<Handshake> {
        let (stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| ServiceError::ConnectionFailed(e.to_string()))?;
        debug!(status = %response.status(), "WebSocket upgraded");

        let (mut write, mut read) = stream.split();
        let host = self.endpoint.host_str().unwrap_or("localhost");
        send_frame(&mut write, &Frame::connect(host, self.heart_beat)).await?;

        let (connected, pending) = await_connected(&mut read).await?;
        let beats = HeartBeat::negotiate(self.heart_beat, connected.header("heart-beat"));
        Ok((write, read, beats, pending))
    }

    fn dispatch(&self, text: &str) -> ServiceResult<()> {
        for frame in Frame::parse_all(text)? {
            self.router.route(&frame)?;
        }
        Ok(())
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            debug!(state = %next, "Connection state changed");
        }
    }
}

async fn send_frame(write: &mut WsWrite, frame: &Frame) -> ServiceResult<()> {
    write
        .send(Message::Text(frame.encode()))
        .await
        .map_err(|e| ServiceError::ConnectionFailed(e.to_string()))
}

/// Resolves once `close()` was called or the connection was dropped
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Read until CONNECTED; frames that arrive in the same message follow it
async fn await_connected(read: &mut WsRead) -> ServiceResult<(Frame, Vec<Frame>)> {
    while let Some(message) = read.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => return Err(ServiceError::ConnectionFailed(e.to_string())),
        };

        let mut frames = Frame::parse_all(&text)?.into_iter();
        while let Some(frame) = frames.next() {
            match frame.command {
                Command::Connected => {
                    debug!(
                        version = ?frame.header("version"),
                        heart_beat = ?frame.header("heart-beat"),
                        "STOMP session opened"
                    );
                    return Ok((frame, frames.collect()));
                }
                Command::Error => {
                    return Err(ServiceError::Protocol(format!(
                        "broker refused session: {}",
                        frame.header("message").unwrap_or("no message")
                    )));
                }
                _ => {}
            }
        }
    }

    Err(ServiceError::ConnectionFailed(
        "socket closed before STOMP handshake completed".to_string(),
    ))
}
