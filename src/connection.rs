#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::collections::VecDeque;
use std::pin::Pin;

use futures::{SinkExt as _, StreamExt as _};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Sleep, interval_at, sleep};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::Result;
use crate::config::{Config, RECONNECT_DELAY};
use crate::error::{self, Error};
use crate::events::{CloseEvent, Dispatcher, Hooks, Registration};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport-level connection state.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake in progress
    Connecting,
    /// Established and usable
    Open,
    /// Close requested, awaiting the peer's close frame
    Closing,
    /// No live transport
    Closed,
}

impl ConnectionState {
    /// Check if the connection is currently usable for sending.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Snapshot of the manager's observable state.
///
/// `reconnecting` is orthogonal to the transport state: it is true from the
/// moment a reconnect attempt is initiated until the replacement transport
/// reaches [`ConnectionState::Open`] or fails to.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub state: ConnectionState,
    pub reconnecting: bool,
}

/// Commands forwarded from the handle to the connection actor.
enum Command {
    Send(String),
    Close,
    Register(Registration),
}

/// How a live session ended.
struct SessionEnd {
    event: CloseEvent,
    /// Close was requested through the handle; suppresses reconnection.
    explicit: bool,
}

impl SessionEnd {
    fn unexpected() -> Self {
        Self {
            event: CloseEvent::default(),
            explicit: false,
        }
    }
}

/// Outcome of one connection attempt.
enum Establish {
    Connected(Box<WsStream>),
    Failed(Error),
    Shutdown,
}

/// Manages a WebSocket connection's lifecycle, reconnection, heartbeat
/// liveness and silence watchdog.
///
/// All mutable state (transport, outbound queue, heartbeat window, timers,
/// handler slots) is confined to one spawned actor task; this handle talks
/// to it over channels, so clones are cheap and every clone drives the same
/// logical connection.
///
/// # Example
///
/// ```ignore
/// let config = Config::builder()
///     .url("/chat")
///     .base_url("wss://example.com")
///     .reconnect(true)
///     .build();
///
/// let manager = ConnectionManager::connect(config, Hooks::new());
/// manager.on_message(|payload| println!("got {payload}"))?;
/// manager.send_text("hello")?;
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    command_tx: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<Status>,
    shutdown: CancellationToken,
}

impl ConnectionManager {
    /// Start managing a connection to the configured endpoint.
    ///
    /// Configuration problems are diagnostics, not constructor failures:
    /// they are logged at warn level and the connection is still attempted,
    /// surfacing any resulting failure through the `error` event path.
    #[must_use]
    pub fn connect(config: Config, hooks: Hooks) -> Self {
        if let Err(error) = config.validate() {
            tracing::warn!(%error, "degraded configuration, attempting connection anyway");
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(Status {
            state: ConnectionState::Connecting,
            reconnecting: false,
        });
        let shutdown = CancellationToken::new();

        let actor = Actor {
            config,
            dispatcher: Dispatcher::new(hooks),
            command_rx,
            status_tx,
            shutdown: shutdown.clone(),
            reconnecting: false,
            outbound: VecDeque::new(),
        };
        drop(tokio::spawn(actor.run()));

        Self {
            command_tx,
            status_rx,
            shutdown,
        }
    }

    /// Serialize `message` as JSON and send it as one text frame.
    ///
    /// While the connection is `Connecting` the message is buffered and
    /// delivered, in order, when the connection opens. While `Closing` or
    /// `Closed` a diagnostic is logged and the send is attempted anyway,
    /// deferring to the transport's own semantics. With no live transport
    /// (between sessions) the message is dropped.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<()> {
        let json = serde_json::to_string(message)?;
        self.command(Command::Send(json))
    }

    /// Send a raw text payload as one frame, without serialization.
    pub fn send_text<S: Into<String>>(&self, text: S) -> Result<()> {
        self.command(Command::Send(text.into()))
    }

    /// Close the connection and stop the manager.
    ///
    /// Suppresses any pending scheduled reconnect. Idempotent: closing an
    /// already-closing connection logs a diagnostic but still issues the
    /// close request.
    pub fn close(&self) -> Result<()> {
        self.command(Command::Close)
    }

    /// Register the `open` handler, replacing any previous one.
    pub fn on_open(&self, f: impl FnMut() + Send + 'static) -> Result<()> {
        self.command(Command::Register(Registration::Open(Box::new(f))))
    }

    /// Register the `message` handler, replacing any previous one.
    pub fn on_message(&self, f: impl FnMut(&str) + Send + 'static) -> Result<()> {
        self.command(Command::Register(Registration::Message(Box::new(f))))
    }

    /// Register the `error` handler, replacing any previous one.
    pub fn on_error(&self, f: impl FnMut(&Error) + Send + 'static) -> Result<()> {
        self.command(Command::Register(Registration::Error(Box::new(f))))
    }

    /// Register the `close` handler, replacing any previous one.
    pub fn on_close(&self, f: impl FnMut(&CloseEvent) + Send + 'static) -> Result<()> {
        self.command(Command::Register(Registration::Close(Box::new(f))))
    }

    /// Register the `reconnecting` handler, replacing any previous one.
    pub fn on_reconnecting(&self, f: impl FnMut() + Send + 'static) -> Result<()> {
        self.command(Command::Register(Registration::Reconnecting(Box::new(f))))
    }

    /// Register the `reconnected` handler, replacing any previous one.
    pub fn on_reconnected(&self, f: impl FnMut() + Send + 'static) -> Result<()> {
        self.command(Command::Register(Registration::Reconnected(Box::new(f))))
    }

    /// Register the `reconnect_failed` handler, replacing any previous one.
    pub fn on_reconnect_failed(&self, f: impl FnMut() + Send + 'static) -> Result<()> {
        self.command(Command::Register(Registration::ReconnectFailed(Box::new(
            f,
        ))))
    }

    /// Current state snapshot.
    #[must_use]
    pub fn status(&self) -> Status {
        *self.status_rx.borrow()
    }

    /// Subscribe to state changes.
    ///
    /// Useful for detecting reconnections and re-establishing any
    /// application-level session state.
    #[must_use]
    pub fn status_receiver(&self) -> watch::Receiver<Status> {
        self.status_rx.clone()
    }

    /// Wait until the manager has fully terminated.
    pub async fn closed(&self) {
        self.shutdown.cancelled().await;
    }

    fn command(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_e| error::Closed.into())
    }
}

/// The connection actor: sole owner of all mutable connection state.
struct Actor {
    config: Config,
    dispatcher: Dispatcher,
    command_rx: mpsc::UnboundedReceiver<Command>,
    status_tx: watch::Sender<Status>,
    shutdown: CancellationToken,
    reconnecting: bool,
    outbound: VecDeque<String>,
}

impl Actor {
    async fn run(mut self) {
        match self.config.resolved_url() {
            Ok(url) => self.lifecycle(&url).await,
            Err(error) => {
                tracing::warn!(%error, url = %self.config.url, "cannot resolve endpoint");
                self.dispatcher.emit_error(&error);
                self.dispatcher.emit_close(&CloseEvent::default());
            }
        }
        self.set_state(ConnectionState::Closed);
        self.shutdown.cancel();
    }

    /// Connect/session/reconnect cycle. Returns when the connection is
    /// explicitly closed, reconnection is disabled, or all handles dropped.
    async fn lifecycle(&mut self, url: &Url) {
        loop {
            self.set_state(ConnectionState::Connecting);

            match establish(url, &mut self.command_rx, &mut self.dispatcher, &mut self.outbound)
                .await
            {
                Establish::Connected(stream) => {
                    self.set_state(ConnectionState::Open);
                    let end = session(
                        *stream,
                        &self.config,
                        &mut self.dispatcher,
                        &mut self.command_rx,
                        &mut self.outbound,
                        &self.status_tx,
                        &mut self.reconnecting,
                    )
                    .await;

                    self.set_state(ConnectionState::Closed);
                    self.dispatcher.emit_close(&end.event);
                    if end.explicit || !self.config.reconnect {
                        return;
                    }
                }
                Establish::Failed(error) => {
                    tracing::warn!(%error, %url, "unable to connect");
                    self.dispatcher.emit_error(&error);
                    self.set_state(ConnectionState::Closed);
                    self.dispatcher.emit_close(&CloseEvent::default());
                    if self.reconnecting {
                        self.dispatcher.emit_reconnect_failed();
                        self.reconnecting = false;
                        self.set_state(ConnectionState::Closed);
                    }
                    if !self.config.reconnect {
                        return;
                    }
                }
                Establish::Shutdown => {
                    self.set_state(ConnectionState::Closed);
                    self.dispatcher.emit_close(&CloseEvent::default());
                    return;
                }
            }

            // Unsent buffered messages do not survive the session boundary.
            self.outbound.clear();

            if !self.await_reconnect().await {
                return;
            }
        }
    }

    /// Wait out the fixed pre-reconnect delay, then flag the attempt.
    ///
    /// An explicit `close()` arriving during the delay suppresses the
    /// pending reconnect. Sends arriving here are dropped: there is no
    /// transport and the connection is not yet `Connecting`.
    async fn await_reconnect(&mut self) -> bool {
        let delay = sleep(RECONNECT_DELAY);
        tokio::pin!(delay);

        loop {
            tokio::select! {
                () = &mut delay => {
                    self.reconnecting = true;
                    self.dispatcher.emit_reconnecting();
                    return true;
                }
                command = self.command_rx.recv() => match command {
                    Some(Command::Send(_)) => {
                        tracing::debug!("dropping send, no live transport");
                    }
                    Some(Command::Register(registration)) => {
                        self.dispatcher.register(registration);
                    }
                    Some(Command::Close) | None => return false,
                },
            }
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        _ = self.status_tx.send(Status {
            state,
            reconnecting: self.reconnecting,
        });
    }
}

/// Attempt one connection, buffering sends and applying registrations that
/// arrive while the handshake is in flight.
async fn establish(
    url: &Url,
    command_rx: &mut mpsc::UnboundedReceiver<Command>,
    dispatcher: &mut Dispatcher,
    outbound: &mut VecDeque<String>,
) -> Establish {
    let connect = connect_async(url.as_str());
    tokio::pin!(connect);

    loop {
        tokio::select! {
            result = &mut connect => {
                return match result {
                    Ok((stream, _)) => Establish::Connected(Box::new(stream)),
                    Err(e) => Establish::Failed(e.into()),
                };
            }
            command = command_rx.recv() => match command {
                Some(Command::Send(text)) => outbound.push_back(text),
                Some(Command::Register(registration)) => dispatcher.register(registration),
                Some(Command::Close) | None => return Establish::Shutdown,
            },
        }
    }
}

/// Drive one open session: multiplex transport frames, handle commands,
/// heartbeat probing and the silence watchdog.
async fn session(
    stream: WsStream,
    config: &Config,
    dispatcher: &mut Dispatcher,
    command_rx: &mut mpsc::UnboundedReceiver<Command>,
    outbound: &mut VecDeque<String>,
    status_tx: &watch::Sender<Status>,
    reconnecting: &mut bool,
) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    // Deliver messages buffered while connecting, in enqueue order.
    while let Some(text) = outbound.pop_front() {
        if let Err(e) = write.send(Message::Text(text.into())).await {
            let error: Error = e.into();
            dispatcher.emit_error(&error);
            outbound.clear();
            return SessionEnd::unexpected();
        }
    }

    if *reconnecting {
        dispatcher.emit_reconnected();
        *reconnecting = false;
        _ = status_tx.send(Status {
            state: ConnectionState::Open,
            reconnecting: false,
        });
    }
    dispatcher.emit_open();

    let heartbeat = &config.heartbeat;
    // First probe fires one full interval after open, not immediately.
    let mut probe = interval_at(
        Instant::now() + heartbeat.send_interval,
        heartbeat.send_interval,
    );

    let mut awaiting_receipt = false;
    let mut window: Vec<String> = Vec::new();
    let mut receipt_deadline: Option<Pin<Box<Sleep>>> = None;
    // Armed from open; a peer that never says anything is as dead as one
    // that goes quiet mid-stream.
    let mut watchdog: Option<Pin<Box<Sleep>>> = config
        .force_disconnect_threshold
        .map(|threshold| Box::pin(sleep(threshold)));
    let mut closing = false;

    loop {
        tokio::select! {
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let payload = text.as_str();
                    tracing::trace!(%payload, "received text frame");
                    dispatcher.emit_message(payload);

                    // Heartbeat collection: only while a receipt is awaited,
                    // and only the first payload arms the deadline.
                    if heartbeat.enable && awaiting_receipt {
                        window.push(payload.to_owned());
                        if receipt_deadline.is_none() {
                            receipt_deadline =
                                Some(Box::pin(sleep(heartbeat.receive_window)));
                        }
                    }

                    // Any inbound message resets the silence watchdog.
                    if let Some(threshold) = config.force_disconnect_threshold {
                        watchdog = Some(Box::pin(sleep(threshold)));
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let event = frame.map_or_else(CloseEvent::default, |f| CloseEvent {
                        code: Some(f.code.into()),
                        reason: f.reason.as_str().to_owned(),
                    });
                    tracing::debug!(code = ?event.code, "connection closed by peer");
                    return SessionEnd { event, explicit: closing };
                }
                Some(Ok(_)) => {
                    // Binary frames and protocol-level ping/pong are ignored;
                    // heartbeats ride in ordinary text frames.
                }
                Some(Err(e)) => {
                    let error: Error = e.into();
                    tracing::warn!(%error, "transport failure");
                    dispatcher.emit_error(&error);
                    return SessionEnd { event: CloseEvent::default(), explicit: closing };
                }
                None => return SessionEnd { event: CloseEvent::default(), explicit: closing },
            },

            command = command_rx.recv() => match command {
                Some(Command::Send(text)) => {
                    if closing {
                        let error: Error = error::NotOpen {
                            state: ConnectionState::Closing,
                        }
                        .into();
                        tracing::warn!(%error, "send while connection is closing");
                    }
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        if closing {
                            tracing::debug!(error = %e, "send rejected during close");
                        } else {
                            let error: Error = e.into();
                            dispatcher.emit_error(&error);
                            return SessionEnd::unexpected();
                        }
                    }
                }
                Some(Command::Close) => {
                    if closing {
                        let error: Error = error::AlreadyClosing.into();
                        tracing::warn!(%error, "redundant close request");
                    } else {
                        closing = true;
                        _ = status_tx.send(Status {
                            state: ConnectionState::Closing,
                            reconnecting: *reconnecting,
                        });
                        // Local close tears down the heartbeat immediately.
                        // The watchdog stays armed: it bounds the close
                        // handshake against a peer that never answers.
                        awaiting_receipt = false;
                        window.clear();
                        receipt_deadline = None;
                    }
                    // Issue (or re-issue) the close request; the session ends
                    // when the peer's close frame comes back on the read half.
                    if let Err(e) = write.send(Message::Close(None)).await {
                        tracing::debug!(error = %e, "close request failed");
                        return SessionEnd { event: CloseEvent::default(), explicit: true };
                    }
                }
                Some(Command::Register(registration)) => dispatcher.register(registration),
                None => {
                    // Every handle is gone; nothing can observe us anymore.
                    _ = write.send(Message::Close(None)).await;
                    return SessionEnd { event: CloseEvent::default(), explicit: true };
                }
            },

            _ = probe.tick(), if heartbeat.enable && !closing => {
                tracing::trace!(payload = %heartbeat.send_payload, "sending heartbeat");
                if let Err(e) = write
                    .send(Message::Text(heartbeat.send_payload.clone().into()))
                    .await
                {
                    let error: Error = e.into();
                    dispatcher.emit_error(&error);
                    return SessionEnd::unexpected();
                }
                awaiting_receipt = true;
            },

            () = async { receipt_deadline.as_mut().expect("deadline armed").await },
                if receipt_deadline.is_some() =>
            {
                if !window.iter().any(|payload| heartbeat.is_receipt(payload)) {
                    let error: Error = heartbeat.missed().into();
                    tracing::warn!(%error, "heartbeat receipt not found");
                    dispatcher.emit_break_off();
                }
                window.clear();
                awaiting_receipt = false;
                receipt_deadline = None;
            },

            () = async { watchdog.as_mut().expect("watchdog armed").await },
                if watchdog.is_some() =>
            {
                let threshold = config
                    .force_disconnect_threshold
                    .unwrap_or_default();
                let error: Error = error::ForceDisconnect { threshold }.into();
                tracing::warn!(%error, "watchdog fired");
                // Best effort close frame; a dead peer will never answer, so
                // the session ends now and the stream drop severs the socket.
                // A fire during a requested close still counts as explicit.
                _ = write.send(Message::Close(None)).await;
                return SessionEnd { event: CloseEvent::default(), explicit: closing };
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_open_counts_as_open() {
        assert!(ConnectionState::Open.is_open());
        assert!(!ConnectionState::Connecting.is_open());
        assert!(!ConnectionState::Closing.is_open());
        assert!(!ConnectionState::Closed.is_open());
    }

    #[test]
    fn session_end_unexpected_is_not_explicit() {
        let end = SessionEnd::unexpected();
        assert!(!end.explicit);
        assert!(end.event.code.is_none());
    }
}
