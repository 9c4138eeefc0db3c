use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use crate::connection::ConnectionState;

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Error related to invalid or missing configuration
    Configuration,
    /// Error connecting to or communicating with the WebSocket server
    Transport,
    /// Send attempted while the connection was not open
    NotOpen,
    /// Close requested while the connection was already closing
    AlreadyClosing,
    /// No matching heartbeat receipt arrived within the receive window
    Heartbeat,
    /// Watchdog forced a disconnect after prolonged silence
    Watchdog,
    /// Operation attempted after the connection manager terminated
    Closed,
    /// Internal error from dependencies
    Internal,
}

/// Crate-wide error type.
///
/// Liveness and transport failures never surface as `Err` from the public
/// API; they are logged and reported through the `error` and
/// `reconnect_failed` event paths. The only error callers receive from
/// [`send`](crate::ConnectionManager::send) or
/// [`close`](crate::ConnectionManager::close) is [`Kind::Closed`].
#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    #[must_use]
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    #[must_use]
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            source: None,
            backtrace: Backtrace::capture(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    #[must_use]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    #[must_use]
    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }

    #[must_use]
    pub fn configuration<S: Into<String>>(reason: S) -> Self {
        Configuration {
            reason: reason.into(),
        }
        .into()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{:?}: {}", self.kind, src),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

#[non_exhaustive]
#[derive(Debug)]
pub struct Configuration {
    pub reason: String,
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid configuration: {}", self.reason)
    }
}

impl StdError for Configuration {}

impl From<Configuration> for Error {
    fn from(err: Configuration) -> Self {
        Self::with_source(Kind::Configuration, err)
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy)]
pub struct NotOpen {
    pub state: ConnectionState,
}

impl fmt::Display for NotOpen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "send attempted while connection is {:?}", self.state)
    }
}

impl StdError for NotOpen {}

impl From<NotOpen> for Error {
    fn from(err: NotOpen) -> Self {
        Self::with_source(Kind::NotOpen, err)
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy)]
pub struct AlreadyClosing;

impl fmt::Display for AlreadyClosing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "close requested while connection is already closing")
    }
}

impl StdError for AlreadyClosing {}

impl From<AlreadyClosing> for Error {
    fn from(err: AlreadyClosing) -> Self {
        Self::with_source(Kind::AlreadyClosing, err)
    }
}

#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct HeartbeatMissed {
    pub pattern: String,
    pub window: Duration,
}

impl fmt::Display for HeartbeatMissed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no heartbeat receipt matching {:?} within {:?}",
            self.pattern, self.window
        )
    }
}

impl StdError for HeartbeatMissed {}

impl From<HeartbeatMissed> for Error {
    fn from(err: HeartbeatMissed) -> Self {
        Self::with_source(Kind::Heartbeat, err)
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy)]
pub struct ForceDisconnect {
    pub threshold: Duration,
}

impl fmt::Display for ForceDisconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no inbound message for {:?}, forcing disconnect",
            self.threshold
        )
    }
}

impl StdError for ForceDisconnect {}

impl From<ForceDisconnect> for Error {
    fn from(err: ForceDisconnect) -> Self {
        Self::with_source(Kind::Watchdog, err)
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy)]
pub struct Closed;

impl fmt::Display for Closed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection manager has terminated")
    }
}

impl StdError for Closed {}

impl From<Closed> for Error {
    fn from(err: Closed) -> Self {
        Self::with_source(Kind::Closed, err)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::with_source(Kind::Transport, e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::with_source(Kind::Internal, e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::with_source(Kind::Configuration, e)
    }
}
