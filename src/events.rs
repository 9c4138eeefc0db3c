//! Lifecycle event callbacks.
//!
//! Two observer layers exist for every lifecycle event:
//!
//! - [`Hooks`]: global callbacks supplied once at construction, invoked for
//!   every occurrence of their event for the life of the manager.
//! - Per-event handlers: registered through the
//!   [`ConnectionManager`](crate::ConnectionManager) handle at any time.
//!   Each event has exactly one slot; registering replaces the previous
//!   handler (last registration wins).
//!
//! For a given occurrence the global hook always runs before the per-event
//! handler. Callbacks are observers, never flow control: nothing they return
//! influences the state machine.

use crate::error::Error;

/// Callback for events that carry no payload.
pub type EventFn = Box<dyn FnMut() + Send>;
/// Callback for inbound message payloads.
pub type MessageFn = Box<dyn FnMut(&str) + Send>;
/// Callback for non-fatal transport errors.
pub type ErrorFn = Box<dyn FnMut(&Error) + Send>;
/// Callback for close events.
pub type CloseFn = Box<dyn FnMut(&CloseEvent) + Send>;

/// Details of a connection close, as reported by the transport.
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct CloseEvent {
    /// Close code from the peer's close frame, if one was sent
    pub code: Option<u16>,
    /// Close reason from the peer's close frame
    pub reason: String,
}

/// Global lifecycle hooks, configured once at construction.
#[derive(Default)]
pub struct Hooks {
    pub(crate) open: Option<EventFn>,
    pub(crate) message: Option<MessageFn>,
    pub(crate) error: Option<ErrorFn>,
    pub(crate) close: Option<CloseFn>,
    pub(crate) reconnecting: Option<EventFn>,
    pub(crate) reconnected: Option<EventFn>,
    pub(crate) reconnect_failed: Option<EventFn>,
    /// Recovery hook invoked when a heartbeat receipt is missed. The
    /// monitor itself never decides recovery; that is the caller's call.
    pub(crate) break_off: Option<EventFn>,
}

impl Hooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_open(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.open = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_message(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.message = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_error(mut self, f: impl FnMut(&Error) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_close(mut self, f: impl FnMut(&CloseEvent) + Send + 'static) -> Self {
        self.close = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_reconnecting(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.reconnecting = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_reconnected(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.reconnected = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_reconnect_failed(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.reconnect_failed = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_break_off(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.break_off = Some(Box::new(f));
        self
    }
}

/// A replacement registration for one per-event handler slot.
pub(crate) enum Registration {
    Open(EventFn),
    Message(MessageFn),
    Error(ErrorFn),
    Close(CloseFn),
    Reconnecting(EventFn),
    Reconnected(EventFn),
    ReconnectFailed(EventFn),
}

/// Per-event handler slots, owned by the connection actor.
#[derive(Default)]
struct Handlers {
    open: Option<EventFn>,
    message: Option<MessageFn>,
    error: Option<ErrorFn>,
    close: Option<CloseFn>,
    reconnecting: Option<EventFn>,
    reconnected: Option<EventFn>,
    reconnect_failed: Option<EventFn>,
}

/// Owns both observer layers and enforces hook-before-handler ordering.
#[derive(Default)]
pub(crate) struct Dispatcher {
    hooks: Hooks,
    handlers: Handlers,
}

impl Dispatcher {
    pub(crate) fn new(hooks: Hooks) -> Self {
        Self {
            hooks,
            handlers: Handlers::default(),
        }
    }

    pub(crate) fn register(&mut self, registration: Registration) {
        match registration {
            Registration::Open(f) => self.handlers.open = Some(f),
            Registration::Message(f) => self.handlers.message = Some(f),
            Registration::Error(f) => self.handlers.error = Some(f),
            Registration::Close(f) => self.handlers.close = Some(f),
            Registration::Reconnecting(f) => self.handlers.reconnecting = Some(f),
            Registration::Reconnected(f) => self.handlers.reconnected = Some(f),
            Registration::ReconnectFailed(f) => self.handlers.reconnect_failed = Some(f),
        }
    }

    pub(crate) fn emit_open(&mut self) {
        if let Some(f) = self.hooks.open.as_mut() {
            f();
        }
        if let Some(f) = self.handlers.open.as_mut() {
            f();
        }
    }

    pub(crate) fn emit_message(&mut self, payload: &str) {
        if let Some(f) = self.hooks.message.as_mut() {
            f(payload);
        }
        if let Some(f) = self.handlers.message.as_mut() {
            f(payload);
        }
    }

    pub(crate) fn emit_error(&mut self, error: &Error) {
        if let Some(f) = self.hooks.error.as_mut() {
            f(error);
        }
        if let Some(f) = self.handlers.error.as_mut() {
            f(error);
        }
    }

    pub(crate) fn emit_close(&mut self, event: &CloseEvent) {
        if let Some(f) = self.hooks.close.as_mut() {
            f(event);
        }
        if let Some(f) = self.handlers.close.as_mut() {
            f(event);
        }
    }

    pub(crate) fn emit_reconnecting(&mut self) {
        if let Some(f) = self.hooks.reconnecting.as_mut() {
            f();
        }
        if let Some(f) = self.handlers.reconnecting.as_mut() {
            f();
        }
    }

    pub(crate) fn emit_reconnected(&mut self) {
        if let Some(f) = self.hooks.reconnected.as_mut() {
            f();
        }
        if let Some(f) = self.handlers.reconnected.as_mut() {
            f();
        }
    }

    pub(crate) fn emit_reconnect_failed(&mut self) {
        if let Some(f) = self.hooks.reconnect_failed.as_mut() {
            f();
        }
        if let Some(f) = self.handlers.reconnect_failed.as_mut() {
            f();
        }
    }

    pub(crate) fn emit_break_off(&mut self) {
        if let Some(f) = self.hooks.break_off.as_mut() {
            f();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> impl FnMut() + Send + use<> {
        let log = Arc::clone(log);
        move || log.lock().expect("log lock").push(tag)
    }

    #[test]
    fn hook_runs_before_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks = Hooks::new().on_open(recorder(&log, "hook"));

        let mut dispatcher = Dispatcher::new(hooks);
        dispatcher.register(Registration::Open(Box::new(recorder(&log, "handler"))));
        dispatcher.emit_open();

        assert_eq!(*log.lock().expect("log lock"), vec!["hook", "handler"]);
    }

    #[test]
    fn registration_replaces_previous_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = Dispatcher::new(Hooks::new());

        dispatcher.register(Registration::Reconnecting(Box::new(recorder(
            &log, "first",
        ))));
        dispatcher.register(Registration::Reconnecting(Box::new(recorder(
            &log, "second",
        ))));
        dispatcher.emit_reconnecting();

        assert_eq!(*log.lock().expect("log lock"), vec!["second"]);
    }

    #[test]
    fn hook_fires_without_handler_registered() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks = Hooks::new().on_reconnect_failed(recorder(&log, "hook"));

        let mut dispatcher = Dispatcher::new(hooks);
        dispatcher.emit_reconnect_failed();
        dispatcher.emit_reconnect_failed();

        assert_eq!(*log.lock().expect("log lock"), vec!["hook", "hook"]);
    }

    #[test]
    fn message_payload_reaches_both_layers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hook_log = Arc::clone(&log);
        let handler_log = Arc::clone(&log);

        let hooks = Hooks::new().on_message(move |payload| {
            hook_log
                .lock()
                .expect("log lock")
                .push(format!("hook:{payload}"));
        });
        let mut dispatcher = Dispatcher::new(hooks);
        dispatcher.register(Registration::Message(Box::new(move |payload| {
            handler_log
                .lock()
                .expect("log lock")
                .push(format!("handler:{payload}"));
        })));

        dispatcher.emit_message("pong");

        assert_eq!(
            *log.lock().expect("log lock"),
            vec!["hook:pong".to_owned(), "handler:pong".to_owned()]
        );
    }
}
