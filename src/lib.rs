//! Resilient client-side WebSocket connection management.
//!
//! This crate keeps a logical connection alive across transient network
//! failures, detects silent failures the transport never surfaces (dead
//! peers that never close the socket), and exposes a small event-driven
//! lifecycle contract instead of raw transport events.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: owns the connection lifecycle. Automatic
//!   reconnection with a fixed delay, outbound buffering while connecting,
//!   heartbeat liveness probing with receipt verification, and a
//!   "no message for N ms" force-disconnect watchdog.
//! - [`Hooks`]: global lifecycle callbacks supplied at construction.
//! - [`MatchStrategy`]: pluggable heartbeat receipt matching.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use ws_sentinel::{Config, ConnectionManager, HeartbeatConfig, Hooks, MatchStrategy};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::builder()
//!         .url("/chat")
//!         .base_url("wss://example.com")
//!         .reconnect(true)
//!         .force_disconnect_threshold(Duration::from_secs(30))
//!         .heartbeat(
//!             HeartbeatConfig::builder()
//!                 .enable(true)
//!                 .receive_pattern("pong")
//!                 .strategy(MatchStrategy::Contains)
//!                 .build(),
//!         )
//!         .build();
//!
//!     let hooks = Hooks::new().on_break_off(|| eprintln!("peer stopped answering"));
//!     let manager = ConnectionManager::connect(config, hooks);
//!
//!     manager.on_message(|payload| println!("received: {payload}"))?;
//!     manager.send_text("hello")?;
//!
//!     manager.closed().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod strategy;

pub use config::{Config, HeartbeatConfig, RECONNECT_DELAY};
pub use connection::{ConnectionManager, ConnectionState, Status};
pub use error::Error;
pub use events::{CloseEvent, Hooks};
pub use strategy::MatchStrategy;

pub type Result<T> = std::result::Result<T, Error>;
