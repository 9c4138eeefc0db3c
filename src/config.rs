#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use bon::Builder;
use regex::Regex;
use url::Url;

use crate::error::Error;
use crate::strategy::MatchStrategy;
use crate::{Result, error};

const DEFAULT_SEND_PAYLOAD: &str = "ping";
const DEFAULT_RECEIVE_PATTERN: &str = "pong";
const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(1000);
const DEFAULT_RECEIVE_WINDOW: Duration = Duration::from_millis(1000);

/// Delay between an unexpected close and the next reconnect attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(2000);

/// Configuration for a managed WebSocket connection.
///
/// Immutable for the connection's lifetime.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Endpoint address, absolute (`ws://`, `wss://`) or base-relative
    /// (leading `/`, resolved against [`Config::base_url`])
    #[builder(into)]
    pub url: String,
    /// Base address used to resolve a relative [`Config::url`]
    #[builder(into)]
    pub base_url: Option<String>,
    /// Reconnect automatically after an unexpected close
    #[builder(default)]
    pub reconnect: bool,
    /// Force-close the connection after this long without any inbound
    /// message. `None` disables the watchdog.
    pub force_disconnect_threshold: Option<Duration>,
    /// Heartbeat liveness probing
    #[builder(default)]
    pub heartbeat: HeartbeatConfig,
}

impl Config {
    /// Resolve the configured address to a full endpoint URL.
    ///
    /// A leading-`/` address is joined to [`Config::base_url`]; anything
    /// else must parse as an absolute URL.
    pub fn resolved_url(&self) -> Result<Url> {
        if self.url.is_empty() {
            return Err(Error::configuration("url must not be empty"));
        }
        if let Some(relative) = self.url.strip_prefix('/') {
            let Some(base) = self.base_url.as_deref() else {
                return Err(Error::configuration(format!(
                    "relative url {:?} requires a base_url",
                    self.url
                )));
            };
            let joined = format!("{}/{relative}", base.trim_end_matches('/'));
            return Ok(Url::parse(&joined)?);
        }
        Ok(Url::parse(&self.url)?)
    }

    /// Construction-time sanity check. Failures are diagnostics, not fatal:
    /// the connection manager logs them and still attempts to connect.
    pub(crate) fn validate(&self) -> Result<()> {
        self.resolved_url()?;
        if self.heartbeat.enable && self.heartbeat.send_interval.is_zero() {
            return Err(Error::configuration(
                "heartbeat send_interval must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Configuration for heartbeat liveness detection.
///
/// While the connection is open, [`HeartbeatConfig::send_payload`] is sent
/// every [`HeartbeatConfig::send_interval`]; inbound payloads arriving
/// within [`HeartbeatConfig::receive_window`] of the send are then checked
/// against [`HeartbeatConfig::receive_pattern`] under
/// [`HeartbeatConfig::strategy`].
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct HeartbeatConfig {
    /// Enable heartbeat probing
    #[builder(default)]
    pub enable: bool,
    /// Payload sent as the liveness probe
    #[builder(into, default = DEFAULT_SEND_PAYLOAD.to_owned())]
    pub send_payload: String,
    /// Interval between probes
    #[builder(default = DEFAULT_SEND_INTERVAL)]
    pub send_interval: Duration,
    /// Pattern an inbound payload must match to count as a receipt
    #[builder(into, default = DEFAULT_RECEIVE_PATTERN.to_owned())]
    pub receive_pattern: String,
    /// How [`HeartbeatConfig::receive_pattern`] is matched
    #[builder(default)]
    pub strategy: MatchStrategy,
    /// Regular expression for [`MatchStrategy::Wildcard`]; unset means
    /// any inbound payload counts as a receipt
    pub pattern_regex: Option<Regex>,
    /// How long after a probe to wait for a matching receipt
    #[builder(default = DEFAULT_RECEIVE_WINDOW)]
    pub receive_window: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enable: false,
            send_payload: DEFAULT_SEND_PAYLOAD.to_owned(),
            send_interval: DEFAULT_SEND_INTERVAL,
            receive_pattern: DEFAULT_RECEIVE_PATTERN.to_owned(),
            strategy: MatchStrategy::default(),
            pattern_regex: None,
            receive_window: DEFAULT_RECEIVE_WINDOW,
        }
    }
}

impl HeartbeatConfig {
    /// Check one inbound payload against the configured pattern.
    #[must_use]
    pub(crate) fn is_receipt(&self, candidate: &str) -> bool {
        self.strategy
            .matches(candidate, &self.receive_pattern, self.pattern_regex.as_ref())
    }

    pub(crate) fn missed(&self) -> error::HeartbeatMissed {
        error::HeartbeatMissed {
            pattern: self.receive_pattern.clone(),
            window: self.receive_window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_defaults() {
        let heartbeat = HeartbeatConfig::default();

        assert!(!heartbeat.enable);
        assert_eq!(heartbeat.send_payload, "ping");
        assert_eq!(heartbeat.send_interval, Duration::from_millis(1000));
        assert_eq!(heartbeat.receive_pattern, "pong");
        assert_eq!(heartbeat.strategy, MatchStrategy::Exact);
        assert_eq!(heartbeat.receive_window, Duration::from_millis(1000));
    }

    #[test]
    fn builder_matches_default() {
        let built = HeartbeatConfig::builder().build();
        let default = HeartbeatConfig::default();

        assert_eq!(built.send_payload, default.send_payload);
        assert_eq!(built.send_interval, default.send_interval);
        assert_eq!(built.receive_pattern, default.receive_pattern);
    }

    #[test]
    fn absolute_url_passes_through() {
        let config = Config::builder().url("wss://example.com/feed").build();

        let url = config.resolved_url().expect("absolute url should resolve");
        assert_eq!(url.as_str(), "wss://example.com/feed");
    }

    #[test]
    fn relative_url_joins_base() {
        let config = Config::builder()
            .url("/chat")
            .base_url("wss://example.com")
            .build();

        let url = config.resolved_url().expect("relative url should resolve");
        assert_eq!(url.as_str(), "wss://example.com/chat");
    }

    #[test]
    fn relative_url_without_base_is_rejected() {
        let config = Config::builder().url("/chat").build();

        let err = config.resolved_url().expect_err("no base_url configured");
        assert_eq!(err.kind(), crate::error::Kind::Configuration);
    }

    #[test]
    fn empty_url_is_rejected() {
        let config = Config::builder().url("").build();

        assert!(config.validate().is_err());
    }

    #[test]
    fn receipt_check_uses_strategy() {
        let heartbeat = HeartbeatConfig::builder()
            .enable(true)
            .receive_pattern("pong")
            .strategy(MatchStrategy::Prefix)
            .build();

        assert!(heartbeat.is_receipt("pong:server-1"));
        assert!(!heartbeat.is_receipt("server-1:pong"));
    }
}
