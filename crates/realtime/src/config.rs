//! Event client configuration.
//!
//! All fields have defaults, so an empty TOML table yields a client that talks
//! to the local monitoring server:
//!
//! ```toml
//! [realtime]
//! url = "ws://monitor.internal:8000/ws"
//! topics = ["stats", "activity", "alerts"]
//! reconnect_delay_ms = 3000
//! max_reconnect_attempts = 5
//! keep_alive_interval = 30
//! connection_timeout = 10
//! ```
//!
//! Validation runs when the client is built, so a bad value fails at startup
//! instead of on the first reconnect.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::retry::RetryPolicy;

/// Address used by `connect()` when none is given.
pub const DEFAULT_URL: &str = "ws://localhost:8000/ws";

/// Topics requested on every successful connection.
pub const DEFAULT_TOPICS: [&str; 3] = ["stats", "activity", "alerts"];

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Push endpoint, `ws://` or `wss://` (the latter needs the `tls` feature).
    #[validate(custom(function = "validate_ws_url"))]
    pub url: String,

    /// Fixed topic list (re)subscribed on every connection.
    ///
    /// Owned by the client; callers cannot change it after construction.
    #[validate(custom(function = "validate_topics"))]
    pub topics: Vec<String>,

    /// Constant wait between reconnection attempts, in milliseconds.
    #[validate(range(
        min = 1,
        max = 3_600_000,
        message = "Reconnect delay must be between 1 ms and 1 hour"
    ))]
    pub reconnect_delay_ms: u64,

    /// Attempts allowed after a failure before the client gives up.
    ///
    /// `0` disables automatic reconnection.
    #[validate(range(max = 1000, message = "Max reconnect attempts must not exceed 1000"))]
    pub max_reconnect_attempts: u32,

    /// Seconds between two liveness pings on an open connection.
    #[validate(range(
        min = 1,
        max = 3600,
        message = "Keep-alive interval must be between 1 and 3600 seconds"
    ))]
    pub keep_alive_interval: u64,

    /// Seconds a single connection attempt may take.
    #[validate(range(
        min = 1,
        max = 300,
        message = "Connection timeout must be between 1 and 300 seconds"
    ))]
    pub connection_timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            topics: DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect(),
            reconnect_delay_ms: 3000,
            max_reconnect_attempts: 5,
            keep_alive_interval: 30,
            connection_timeout: 10,
        }
    }
}

impl Config {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_interval)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout)
    }

    /// Fresh retry policy for a kernel built from this config.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.reconnect_delay(), self.max_reconnect_attempts)
    }
}

fn validate_ws_url(url: &str) -> Result<(), ValidationError> {
    let rest = url
        .strip_prefix("ws://")
        .or_else(|| url.strip_prefix("wss://"));

    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
        _ => {
            let mut err = ValidationError::new("invalid_url");
            err.message = Some(format!("Not a ws:// or wss:// address: '{url}'").into());
            Err(err)
        }
    }
}

fn validate_topics(topics: &[String]) -> Result<(), ValidationError> {
    if let Some(bad) = topics.iter().find(|t| t.trim().is_empty()) {
        let mut err = ValidationError::new("invalid_topic");
        err.message = Some(format!("Topic names must not be blank: '{bad}'").into());
        return Err(err);
    }
    Ok(())
}
