//! Lifecycle state of the event client connection.
//!
//! The kernel publishes a [`ConnectionState`] on a watch channel every time the
//! connection moves between phases. Applications observe it to show a "live"
//! indicator or to gate work on connectivity.
//!
//! # Examples
//!
//! ```ignore
//! use deface_realtime::ConnectionState;
//!
//! let state = ConnectionState::Reconnecting { attempt: 2, delay_secs: 3.0 };
//! println!("{}", state);          // "Reconnecting (attempt 2 in 3 seconds)"
//! println!("{}", state.as_str()); // "Reconnecting"
//! ```

use std::fmt;

/// Current phase of the event client connection.
///
/// Lifecycle:
/// - `Idle` until the first `connect`
/// - `Connecting` -> `Connected` (handshake succeeded)
/// - `Connecting`/`Connected` -> `Disconnected` (refused, closed, errored)
/// - `Disconnected` -> `Reconnecting` -> `Connecting` -> ... (fixed-delay retry)
/// - `Disconnected` stays put once the retry budget is spent, until an
///   explicit `connect`
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// No connection has ever been requested.
    Idle,

    /// A connection attempt is in flight.
    Connecting,

    /// The transport is open, topics were requested and keep-alive is running.
    ///
    /// The only state in which outbound frames are transmitted.
    Connected,

    /// Disconnected with a retry timer pending.
    ///
    /// `attempt` is the value of the reconnection counter for the pending
    /// retry (1-based), `delay_secs` the time until it fires.
    Reconnecting { attempt: u32, delay_secs: f64 },

    /// Not connected and no retry pending.
    ///
    /// Carries the reason of the last transition: a transport error, a close
    /// by the server, an explicit disconnect or an exhausted retry budget.
    Disconnected(String),
}

impl ConnectionState {
    /// Short identifier, suitable for logs and status displays.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Reconnecting { .. } => "Reconnecting",
            ConnectionState::Disconnected(_) => "Disconnected",
        }
    }

    /// Contextual details: the disconnect reason or the pending retry.
    pub fn details(&self) -> String {
        match self {
            ConnectionState::Idle | ConnectionState::Connecting | ConnectionState::Connected => {
                String::new()
            }
            ConnectionState::Reconnecting {
                attempt,
                delay_secs,
            } => format!("attempt {attempt} in {delay_secs} seconds"),
            ConnectionState::Disconnected(reason) => reason.clone(),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// True while an attempt is in flight or scheduled.
    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())?;
        let details = self.details();
        if !details.is_empty() {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_as_str() {
        assert_eq!(ConnectionState::Idle.as_str(), "Idle");
        assert_eq!(ConnectionState::Connecting.as_str(), "Connecting");
        assert_eq!(ConnectionState::Connected.as_str(), "Connected");
        assert_eq!(
            ConnectionState::Reconnecting {
                attempt: 1,
                delay_secs: 3.0
            }
            .as_str(),
            "Reconnecting"
        );
        assert_eq!(
            ConnectionState::Disconnected("closed".into()).as_str(),
            "Disconnected"
        );
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        assert_eq!(
            ConnectionState::Reconnecting {
                attempt: 2,
                delay_secs: 3.0
            }
            .to_string(),
            "Reconnecting (attempt 2 in 3 seconds)"
        );
        assert_eq!(
            ConnectionState::Disconnected("closed by server".into()).to_string(),
            "Disconnected (closed by server)"
        );
    }

    #[test]
    fn test_state_predicates() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Idle.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());

        assert!(ConnectionState::Connecting.is_connecting());
        assert!(ConnectionState::Reconnecting {
            attempt: 1,
            delay_secs: 1.0
        }
        .is_connecting());
        assert!(!ConnectionState::Disconnected("x".into()).is_connecting());
        assert!(!ConnectionState::Idle.is_connecting());
    }
}
