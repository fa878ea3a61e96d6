//! Feed readiness.
//!
//! Readiness answers one question for the rest of the binary: is live data
//! flowing? It follows the event client's [`ConnectionState`] and collapses
//! it into three values published on a watch channel.

use std::fmt;

use deface_realtime::ConnectionState;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessState {
    /// Connected to the push endpoint.
    Ready,
    /// Not connected; the reason says what the client is doing about it.
    NotReadyYet(String),
    /// No connection was requested yet.
    Unknown,
}

impl ReadinessState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessState::Ready)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ReadinessState::Ready => "Ready",
            ReadinessState::NotReadyYet(_) => "NotReadyYet",
            ReadinessState::Unknown => "Unknown",
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            ReadinessState::NotReadyYet(reason) => reason,
            _ => "",
        }
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessState::NotReadyYet(reason) => write!(f, "NotReadyYet: {}", reason),
            other => f.write_str(other.as_str()),
        }
    }
}

impl From<&ConnectionState> for ReadinessState {
    fn from(state: &ConnectionState) -> Self {
        match state {
            ConnectionState::Idle => ReadinessState::Unknown,
            ConnectionState::Connected => ReadinessState::Ready,
            ConnectionState::Connecting => ReadinessState::NotReadyYet("Connecting...".into()),
            ConnectionState::Reconnecting {
                attempt,
                delay_secs,
            } => ReadinessState::NotReadyYet(format!(
                "Reconnecting in {delay_secs:.1} sec (attempt {attempt})"
            )),
            ConnectionState::Disconnected(reason) => {
                ReadinessState::NotReadyYet(format!("Disconnected: {reason}"))
            }
        }
    }
}

async fn follow(
    mut connection_rx: watch::Receiver<ConnectionState>,
    state_tx: watch::Sender<ReadinessState>,
) {
    let initial = ReadinessState::from(&*connection_rx.borrow_and_update());
    debug!("Initial readiness: {}", initial);
    state_tx.send_replace(initial);

    while connection_rx.changed().await.is_ok() {
        let next = ReadinessState::from(&*connection_rx.borrow_and_update());
        let previous = state_tx.send_replace(next.clone());
        if previous == next {
            continue;
        }

        match (&previous, &next) {
            (_, ReadinessState::Ready) => info!("Live feed ready"),
            (ReadinessState::Ready, _) => warn!("Live feed lost: {}", next.reason()),
            _ => debug!("Readiness: {} -> {}", previous, next),
        }
    }

    debug!("Connection state channel closed, readiness tracking stopped");
}

/// Shared readiness tracker.
#[derive(Debug, Clone)]
pub struct Readiness {
    state_tx: watch::Sender<ReadinessState>,
    state_rx: watch::Receiver<ReadinessState>,
}

impl Readiness {
    pub fn new() -> Self {
        let (state_tx, state_rx) = watch::channel(ReadinessState::Unknown);
        Self { state_tx, state_rx }
    }

    pub fn subscribe(&self) -> watch::Receiver<ReadinessState> {
        self.state_rx.clone()
    }

    pub fn current_state(&self) -> ReadinessState {
        self.state_rx.borrow().clone()
    }

    /// Follows `connection_rx` in a background task until the client stops.
    pub fn start_listening(&self, connection_rx: watch::Receiver<ConnectionState>) -> JoinHandle<()> {
        tokio::spawn(follow(connection_rx, self.state_tx.clone()))
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}
