//! Error type for the event client.
//!
//! Most failures in this crate never reach the caller: transport errors feed
//! the reconnection policy, malformed frames and failing listeners are logged
//! and dropped. `RealtimeError` is what remains visible at the edges:
//!
//! - **Setup**: `Config` (validation of [`crate::Config`]).
//! - **Transport**: `WebSocket`, `ConnectTimeout`, `Transport`, `NotConnected`.
//!   Returned by [`crate::transport::Transport`] implementations and consumed by
//!   the connection kernel.
//! - **Data**: `Serialization` for outbound values that are not valid JSON,
//!   `Deserialization` for inbound frames or payloads of an unexpected shape.
//! - **Policy**: `Retry` when the reconnection budget is spent.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Configuration did not pass validation.
    #[error("Configuration error: {0}")]
    Config(#[from] validator::ValidationErrors),

    /// The WebSocket layer failed (handshake, I/O, protocol).
    ///
    /// Boxed to keep the enum small.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// The connection attempt did not complete in time.
    #[error("Connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Transport failure not covered by a more specific variant.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An operation needed an open connection.
    #[error("Not connected")]
    NotConnected,

    /// An outbound value could not be encoded as JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An inbound frame or payload could not be decoded.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// The reconnection budget is spent.
    #[error("Retry policy error: {0}")]
    Retry(#[from] super::retry::RetryError),
}

impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        RealtimeError::WebSocket(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, RealtimeError>;
