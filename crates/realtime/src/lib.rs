//! Real-time event client for the integrity monitoring server.
//!
//! The client keeps one WebSocket connection to the server's push endpoint,
//! subscribes a fixed set of topics on every (re)connection, pings the server
//! while connected and routes inbound JSON messages to listeners by their
//! `type`. Lost connections are retried with a constant delay up to a
//! configured number of attempts.
//!
//! # Quick start
//!
//! ```ignore
//! use deface_realtime::{Config, RealtimeManager};
//!
//! let client = RealtimeManager::from_config(Config::default())?.build_and_start();
//! client.on("stats_update", |payload| {
//!     tracing::info!("stats: {payload}");
//!     Ok(())
//! });
//! client.connect();
//! ```
//!
//! # Modules
//!
//! - [`client`]: `RealtimeManager` builder and the `EventClient` handle
//! - `connection`: the kernel task that owns the connection
//! - [`registry`] / [`router`]: listener bookkeeping and inbound dispatch
//! - [`message`]: wire model
//! - [`transport`]: `Connector`/`Transport` seam, WebSocket implementation
//! - [`retry`], [`keepalive`], [`state`], [`config`], [`error`]

pub mod client;
pub mod config;
mod connection;
pub mod error;
pub mod keepalive;
pub mod message;
pub mod registry;
pub mod retry;
pub mod router;
pub mod state;
pub mod transport;

#[cfg(test)]
mod mock;

pub use client::{EventClient, RealtimeManager, SendStatus};
pub use config::Config;
pub use error::{RealtimeError, Result};
pub use message::{message_types, ControlFrame, InboundMessage};
pub use registry::{Listener, ListenerError, ListenerHandle, ListenerRegistry, ListenerResult};
pub use state::ConnectionState;
pub use transport::{Connector, Transport, WsConnector};
