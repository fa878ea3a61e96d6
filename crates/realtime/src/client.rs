//! Entry point: build, start and use the event client.
//!
//! [`RealtimeManager`] validates configuration, spawns the connection kernel
//! and returns an [`EventClient`]. The client is a cheap, cloneable handle;
//! all clones talk to the same kernel and share one listener registry.
//!
//! # Typical Usage
//!
//! ```ignore
//! let client = RealtimeManager::from_config(config)?.build_and_start();
//!
//! let handle = client.on("stats_update", |payload| {
//!     println!("stats: {payload}");
//!     Ok(())
//! });
//! client.connect();
//!
//! // later
//! client.off(&handle);
//! client.disconnect();
//! client.shutdown().await;
//! ```

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use validator::Validate;

use super::{
    config::Config,
    connection::{Command, ConnectionKernel},
    error::Result,
    message::encode,
    registry::{ListenerHandle, ListenerRegistry, ListenerResult},
    router::MessageRouter,
    state::ConnectionState,
    transport::{Connector, WsConnector},
};

/// Outcome of [`EventClient::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Handed to the open connection.
    Dispatched,
    /// Not connected; the payload was dropped.
    Discarded,
}

/// Builder for an [`EventClient`].
pub struct RealtimeManager {
    config: Config,
    connector: Arc<dyn Connector>,
    cancel_token: CancellationToken,
}

impl RealtimeManager {
    /// Validates `config` and prepares a WebSocket client.
    ///
    /// # Errors
    /// `RealtimeError::Config` when a field is out of range.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connector: Arc::new(WsConnector),
            cancel_token: CancellationToken::new(),
        })
    }

    /// Default settings with a custom endpoint.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::from_config(Config {
            url: url.into(),
            ..Default::default()
        })
    }

    /// Replaces the transport, e.g. with an in-memory one.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token that stops the kernel when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Spawns the connection kernel and returns the client handle.
    ///
    /// The client starts `Idle`; nothing touches the network before
    /// [`EventClient::connect`]. Must be called inside a tokio runtime.
    pub fn build_and_start(self) -> EventClient {
        let registry = Arc::new(ListenerRegistry::new());
        let (commands, command_rx) = mpsc::unbounded_channel();

        let kernel = ConnectionKernel::new(
            &self.config,
            self.connector,
            MessageRouter::new(registry.clone()),
            command_rx,
            self.cancel_token.clone(),
        );
        let state_rx = kernel.subscribe_state();
        let attempts = kernel.attempts();
        let task = tokio::spawn(kernel.run());

        info!(url = %self.config.url, topics = ?self.config.topics, "Event client started");
        EventClient {
            commands,
            state_rx,
            attempts,
            registry,
            cancel: self.cancel_token,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }
}

/// Handle to a running event client.
///
/// Dropping the last clone stops the kernel and closes the connection. A
/// clone captured by a registered listener counts as a live handle, so in
/// that case the kernel keeps running until [`EventClient::shutdown`] is
/// called or the manager's cancel token fires.
#[derive(Clone)]
pub struct EventClient {
    commands: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    attempts: Arc<AtomicU32>,
    registry: Arc<ListenerRegistry>,
    cancel: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl EventClient {
    /// Connects to the configured address.
    ///
    /// No-op while connected or while an attempt is in flight. Cancels a
    /// pending retry and restores the retry budget otherwise.
    pub fn connect(&self) {
        self.command(Command::Connect { url: None });
    }

    /// Like [`EventClient::connect`] with an explicit address, remembered for
    /// later retries.
    pub fn connect_to(&self, url: impl Into<String>) {
        self.command(Command::Connect {
            url: Some(url.into()),
        });
    }

    /// Closes the connection, cancels any pending retry and stops the
    /// keep-alive. Idempotent.
    pub fn disconnect(&self) {
        self.command(Command::Disconnect);
    }

    /// Sends a subscribe frame if connected; dropped otherwise.
    pub fn subscribe(&self, topic: impl Into<String>) {
        self.command(Command::Subscribe(topic.into()));
    }

    /// Sends an unsubscribe frame if connected; dropped otherwise.
    pub fn unsubscribe(&self, topic: impl Into<String>) {
        self.command(Command::Unsubscribe(topic.into()));
    }

    /// Registers `callback` for every inbound message of `message_type`.
    pub fn on<F>(&self, message_type: &str, callback: F) -> ListenerHandle
    where
        F: Fn(&Value) -> ListenerResult + Send + Sync + 'static,
    {
        self.registry.register(message_type, Arc::new(callback))
    }

    /// Registers a callback taking the payload decoded as `T`.
    ///
    /// A payload that does not decode counts as a failed invocation.
    pub fn on_typed<T, F>(&self, message_type: &str, callback: F) -> ListenerHandle
    where
        T: DeserializeOwned,
        F: Fn(T) -> ListenerResult + Send + Sync + 'static,
    {
        self.on(message_type, move |payload: &Value| {
            let value: T = Deserialize::deserialize(payload)?;
            callback(value)
        })
    }

    /// Cancels one registration. Returns false if it was already gone.
    pub fn off(&self, handle: &ListenerHandle) -> bool {
        self.registry.cancel(handle)
    }

    /// Serialises `data` and transmits it if connected.
    ///
    /// Never queues: while disconnected the payload is dropped with a warning
    /// and `SendStatus::Discarded` is returned.
    ///
    /// The check reads the last published state. `Dispatched` means the
    /// frame was handed to the kernel, not that it was written: a
    /// [`EventClient::disconnect`] issued just before is processed first and
    /// the frame is then dropped.
    ///
    /// # Errors
    /// `RealtimeError::Serialization` if `data` is not representable as JSON.
    pub fn send<T: Serialize + ?Sized>(&self, data: &T) -> Result<SendStatus> {
        let text = encode(data)?;

        if !self.state_rx.borrow().is_connected() {
            warn!("Not connected, message discarded");
            return Ok(SendStatus::Discarded);
        }
        if self.commands.send(Command::Send(text)).is_err() {
            warn!("Event client stopped, message discarded");
            return Ok(SendStatus::Discarded);
        }
        Ok(SendStatus::Dispatched)
    }

    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state_rx.borrow().is_connected()
    }

    /// Receiver notified on every state change.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Consecutive retries scheduled since the last successful connection.
    pub fn reconnect_attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }

    pub fn registry(&self) -> Arc<ListenerRegistry> {
        self.registry.clone()
    }

    /// Stops the kernel for good and waits for it to close the connection.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                warn!("Connection kernel terminated abnormally: {}", e);
            }
        }
    }

    fn command(&self, command: Command) {
        if let Err(e) = self.commands.send(command) {
            debug!(command = ?e.0, "Event client stopped, command dropped");
        }
    }
}
