//! Connection kernel: the single task that owns the transport.
//!
//! The kernel is the heart of the event client. It opens connections,
//! re-subscribes topics, pings the server, routes inbound frames to listeners
//! and applies the fixed-delay retry policy when a connection fails or drops.
//!
//! # Architecture
//!
//! ```text
//! EventClient handles (any task)
//!     ↓ Command (mpsc)                  ↑ ConnectionState (watch)
//! ConnectionKernel::run  (one task, tokio::select! loop)
//!     ├─ Phase::Idle
//!     ├─ Phase::Connecting(attempt future, bounded by connect timeout)
//!     ├─ Phase::Connected { transport, keep-alive timer }
//!     └─ Phase::Waiting(retry timer)
//!     ↓
//! Connector / Transport (WebSocket in production)
//! ```
//!
//! Timers and in-flight attempts are values stored in the current [`Phase`].
//! Replacing the phase drops them, so a stale retry timer or a late handshake
//! result can never act on a newer connection.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    sync::{mpsc, watch},
    time::Sleep,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

use super::{
    config::Config,
    error::{RealtimeError, Result},
    keepalive::KeepAlive,
    message::ControlFrame,
    retry::RetryPolicy,
    router::MessageRouter,
    state::ConnectionState,
    transport::{Connector, Transport},
};

type Attempt = Pin<Box<dyn Future<Output = Result<Box<dyn Transport>>> + Send>>;

/// Requests sent from client handles to the kernel.
#[derive(Debug)]
pub(crate) enum Command {
    /// Open a connection. `None` reuses the remembered address.
    Connect { url: Option<String> },
    Disconnect,
    Subscribe(String),
    Unsubscribe(String),
    /// Pre-serialised application frame.
    Send(String),
}

enum Phase {
    Idle,
    Connecting(Attempt),
    Connected {
        link: Box<dyn Transport>,
        keep_alive: KeepAlive,
    },
    Waiting(Pin<Box<Sleep>>),
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Connecting(_) => "connecting",
            Phase::Connected { .. } => "connected",
            Phase::Waiting(_) => "waiting",
        }
    }

    /// Resolves when something owned by the phase needs attention.
    ///
    /// Cancel safe: every future polled here either lives in the phase itself
    /// or is cancel safe on its own.
    async fn wake(&mut self) -> Wake {
        match self {
            Phase::Idle => std::future::pending().await,
            Phase::Connecting(attempt) => Wake::Attempt(attempt.as_mut().await),
            Phase::Connected { link, keep_alive } => {
                tokio::select! {
                    frame = link.next_frame() => Wake::Frame(frame),
                    _ = keep_alive.tick() => Wake::KeepAlive,
                }
            }
            Phase::Waiting(timer) => {
                timer.as_mut().await;
                Wake::RetryDue
            }
        }
    }
}

enum Wake {
    Attempt(Result<Box<dyn Transport>>),
    Frame(Option<Result<String>>),
    KeepAlive,
    RetryDue,
}

/// Owns the connection and drives it from a single task.
///
/// Built by [`crate::RealtimeManager`], which spawns [`ConnectionKernel::run`]
/// and hands out [`crate::EventClient`] handles.
pub(crate) struct ConnectionKernel {
    connector: Arc<dyn Connector>,
    router: MessageRouter,

    /// Address used for the next attempt (explicit or default).
    url: String,
    topics: Vec<String>,
    keep_alive: Duration,
    connect_timeout: Duration,

    retry: RetryPolicy,
    /// Mirror of the retry counter readable from client handles.
    attempts: Arc<AtomicU32>,

    phase: Phase,
    /// Id of the current connection attempt, for log correlation.
    session: Option<Uuid>,

    commands: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
    state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionKernel {
    pub(crate) fn new(
        config: &Config,
        connector: Arc<dyn Connector>,
        router: MessageRouter,
        commands: mpsc::UnboundedReceiver<Command>,
        cancel: CancellationToken,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        Self {
            connector,
            router,
            url: config.url.clone(),
            topics: config.topics.clone(),
            keep_alive: config.keep_alive(),
            connect_timeout: config.connect_timeout(),
            retry: config.retry_policy(),
            attempts: Arc::new(AtomicU32::new(0)),
            phase: Phase::Idle,
            session: None,
            commands,
            cancel,
            state_tx,
        }
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Shared view of the reconnection counter.
    pub fn attempts(&self) -> Arc<AtomicU32> {
        self.attempts.clone()
    }

    /// Runs until the cancellation token fires or every command sender is
    /// dropped. Closes the live connection, if any, on the way out.
    pub async fn run(mut self) {
        debug!("Connection kernel started");
        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    info!("Shutdown signal received, stopping connection kernel");
                    break;
                }

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("All client handles dropped, stopping connection kernel");
                        break;
                    }
                },

                wake = self.phase.wake() => self.handle_wake(wake).await,
            }
        }

        self.close_link().await;
        self.update_state(ConnectionState::Disconnected("Shut down".into()));
        info!("Connection kernel shutdown completed");
    }

    async fn handle_command(&mut self, command: Command) {
        trace!(phase = self.phase.name(), ?command, "Command received");
        match command {
            Command::Connect { url } => self.connect(url),
            Command::Disconnect => self.disconnect().await,
            Command::Subscribe(topic) => self.send_control(ControlFrame::subscribe(topic)).await,
            Command::Unsubscribe(topic) => {
                self.send_control(ControlFrame::unsubscribe(topic)).await
            }
            Command::Send(text) => {
                if let Err(e) = self.transmit(text).await {
                    warn!("Outbound message discarded: {}", e);
                }
            }
        }
    }

    async fn handle_wake(&mut self, wake: Wake) {
        match wake {
            Wake::Attempt(Ok(link)) => self.on_established(link).await,
            Wake::Attempt(Err(e)) => {
                warn!(session = ?self.session, "Connection attempt failed: {}", e);
                self.connection_lost(e.to_string());
            }
            Wake::Frame(Some(Ok(text))) => {
                trace!("Inbound frame: {} bytes", text.len());
                self.router.route(&text);
            }
            Wake::Frame(Some(Err(e))) => {
                warn!(session = ?self.session, "Connection error: {}", e);
                self.connection_lost(e.to_string());
            }
            Wake::Frame(None) => {
                warn!(session = ?self.session, "Connection closed by server");
                self.connection_lost("Connection closed by server".into());
            }
            Wake::KeepAlive => {
                trace!("Sending keep-alive ping");
                self.send_control(ControlFrame::Ping).await;
            }
            Wake::RetryDue => {
                info!(
                    "Reconnection attempt {}/{}",
                    self.retry.attempt(),
                    self.retry.max_attempts()
                );
                self.start_attempt();
            }
        }
    }

    /// Explicit connect from a client handle.
    fn connect(&mut self, url: Option<String>) {
        match self.phase {
            Phase::Connected { .. } => {
                debug!("Already connected, connect ignored");
                return;
            }
            Phase::Connecting(_) => {
                debug!("Connection attempt in flight, connect ignored");
                return;
            }
            Phase::Waiting(_) => debug!("Retry timer pending, connecting now"),
            Phase::Idle => {}
        }

        if let Some(url) = url {
            self.url = url;
        }
        // An explicit request starts a fresh retry budget.
        self.reset_retry();
        self.start_attempt();
    }

    fn start_attempt(&mut self) {
        let session = Uuid::new_v4();
        let connector = self.connector.clone();
        let url = self.url.clone();
        let timeout = self.connect_timeout;

        info!(%session, url = %self.url, "Connecting");
        let span = info_span!("connect", %session);
        let attempt = async move {
            match tokio::time::timeout(timeout, connector.connect(&url)).await {
                Ok(result) => result,
                Err(_) => Err(RealtimeError::ConnectTimeout(timeout)),
            }
        }
        .instrument(span);

        self.session = Some(session);
        self.phase = Phase::Connecting(Box::pin(attempt));
        self.update_state(ConnectionState::Connecting);
    }

    async fn on_established(&mut self, link: Box<dyn Transport>) {
        info!(session = ?self.session, url = %self.url, "Connection established");
        self.reset_retry();
        self.phase = Phase::Connected {
            link,
            keep_alive: KeepAlive::new(self.keep_alive),
        };
        self.update_state(ConnectionState::Connected);

        let topics = self.topics.clone();
        for topic in topics {
            debug!(topic = %topic, "Subscribing");
            self.send_control(ControlFrame::subscribe(topic)).await;
        }
    }

    /// Drops whatever the current phase holds and applies the retry policy.
    fn connection_lost(&mut self, reason: String) {
        self.phase = Phase::Idle;
        self.update_state(ConnectionState::Disconnected(reason.clone()));

        match self.retry.next_delay() {
            Ok(delay) => {
                let attempt = self.retry.attempt();
                self.attempts.store(attempt, Ordering::Release);
                info!(
                    "Reconnecting in {:.2} seconds (attempt {}/{})",
                    delay.as_secs_f64(),
                    attempt,
                    self.retry.max_attempts()
                );
                self.phase = Phase::Waiting(Box::pin(tokio::time::sleep(delay)));
                self.update_state(ConnectionState::Reconnecting {
                    attempt,
                    delay_secs: delay.as_secs_f64(),
                });
            }
            Err(e) => {
                let e = RealtimeError::from(e);
                error!("Giving up on {}: {}", self.url, e);
                self.session = None;
            }
        }
    }

    async fn disconnect(&mut self) {
        match self.phase {
            Phase::Idle => {
                debug!("Not connected, disconnect ignored");
                return;
            }
            Phase::Connecting(_) => debug!("Abandoning connection attempt"),
            Phase::Waiting(_) => debug!("Cancelling pending reconnection"),
            Phase::Connected { .. } => {}
        }

        self.close_link().await;
        self.phase = Phase::Idle;
        self.session = None;
        self.reset_retry();
        self.update_state(ConnectionState::Disconnected("Disconnected by client".into()));
        info!("Disconnected");
    }

    /// Gracefully closes the transport if the kernel is connected.
    async fn close_link(&mut self) {
        if let Phase::Connected { mut link, .. } = std::mem::replace(&mut self.phase, Phase::Idle)
        {
            if let Err(e) = link.close().await {
                debug!("Error while closing connection: {}", e);
            }
        }
    }

    async fn send_control(&mut self, frame: ControlFrame) {
        let text = match frame.to_text() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode control frame: {}", e);
                return;
            }
        };

        match self.transmit(text).await {
            Ok(()) => {}
            Err(RealtimeError::NotConnected) => {
                debug!(?frame, "Not connected, control frame dropped");
            }
            Err(e) => debug!(?frame, "Control frame not sent: {}", e),
        }
    }

    /// Writes one frame on the live connection.
    ///
    /// A write failure ends the connection and hands it to the retry policy.
    async fn transmit(&mut self, text: String) -> Result<()> {
        let Phase::Connected { link, .. } = &mut self.phase else {
            return Err(RealtimeError::NotConnected);
        };

        match link.send_text(text).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(session = ?self.session, "Write failed: {}", e);
                let reason = format!("Write failed: {e}");
                self.connection_lost(reason);
                Err(e)
            }
        }
    }

    fn reset_retry(&mut self) {
        self.retry.reset();
        self.attempts.store(0, Ordering::Release);
    }

    /// Publishes `state` if it differs from the current one.
    fn update_state(&self, state: ConnectionState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state.clone();
            true
        });

        if changed {
            info!("Connection state changed to: {}", state);
        }
    }
}
