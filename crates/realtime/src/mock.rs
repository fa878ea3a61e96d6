//! In-memory connector for kernel and client tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    error::{RealtimeError, Result},
    transport::{Connector, Transport},
};

/// Outcome of one scripted connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Script {
    Accept,
    Refuse,
    /// Never completes; only the connect timeout ends it.
    Hang,
}

enum ServerEvent {
    Frame(String),
    Fail(String),
    Close,
}

#[derive(Default)]
struct Shared {
    attempts: AtomicUsize,
    open_links: AtomicUsize,
    fail_writes: AtomicBool,
    urls: Mutex<Vec<String>>,
    sent: Mutex<Vec<String>>,
    servers: Mutex<Vec<mpsc::UnboundedSender<ServerEvent>>>,
}

/// Scripted connector. Once the script runs out every attempt uses `fallback`.
pub(crate) struct MockConnector {
    script: Mutex<VecDeque<Script>>,
    fallback: Script,
    shared: Arc<Shared>,
}

impl MockConnector {
    pub fn new(script: impl IntoIterator<Item = Script>, fallback: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            shared: Arc::new(Shared::default()),
        })
    }

    pub fn accepting() -> Arc<Self> {
        Self::new([], Script::Accept)
    }

    pub fn refusing() -> Arc<Self> {
        Self::new([], Script::Refuse)
    }

    pub fn attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    pub fn open_links(&self) -> usize {
        self.shared.open_links.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.shared.urls.lock().unwrap().clone()
    }

    /// Every frame written by the client, across connections.
    pub fn sent(&self) -> Vec<String> {
        self.shared.sent.lock().unwrap().clone()
    }

    pub fn sent_matching(&self, needle: &str) -> usize {
        self.sent().iter().filter(|f| f.contains(needle)).count()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Pushes a frame on the most recent connection.
    pub fn push(&self, frame: &str) {
        self.server_event(ServerEvent::Frame(frame.to_string()));
    }

    /// Closes the most recent connection from the server side.
    pub fn close(&self) {
        self.server_event(ServerEvent::Close);
    }

    /// Fails the most recent connection with a transport error.
    pub fn fail(&self, reason: &str) {
        self.server_event(ServerEvent::Fail(reason.to_string()));
    }

    fn server_event(&self, event: ServerEvent) {
        if let Some(server) = self.shared.servers.lock().unwrap().last() {
            let _ = server.send(event);
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        self.shared.urls.lock().unwrap().push(url.to_string());

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);

        match next {
            Script::Accept => {
                let (tx, rx) = mpsc::unbounded_channel();
                self.shared.servers.lock().unwrap().push(tx);
                self.shared.open_links.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(MockTransport {
                    inbound: rx,
                    shared: self.shared.clone(),
                }))
            }
            Script::Refuse => Err(RealtimeError::Transport("connection refused".into())),
            Script::Hang => std::future::pending().await,
        }
    }
}

struct MockTransport {
    inbound: mpsc::UnboundedReceiver<ServerEvent>,
    shared: Arc<Shared>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        if self.shared.fail_writes.load(Ordering::SeqCst) {
            return Err(RealtimeError::Transport("broken pipe".into()));
        }
        self.shared.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<Result<String>> {
        match self.inbound.recv().await? {
            ServerEvent::Frame(text) => Some(Ok(text)),
            ServerEvent::Fail(reason) => Some(Err(RealtimeError::Transport(reason))),
            ServerEvent::Close => None,
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.inbound.close();
        Ok(())
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.shared.open_links.fetch_sub(1, Ordering::SeqCst);
    }
}
