//! Listener registry: message type -> ordered callbacks.
//!
//! Each registration gets its own id, so cancelling a [`ListenerHandle`]
//! removes exactly one entry even when the same closure (or a clone of the
//! same `Arc`) was registered several times.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};

use serde_json::Value;
use tracing::debug;

/// Error type a listener may return.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a single listener invocation.
pub type ListenerResult = Result<(), ListenerError>;

/// A registered callback receiving the message payload.
pub type Listener = Arc<dyn Fn(&Value) -> ListenerResult + Send + Sync>;

/// Token identifying one registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    id: u64,
    message_type: String,
}

impl ListenerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }
}

#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<String, Vec<(u64, Listener)>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `listener` to the sequence for `message_type`.
    pub fn register(&self, message_type: &str, listener: Listener) -> ListenerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.write()
            .entry(message_type.to_string())
            .or_default()
            .push((id, listener));

        debug!(message_type, id, "Listener registered");
        ListenerHandle {
            id,
            message_type: message_type.to_string(),
        }
    }

    /// Removes the registration behind `handle`.
    ///
    /// Returns false if it was already cancelled.
    pub fn cancel(&self, handle: &ListenerHandle) -> bool {
        let mut listeners = self.write();
        let Some(entries) = listeners.get_mut(&handle.message_type) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|(id, _)| *id != handle.id);
        let removed = entries.len() != before;

        if entries.is_empty() {
            listeners.remove(&handle.message_type);
        }
        if removed {
            debug!(message_type = %handle.message_type, id = handle.id, "Listener cancelled");
        }
        removed
    }

    /// Snapshot of the listeners for `message_type`, in registration order.
    ///
    /// Callers invoke the snapshot without holding the lock, so listeners can
    /// register or cancel from inside a callback.
    pub fn listeners_for(&self, message_type: &str) -> Vec<Listener> {
        self.read()
            .get(message_type)
            .map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default()
    }

    pub fn count(&self, message_type: &str) -> usize {
        self.read().get(message_type).map_or(0, Vec::len)
    }

    pub fn total(&self) -> usize {
        self.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Listeners never run under the lock, a poisoned guard still holds
    // consistent data.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<(u64, Listener)>>> {
        self.listeners.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<(u64, Listener)>>> {
        self.listeners.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<String, usize> = self
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.len()))
            .collect();
        f.debug_struct("ListenerRegistry")
            .field("listeners", &counts)
            .finish()
    }
}
