//! Event bus for broadcasting coordinator transitions.

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{DropReason, EventListener, FailoverEvent, ListenerId};

/// Internal listener state.
struct Listener {
    sender: Sender<FailoverEvent>,
}

impl Listener {
    /// Try to send an event. Returns false if the buffer is full or the receiver is gone.
    fn try_send(&self, event: FailoverEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Fans coordinator events out to listeners.
pub struct EventBus {
    listeners: RwLock<HashMap<ListenerId, Listener>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener with room for `buffer_size` undelivered events.
    pub fn listen(&self, buffer_size: usize) -> EventListener {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(buffer_size.max(1));

        self.listeners.write().insert(id, Listener { sender });

        EventListener { id, receiver }
    }

    /// Remove a listener.
    pub fn unlisten(&self, id: ListenerId) {
        let mut listeners = self.listeners.write();
        if let Some(listener) = listeners.remove(&id) {
            // Best effort
            let _ = listener.sender.try_send(FailoverEvent::Dropped {
                reason: DropReason::Unlistened,
            });
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Send an event to every listener. Never blocks; drops listeners that
    /// cannot keep up.
    pub fn broadcast(&self, event: FailoverEvent) {
        let mut to_remove = Vec::new();

        {
            let listeners = self.listeners.read();
            for (id, listener) in listeners.iter() {
                if !listener.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut listeners = self.listeners.write();
            for id in to_remove {
                if let Some(listener) = listeners.remove(&id) {
                    tracing::debug!(listener = id.0, "dropping slow event listener");
                    // Usually fails since the buffer is full
                    let _ = listener.sender.try_send(FailoverEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }

    /// Send an event to one listener. Returns false if it is gone or was
    /// dropped for being full.
    pub fn send_to(&self, id: ListenerId, event: FailoverEvent) -> bool {
        let delivered = match self.listeners.read().get(&id) {
            Some(listener) => listener.try_send(event),
            None => return false,
        };
        if !delivered {
            self.listeners.write().remove(&id);
        }
        delivered
    }

    /// Remove every listener; their receivers disconnect once drained.
    pub fn close(&self) {
        self.listeners.write().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
