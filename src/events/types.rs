//! Event types for coordinator listeners.

use crate::types::Endpoint;
use serde::{Deserialize, Serialize};

/// A coordinator state transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailoverEvent {
    // --- Subscription Events ---
    /// Change delivery started from this server.
    Subscribed { server: Endpoint },

    /// Change delivery from this server stopped.
    Unsubscribed { server: Endpoint },

    /// Subscribing failed; the server stays unsubscribed until the next pass.
    SubscribeFailed { server: Endpoint, reason: String },

    /// Releasing the subscription panicked; the handle is gone regardless.
    UnsubscribeFailed { server: Endpoint, reason: String },

    /// No server in the preference list is connected. Notifications are suspended.
    NoServerAvailable,

    // --- Connectivity Events ---
    /// A connection went up or down.
    ConnectivityChanged { server: Endpoint, connected: bool },

    // --- Lifecycle Events ---
    /// The coordinator shut down. No more events follow.
    Stopped,

    /// This listener was dropped.
    Dropped { reason: DropReason },
}

/// Why a listener was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly removed.
    Unlistened,
}

/// Unique identifier for a listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Receiving end of a listener.
///
/// Blocking iteration goes through `receiver` directly; it disconnects once
/// the coordinator has stopped and the buffer is drained.
pub struct EventListener {
    pub id: ListenerId,
    pub receiver: crossbeam_channel::Receiver<FailoverEvent>,
}

impl EventListener {
    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<FailoverEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered, without blocking.
    pub fn drain(&self) -> Vec<FailoverEvent> {
        self.receiver.try_iter().collect()
    }
}
