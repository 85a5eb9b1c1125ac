//! Subscribe/unsubscribe state for a single connection.

use crate::connection::ServerConnection;
use crate::error::Result;
use crate::types::Endpoint;
use parking_lot::Mutex;
use std::sync::Arc;

use super::types::{ChangeSubscriber, SubscriptionHandle};

/// Owns the subscription handle of one connection.
///
/// The handle mutex is the critical section for the subscribe/unsubscribe
/// pair; it is per controller, so controllers never contend with each other.
pub struct SubscriptionController {
    connection: Arc<ServerConnection>,
    subscriber: Arc<dyn ChangeSubscriber>,
    handle: Mutex<Option<SubscriptionHandle>>,
}

impl SubscriptionController {
    pub fn new(connection: Arc<ServerConnection>, subscriber: Arc<dyn ChangeSubscriber>) -> Self {
        Self {
            connection,
            subscriber,
            handle: Mutex::new(None),
        }
    }

    pub fn connection(&self) -> &Arc<ServerConnection> {
        &self.connection
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.connection.endpoint()
    }

    /// Start the subscription unless one is already held.
    ///
    /// Returns `Ok(true)` if this call established it, `Ok(false)` if it was
    /// already subscribed. On error the controller stays unsubscribed.
    pub fn subscribe(&self) -> Result<bool> {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return Ok(false);
        }

        *handle = Some(self.subscriber.subscribe(&self.connection)?);
        tracing::debug!(server = %self.endpoint(), "subscription handle stored");
        Ok(true)
    }

    /// Release the subscription if one is held.
    ///
    /// Returns true if a handle was released.
    pub fn unsubscribe(&self) -> bool {
        let mut handle = self.handle.lock();
        match handle.take() {
            Some(active) => {
                // Released under the lock so a racing subscribe waits for it.
                active.cancel();
                tracing::debug!(server = %self.endpoint(), "subscription handle released");
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.handle.lock().is_some()
    }
}

impl std::fmt::Debug for SubscriptionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionController")
            .field("server", self.endpoint())
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}
