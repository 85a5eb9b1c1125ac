//! Subscription handle and the injected subscribe capability.

use crate::connection::ServerConnection;
use crate::error::Result;

/// Cancellation handle for one live subscription.
///
/// The release closure runs exactly once: on `cancel()`, or on drop.
pub struct SubscriptionHandle {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Stop delivery now.
    pub fn cancel(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("released", &self.release.is_none())
            .finish()
    }
}

/// Starts change delivery for a connection.
///
/// Policy for the delivered changes lives in the implementation, not in the
/// controller that calls it.
pub trait ChangeSubscriber: Send + Sync {
    fn subscribe(&self, connection: &ServerConnection) -> Result<SubscriptionHandle>;
}

impl<F> ChangeSubscriber for F
where
    F: Fn(&ServerConnection) -> Result<SubscriptionHandle> + Send + Sync,
{
    fn subscribe(&self, connection: &ServerConnection) -> Result<SubscriptionHandle> {
        self(connection)
    }
}
