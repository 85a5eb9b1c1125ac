//! Traits implemented by the data-store client that owns the wire protocol.

use crate::error::{FeedError, Result};
use crate::types::{ChangeEvent, Endpoint};
use crossbeam_channel::Receiver;
use std::sync::Arc;

/// One message of a change feed: a change, or the error that ended the feed.
pub type FeedItem = std::result::Result<ChangeEvent, FeedError>;

/// Releases a feed on the transport side. Runs its closure at most once.
pub struct FeedGuard(Option<Box<dyn FnOnce() + Send>>);

impl FeedGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(release)))
    }

    /// Release the feed now. Later calls do nothing.
    pub fn release(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }

    pub fn is_released(&self) -> bool {
        self.0.is_none()
    }
}

impl Drop for FeedGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// An open change feed as handed out by a transport.
pub struct Feed {
    /// Changes for the whole dataset, in server order.
    pub receiver: Receiver<FeedItem>,
    pub guard: FeedGuard,
}

impl Feed {
    pub fn new(receiver: Receiver<FeedItem>, guard: FeedGuard) -> Self {
        Self { receiver, guard }
    }
}

/// A live link to one server+dataset.
///
/// Implementations deliver on whatever threads they like; every method must
/// be callable concurrently.
pub trait Transport: Send + Sync {
    /// Current connectivity. Must not block.
    fn is_connected(&self) -> bool;

    /// Register for connectivity transitions. Each call returns a fresh
    /// receiver that gets one message per transition from then on.
    fn watch_status(&self) -> Receiver<bool>;

    /// Start delivering the dataset's change feed.
    fn open_feed(&self) -> std::result::Result<Feed, FeedError>;

    /// Tear the link down. Called once at shutdown.
    fn close(&self) {}
}

/// Constructs and initializes transports for endpoints.
pub trait Connector: Send + Sync {
    fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Transport>>;
}
