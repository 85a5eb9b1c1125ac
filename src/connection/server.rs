//! One server's change-feed endpoint.

use crate::error::{FeedError, Result};
use crate::types::{ConnectionStatus, Endpoint};
use crossbeam_channel::{select, Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::transport::{Connector, FeedGuard, FeedItem, Transport};

/// A connection to one server+dataset.
///
/// Identity is fixed at construction. Connectivity is read straight from the
/// transport, so `connected()` is always current.
pub struct ServerConnection {
    endpoint: Endpoint,
    transport: Arc<dyn Transport>,
    /// Changes whose id starts with this are store-internal and never surfaced.
    reserved_prefix: String,
    closed: AtomicBool,
}

impl ServerConnection {
    /// Wrap an already-initialized transport.
    pub fn new(
        endpoint: Endpoint,
        transport: Arc<dyn Transport>,
        reserved_prefix: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            transport,
            reserved_prefix: reserved_prefix.into(),
            closed: AtomicBool::new(false),
        }
    }

    /// Connect to `endpoint` through `connector`.
    pub fn open(
        endpoint: Endpoint,
        connector: &dyn Connector,
        reserved_prefix: impl Into<String>,
    ) -> Result<Self> {
        let transport = connector.connect(&endpoint)?;
        tracing::debug!(server = %endpoint, connected = transport.is_connected(), "connection opened");
        Ok(Self::new(endpoint, transport, reserved_prefix))
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Current connectivity. A closed connection is never connected.
    pub fn connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.transport.is_connected()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connected().into()
    }

    /// Subscribe to connectivity transitions from now on.
    ///
    /// Every call registers a new, independent stream.
    pub fn status_changes(&self) -> StatusChanges {
        StatusChanges {
            receiver: self.transport.watch_status(),
        }
    }

    /// Open the dataset's change stream, minus store-internal changes.
    pub fn open_change_stream(&self) -> std::result::Result<ChangeStream, FeedError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FeedError::Closed);
        }
        let feed = self.transport.open_feed()?;
        Ok(ChangeStream {
            receiver: feed.receiver,
            guard: feed.guard,
            reserved_prefix: self.reserved_prefix.clone(),
            finished: false,
        })
    }

    /// Close the underlying transport. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.transport.close();
            tracing::debug!(server = %self.endpoint, "connection closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ServerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConnection")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.connected())
            .finish()
    }
}

/// Connectivity transitions of one connection, in emission order.
pub struct StatusChanges {
    receiver: Receiver<bool>,
}

impl StatusChanges {
    pub(crate) fn into_receiver(self) -> Receiver<bool> {
        self.receiver
    }

    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<ConnectionStatus, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout).map(ConnectionStatus::from)
    }
}

impl Iterator for StatusChanges {
    type Item = ConnectionStatus;

    fn next(&mut self) -> Option<ConnectionStatus> {
        self.receiver.recv().ok().map(ConnectionStatus::from)
    }
}

/// Change notifications for a whole dataset.
///
/// Ends after the first error, or when the transport drops the feed.
/// Dropping the stream releases the feed.
pub struct ChangeStream {
    receiver: Receiver<FeedItem>,
    guard: FeedGuard,
    reserved_prefix: String,
    finished: bool,
}

impl ChangeStream {
    /// Blocking receive that also gives up when `stop` fires or disconnects.
    pub fn recv_until(&mut self, stop: &Receiver<()>) -> Option<FeedItem> {
        loop {
            if self.finished {
                return None;
            }
            let received = select! {
                recv(stop) -> _ => return None,
                recv(self.receiver) -> msg => msg.ok(),
            };
            if let Some(item) = self.admit(received) {
                return Some(item);
            }
        }
    }

    /// Receive with timeout. `Disconnected` means the stream has ended.
    pub fn recv_timeout(&mut self, timeout: Duration) -> std::result::Result<FeedItem, RecvTimeoutError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.finished {
                return Err(RecvTimeoutError::Disconnected);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            let received = match self.receiver.recv_timeout(remaining) {
                Ok(item) => Some(item),
                Err(RecvTimeoutError::Disconnected) => None,
                Err(RecvTimeoutError::Timeout) => return Err(RecvTimeoutError::Timeout),
            };
            if let Some(item) = self.admit(received) {
                return Ok(item);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Filter one raw message. Returns None for skipped internal changes and
    /// for end of feed.
    fn admit(&mut self, received: Option<FeedItem>) -> Option<FeedItem> {
        match received {
            Some(Ok(event)) if event.is_internal(&self.reserved_prefix) => None,
            Some(Ok(event)) => Some(Ok(event)),
            Some(Err(e)) => {
                self.finish();
                Some(Err(e))
            }
            None => {
                self.finish();
                None
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.guard.release();
    }
}

impl Iterator for ChangeStream {
    type Item = FeedItem;

    fn next(&mut self) -> Option<FeedItem> {
        loop {
            if self.finished {
                return None;
            }
            let received = self.receiver.recv().ok();
            if let Some(item) = self.admit(received) {
                return Some(item);
            }
        }
    }
}
