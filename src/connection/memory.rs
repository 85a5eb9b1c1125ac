//! In-process transport, for tests and for embedding without a network.

use crate::error::{FailoverError, FeedError, Result};
use crate::types::{ChangeEvent, Endpoint};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use super::transport::{Connector, Feed, FeedGuard, FeedItem, Transport};

#[derive(Default)]
struct MemoryState {
    connected: bool,
    closed: bool,
    watchers: Vec<Sender<bool>>,
    feeds: HashMap<u64, Sender<FeedItem>>,
    next_feed_id: u64,
    feeds_opened: u64,
    /// When set, `open_feed` fails with this reason.
    refuse_feeds: Option<String>,
}

/// A transport whose connectivity and changes are driven by the caller.
pub struct MemoryTransport {
    endpoint: Endpoint,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new(endpoint: Endpoint, connected: bool) -> Arc<Self> {
        Arc::new(Self {
            endpoint,
            state: Arc::new(Mutex::new(MemoryState {
                connected,
                ..Default::default()
            })),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Change connectivity. Watchers are only notified on an actual transition.
    pub fn set_connected(&self, connected: bool) {
        let mut state = self.state.lock();
        if state.connected == connected {
            return;
        }
        state.connected = connected;
        state.watchers.retain(|w| w.send(connected).is_ok());
    }

    /// Deliver a change to every open feed. Returns how many feeds got it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let state = self.state.lock();
        state
            .feeds
            .values()
            .filter(|feed| feed.send(Ok(event.clone())).is_ok())
            .count()
    }

    /// Terminate every open feed with a transport error.
    pub fn fail_feeds(&self, reason: &str) {
        let mut state = self.state.lock();
        for (_, feed) in state.feeds.drain() {
            let _ = feed.send(Err(FeedError::Transport(reason.to_string())));
        }
    }

    /// Make subsequent `open_feed` calls fail (None restores normal behavior).
    pub fn refuse_feeds(&self, reason: Option<&str>) {
        self.state.lock().refuse_feeds = reason.map(str::to_string);
    }

    /// Feeds currently open.
    pub fn open_feed_count(&self) -> usize {
        self.state.lock().feeds.len()
    }

    /// Feeds opened over the transport's lifetime.
    pub fn feeds_opened(&self) -> u64 {
        self.state.lock().feeds_opened
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn release_feed(state: &Weak<Mutex<MemoryState>>, id: u64) {
        if let Some(state) = state.upgrade() {
            state.lock().feeds.remove(&id);
        }
    }
}

impl Transport for MemoryTransport {
    fn is_connected(&self) -> bool {
        let state = self.state.lock();
        state.connected && !state.closed
    }

    fn watch_status(&self) -> Receiver<bool> {
        let (tx, rx) = unbounded();
        let mut state = self.state.lock();
        if !state.closed {
            state.watchers.push(tx);
        }
        rx
    }

    fn open_feed(&self) -> std::result::Result<Feed, FeedError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(FeedError::Closed);
        }
        if let Some(reason) = &state.refuse_feeds {
            return Err(FeedError::Transport(reason.clone()));
        }
        if !state.connected {
            return Err(FeedError::Transport("not connected".to_string()));
        }

        let id = state.next_feed_id;
        state.next_feed_id += 1;
        state.feeds_opened += 1;

        let (tx, rx) = unbounded();
        state.feeds.insert(id, tx);

        let weak = Arc::downgrade(&self.state);
        Ok(Feed::new(rx, FeedGuard::new(move || Self::release_feed(&weak, id))))
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        // Dropping the senders ends every watcher and feed.
        state.watchers.clear();
        state.feeds.clear();
    }
}

/// Hands out [`MemoryTransport`]s by endpoint.
#[derive(Default)]
pub struct MemoryConnector {
    transports: Mutex<HashMap<Endpoint, Arc<MemoryTransport>>>,
    refused: Mutex<HashSet<Endpoint>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transport for `endpoint`, replacing any previous one.
    pub fn add(&self, endpoint: Endpoint, connected: bool) -> Arc<MemoryTransport> {
        let transport = MemoryTransport::new(endpoint.clone(), connected);
        self.transports
            .lock()
            .insert(endpoint, Arc::clone(&transport));
        transport
    }

    pub fn transport(&self, endpoint: &Endpoint) -> Option<Arc<MemoryTransport>> {
        self.transports.lock().get(endpoint).cloned()
    }

    /// Make `connect` fail for `endpoint`.
    pub fn refuse(&self, endpoint: Endpoint) {
        self.refused.lock().insert(endpoint);
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Transport>> {
        if self.refused.lock().contains(endpoint) {
            return Err(FailoverError::Connect {
                server: endpoint.clone(),
                reason: "connection refused".to_string(),
            });
        }

        let transport: Arc<dyn Transport> = self
            .transports
            .lock()
            .entry(endpoint.clone())
            .or_insert_with(|| MemoryTransport::new(endpoint.clone(), false))
            .clone();
        Ok(transport)
    }
}
