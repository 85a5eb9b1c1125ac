//! Stock subscriber that forwards a change stream to a handler.

use crate::connection::ServerConnection;
use crate::error::{FeedError, Result};
use crate::types::{ChangeEvent, Endpoint};
use crossbeam_channel::bounded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use super::types::{ChangeSubscriber, SubscriptionHandle};

/// Application logic for delivered changes.
pub trait ChangeHandler: Send + Sync + 'static {
    fn on_change(&self, server: &Endpoint, change: ChangeEvent);

    /// The stream ended with an error. No re-evaluation follows from this.
    fn on_stream_error(&self, server: &Endpoint, error: &FeedError) {
        let _ = (server, error);
    }
}

impl<F> ChangeHandler for F
where
    F: Fn(&Endpoint, ChangeEvent) + Send + Sync + 'static,
{
    fn on_change(&self, server: &Endpoint, change: ChangeEvent) {
        self(server, change)
    }
}

/// Opens the connection's change stream and dispatches it on a dedicated thread.
pub struct ForwardingSubscriber<H> {
    handler: Arc<H>,
}

impl<H: ChangeHandler> ForwardingSubscriber<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }
}

impl<H: ChangeHandler> ChangeSubscriber for ForwardingSubscriber<H> {
    fn subscribe(&self, connection: &ServerConnection) -> Result<SubscriptionHandle> {
        let endpoint = connection.endpoint().clone();
        let mut stream = connection
            .open_change_stream()
            .map_err(|e| e.into_subscribe(&endpoint))?;

        // Cleared before the stop signal so nothing is dispatched after cancel.
        let active = Arc::new(AtomicBool::new(true));
        // Never sent on; dropping the sender wakes the forwarder.
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let handler = Arc::clone(&self.handler);
        let forwarding = Arc::clone(&active);
        thread::Builder::new()
            .name(format!("feed-{}", endpoint))
            .spawn(move || {
                while let Some(item) = stream.recv_until(&stop_rx) {
                    if !forwarding.load(Ordering::SeqCst) {
                        break;
                    }
                    match item {
                        Ok(change) => handler.on_change(&endpoint, change),
                        Err(e) => {
                            tracing::warn!(server = %endpoint, error = %e, "change stream failed");
                            handler.on_stream_error(&endpoint, &e);
                        }
                    }
                }
                tracing::debug!(server = %endpoint, "change forwarder stopped");
            })?;

        Ok(SubscriptionHandle::new(move || {
            active.store(false, Ordering::SeqCst);
            drop(stop_tx);
        }))
    }
}
