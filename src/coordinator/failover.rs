//! The fail-over coordinator: ranked connections, one live subscription.

use crate::config::FailoverConfig;
use crate::connection::{Connector, ServerConnection};
use crate::connectivity::{ConnectivityAggregator, ConnectivityStream};
use crate::error::{FailoverError, Result};
use crate::events::{EventListener, FailoverEvent};
use crate::subscription::{ChangeSubscriber, SubscriptionController};
use crate::types::Endpoint;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::pass::{PassReport, PassTrigger, Shared};

/// Keeps exactly one subscription alive on the most preferred connected server.
///
/// Passes run once at startup, once per connectivity transition on the
/// worker thread, and on demand through [`reevaluate`](Self::reevaluate).
/// All of them are serialized.
pub struct FailoverCoordinator {
    config: FailoverConfig,
    shared: Arc<Shared>,
    connectivity: Mutex<Option<ConnectivityStream>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutting_down: AtomicBool,
}

impl FailoverCoordinator {
    /// Connect to every server in the preference list and start coordinating.
    ///
    /// Fails on a malformed preference list or a server that cannot be
    /// connected at all; being disconnected is not a failure.
    pub fn initialize(
        config: FailoverConfig,
        connector: &dyn Connector,
        subscriber: Arc<dyn ChangeSubscriber>,
    ) -> Result<Self> {
        config.validate()?;

        let mut connections: Vec<Arc<ServerConnection>> = Vec::with_capacity(config.servers.len());
        for endpoint in &config.servers {
            match ServerConnection::open(endpoint.clone(), connector, config.reserved_prefix.clone()) {
                Ok(conn) => connections.push(Arc::new(conn)),
                Err(e) => {
                    for conn in &connections {
                        conn.close();
                    }
                    return Err(e);
                }
            }
        }

        let stream = match ConnectivityAggregator::merge(&connections) {
            Ok(stream) => stream,
            Err(e) => {
                for conn in &connections {
                    conn.close();
                }
                return Err(e);
            }
        };

        let controllers = connections
            .into_iter()
            .map(|conn| SubscriptionController::new(conn, Arc::clone(&subscriber)))
            .collect();
        let shared = Arc::new(Shared::new(controllers, config.handover));
        let receiver = stream.receiver();

        let coordinator = Self {
            config,
            shared,
            connectivity: Mutex::new(Some(stream)),
            worker: Mutex::new(None),
            shutting_down: AtomicBool::new(false),
        };

        // Watchers are already registered, so transitions racing with this
        // pass are queued and trigger another one.
        coordinator.shared.run_pass(PassTrigger::Startup);

        let shared = Arc::clone(&coordinator.shared);
        let worker = thread::Builder::new()
            .name("failover-coordinator".to_string())
            .spawn(move || {
                for changed in receiver.iter() {
                    shared.bus.broadcast(FailoverEvent::ConnectivityChanged {
                        server: changed.endpoint().clone(),
                        connected: changed.connected(),
                    });
                    if shared.run_pass(PassTrigger::Connectivity).is_none() {
                        break;
                    }
                }
                tracing::debug!("failover worker stopped");
            })?;
        *coordinator.worker.lock() = Some(worker);

        tracing::info!(
            servers = coordinator.shared.controllers.len(),
            handover = ?coordinator.config.handover,
            "failover coordinator started"
        );
        Ok(coordinator)
    }

    pub fn config(&self) -> &FailoverConfig {
        &self.config
    }

    /// Run a pass now, serialized with the worker's passes.
    pub fn reevaluate(&self) -> Result<PassReport> {
        self.shared
            .run_pass(PassTrigger::Manual)
            .ok_or(FailoverError::ShutDown)
    }

    /// Register a callback for entry into the no-server state.
    ///
    /// Runs on whichever thread ran the pass, after the pass lock is released.
    /// Registered while no server is available (for instance right after a
    /// startup with everything down), it runs once immediately.
    pub fn on_no_server(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.shared.add_no_server_hook(Arc::new(callback));
    }

    /// Listen for state transitions with the configured buffer size.
    ///
    /// A listener created while no server is available receives
    /// `NoServerAvailable` first.
    pub fn listen(&self) -> EventListener {
        self.shared.listen(self.config.event_buffer_size)
    }

    pub fn listen_with_buffer(&self, buffer_size: usize) -> EventListener {
        self.shared.listen(buffer_size)
    }

    /// Connections in preference order.
    pub fn connections(&self) -> Vec<Arc<ServerConnection>> {
        self.shared
            .controllers
            .iter()
            .map(|c| Arc::clone(c.connection()))
            .collect()
    }

    pub fn connection(&self, endpoint: &Endpoint) -> Option<Arc<ServerConnection>> {
        self.shared
            .controllers
            .iter()
            .find(|c| c.endpoint() == endpoint)
            .map(|c| Arc::clone(c.connection()))
    }

    /// The most preferred server currently holding a subscription.
    pub fn active_server(&self) -> Option<Endpoint> {
        self.shared
            .controllers
            .iter()
            .find(|c| c.is_subscribed())
            .map(|c| c.endpoint().clone())
    }

    /// Every server holding a subscription, in preference order.
    ///
    /// More than one only transiently, during a hand-over.
    pub fn subscribed_servers(&self) -> Vec<Endpoint> {
        self.shared
            .controllers
            .iter()
            .filter(|c| c.is_subscribed())
            .map(|c| c.endpoint().clone())
            .collect()
    }

    /// Whether notifications are suspended because no server is connected.
    pub fn is_suspended(&self) -> bool {
        self.shared.is_suspended()
    }

    /// Passes completed so far, including the startup pass.
    pub fn pass_count(&self) -> u64 {
        self.shared.pass_count()
    }

    pub fn is_running(&self) -> bool {
        !self.shared.stopped.load(Ordering::SeqCst)
    }

    /// Release every subscription and close every connection. Idempotent.
    pub fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }

        // Stop the event source first; the worker exits when it drains.
        if let Some(mut stream) = self.connectivity.lock().take() {
            stream.close();
        }
        if let Some(worker) = self.worker.lock().take() {
            if worker.thread().id() == thread::current().id() {
                // Called from a no-server callback on the worker itself.
                drop(worker);
            } else if worker.join().is_err() {
                tracing::warn!("failover worker panicked");
            }
        }

        self.shared.stop();

        tracing::info!("failover coordinator stopped");
        self.shared.bus.broadcast(FailoverEvent::Stopped);
        self.shared.bus.close();
    }
}

impl Drop for FailoverCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for FailoverCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverCoordinator")
            .field("servers", &self.config.servers)
            .field("active", &self.active_server())
            .field("running", &self.is_running())
            .finish()
    }
}
