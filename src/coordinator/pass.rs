//! The re-evaluation pass: pick the preferred connected server, subscribe it,
//! unsubscribe everything else.

use crate::config::HandoverOrder;
use crate::events::{EventBus, EventListener, FailoverEvent};
use crate::subscription::SubscriptionController;
use crate::types::Endpoint;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Callback fired on entry into the no-server state.
pub(crate) type NoServerHook = Arc<dyn Fn() + Send + Sync>;

/// What a single pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Highest-priority connected server, if any.
    pub chosen: Option<Endpoint>,
    /// Servers that became subscribed in this pass.
    pub subscribed: Vec<Endpoint>,
    /// Servers that became unsubscribed in this pass.
    pub unsubscribed: Vec<Endpoint>,
    /// Servers whose subscribe or unsubscribe failed, with the reason.
    pub failures: Vec<(Endpoint, String)>,
}

impl PassReport {
    /// True when the pass changed no subscription.
    pub fn is_noop(&self) -> bool {
        self.subscribed.is_empty() && self.unsubscribed.is_empty()
    }
}

/// Why a pass ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PassTrigger {
    Startup,
    Connectivity,
    Manual,
}

/// Mutable across passes; only touched under the pass lock.
#[derive(Default)]
struct PassState {
    /// In the no-server state.
    suspended: bool,
    passes: u64,
}

/// State shared by the coordinator handle and its worker thread.
pub(crate) struct Shared {
    /// Preference order, index 0 first. Never reordered.
    pub(crate) controllers: Vec<SubscriptionController>,
    pub(crate) handover: HandoverOrder,
    pub(crate) bus: EventBus,
    pub(crate) stopped: AtomicBool,
    /// Serializes passes with each other and with shutdown.
    pass: Mutex<PassState>,
    no_server_hooks: RwLock<Vec<NoServerHook>>,
}

impl Shared {
    pub(crate) fn new(controllers: Vec<SubscriptionController>, handover: HandoverOrder) -> Self {
        Self {
            controllers,
            handover,
            bus: EventBus::new(),
            stopped: AtomicBool::new(false),
            pass: Mutex::new(PassState::default()),
            no_server_hooks: RwLock::new(Vec::new()),
        }
    }

    /// Register a hook. If the no-server state is already entered, the hook
    /// runs once right away, on the calling thread.
    pub(crate) fn add_no_server_hook(&self, hook: NoServerHook) {
        let suspended = {
            let state = self.pass.lock();
            self.no_server_hooks.write().push(Arc::clone(&hook));
            state.suspended && !self.stopped.load(Ordering::SeqCst)
        };
        if suspended {
            run_hooks(&[hook]);
        }
    }

    /// Register a listener. A listener joining while no server is available
    /// starts with `NoServerAvailable`.
    pub(crate) fn listen(&self, buffer_size: usize) -> EventListener {
        let state = self.pass.lock();
        let listener = self.bus.listen(buffer_size);
        if state.suspended && !self.stopped.load(Ordering::SeqCst) {
            self.bus.send_to(listener.id, FailoverEvent::NoServerAvailable);
        }
        listener
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.pass.lock().suspended
    }

    pub(crate) fn pass_count(&self) -> u64 {
        self.pass.lock().passes
    }

    /// Run one full pass. Returns None once the coordinator has stopped.
    pub(crate) fn run_pass(&self, trigger: PassTrigger) -> Option<PassReport> {
        let (hooks, report) = {
            let mut state = self.pass.lock();
            if self.stopped.load(Ordering::SeqCst) {
                return None;
            }

            // Read each level once so the whole pass works from one snapshot.
            let chosen = self
                .controllers
                .iter()
                .position(|c| c.connection().connected());

            let mut report = PassReport {
                chosen: chosen.map(|i| self.controllers[i].endpoint().clone()),
                ..Default::default()
            };

            match self.handover {
                HandoverOrder::MakeBeforeBreak => {
                    if let Some(index) = chosen {
                        self.subscribe_one(index, &mut report);
                    }
                    self.unsubscribe_others(chosen, &mut report);
                }
                HandoverOrder::BreakBeforeMake => {
                    self.unsubscribe_others(chosen, &mut report);
                    if let Some(index) = chosen {
                        self.subscribe_one(index, &mut report);
                    }
                }
            }

            state.passes += 1;
            let entered = match &report.chosen {
                None if !state.suspended => {
                    state.suspended = true;
                    tracing::info!("no server available, notifications suspended");
                    self.bus.broadcast(FailoverEvent::NoServerAvailable);
                    true
                }
                Some(server) if state.suspended => {
                    state.suspended = false;
                    tracing::info!(server = %server, "server available, notifications resumed");
                    false
                }
                _ => false,
            };

            tracing::debug!(
                ?trigger,
                pass = state.passes,
                chosen = ?report.chosen,
                subscribed = report.subscribed.len(),
                unsubscribed = report.unsubscribed.len(),
                failures = report.failures.len(),
                "re-evaluation pass complete"
            );

            // Taken under the pass lock so a hook registered concurrently
            // fires either here or at registration, never both.
            let hooks = if entered {
                self.no_server_hooks.read().clone()
            } else {
                Vec::new()
            };
            (hooks, report)
        };

        // Outside every lock so hooks may call back into the coordinator.
        run_hooks(&hooks);
        Some(report)
    }

    fn subscribe_one(&self, index: usize, report: &mut PassReport) {
        let controller = &self.controllers[index];
        let server = controller.endpoint();

        match panic::catch_unwind(AssertUnwindSafe(|| controller.subscribe())) {
            Ok(Ok(true)) => {
                tracing::info!(server = %server, "subscribed");
                report.subscribed.push(server.clone());
                self.bus.broadcast(FailoverEvent::Subscribed {
                    server: server.clone(),
                });
            }
            Ok(Ok(false)) => {}
            Ok(Err(e)) => self.subscribe_failed(server, e.to_string(), report),
            Err(panic) => self.subscribe_failed(server, panic_message(&*panic), report),
        }
    }

    fn subscribe_failed(&self, server: &Endpoint, reason: String, report: &mut PassReport) {
        tracing::warn!(server = %server, error = %reason, "subscribe failed");
        report.failures.push((server.clone(), reason.clone()));
        self.bus.broadcast(FailoverEvent::SubscribeFailed {
            server: server.clone(),
            reason,
        });
    }

    /// Unconditionally unsubscribe every controller except `chosen`.
    fn unsubscribe_others(&self, chosen: Option<usize>, report: &mut PassReport) {
        for (index, controller) in self.controllers.iter().enumerate() {
            if Some(index) != chosen {
                self.unsubscribe_one(controller, Some(&mut *report));
            }
        }
    }

    pub(crate) fn unsubscribe_one(
        &self,
        controller: &SubscriptionController,
        report: Option<&mut PassReport>,
    ) {
        let server = controller.endpoint();

        match panic::catch_unwind(AssertUnwindSafe(|| controller.unsubscribe())) {
            Ok(true) => {
                tracing::info!(server = %server, "unsubscribed");
                if let Some(report) = report {
                    report.unsubscribed.push(server.clone());
                }
                self.bus.broadcast(FailoverEvent::Unsubscribed {
                    server: server.clone(),
                });
            }
            Ok(false) => {}
            Err(panic) => {
                let reason = panic_message(&*panic);
                tracing::warn!(server = %server, error = %reason, "unsubscribe failed");
                if let Some(report) = report {
                    report.failures.push((server.clone(), reason.clone()));
                }
                self.bus.broadcast(FailoverEvent::UnsubscribeFailed {
                    server: server.clone(),
                    reason,
                });
            }
        }
    }

    /// Tear down every subscription under the pass lock. No pass runs afterwards.
    pub(crate) fn stop(&self) {
        let _state = self.pass.lock();
        self.stopped.store(true, Ordering::SeqCst);
        for controller in &self.controllers {
            self.unsubscribe_one(controller, None);
            controller.connection().close();
        }
    }
}

fn run_hooks(hooks: &[NoServerHook]) {
    for hook in hooks {
        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| hook())) {
            tracing::warn!(reason = %panic_message(&*panic), "no-server callback panicked");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
