//! Fail-over coordination across a ranked list of servers.
//!
//! The coordinator re-evaluates the whole preference list on every trigger:
//! 1. Find the first connection (in preference order) that is connected
//! 2. Subscribe it
//! 3. Unsubscribe every other connection, whether or not it looked subscribed
//! 4. With nothing connected, signal that notifications are suspended
//!
//! Since each pass recomputes the target from current levels, a missed or
//! duplicated connectivity event is corrected by the next pass.
//!
//! # Example
//!
//! ```ignore
//! let config = FailoverConfig::with_servers(vec![
//!     Endpoint::new("http://primary:5984", "orders"),
//!     Endpoint::new("http://backup:5984", "orders"),
//! ]);
//! let subscriber = Arc::new(ForwardingSubscriber::new(|server: &Endpoint, change: ChangeEvent| {
//!     println!("{:?} {} from {}", change.kind, change.id, server);
//! }));
//!
//! let coordinator = FailoverCoordinator::initialize(config, &connector, subscriber)?;
//! coordinator.on_no_server(|| eprintln!("all servers down"));
//! // ...
//! coordinator.shutdown();
//! ```

mod failover;
mod pass;

pub use failover::FailoverCoordinator;
pub use pass::PassReport;
