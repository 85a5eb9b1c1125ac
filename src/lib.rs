//! # Change Feed Fail-over
//!
//! Keeps exactly one live change-feed subscription across a ranked list of
//! redundant servers, moving it when the subscribed server becomes
//! unreachable and moving it back when a more preferred server recovers.
//!
//! ## Core Concepts
//!
//! - **Connections**: One per server+dataset, exposing connectivity and a change stream
//! - **Controllers**: Per-connection subscribe/unsubscribe state, never double-applied
//! - **Aggregator**: Fan-in of every connection's connectivity transitions
//! - **Coordinator**: Re-evaluates the whole preference list on every transition
//!
//! Delivery is best-effort. During a hand-over, changes may be seen twice
//! ([`HandoverOrder::MakeBeforeBreak`]) or missed
//! ([`HandoverOrder::BreakBeforeMake`]).
//!
//! ## Example
//!
//! ```ignore
//! use changefeed_failover::{
//!     ChangeEvent, Endpoint, FailoverConfig, FailoverCoordinator, ForwardingSubscriber,
//! };
//!
//! let config = FailoverConfig::from_file("failover.json")?;
//! let subscriber = Arc::new(ForwardingSubscriber::new(|server: &Endpoint, change: ChangeEvent| {
//!     println!("{} {:?} {}", server, change.kind, change.id);
//! }));
//!
//! let coordinator = FailoverCoordinator::initialize(config, &connector, subscriber)?;
//! for event in coordinator.listen().receiver.iter() {
//!     println!("{:?}", event);
//! }
//! ```

pub mod config;
pub mod connection;
pub mod connectivity;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod subscription;
pub mod types;

// Re-exports
pub use config::{FailoverConfig, HandoverOrder};
pub use connection::{
    ChangeStream, Connector, Feed, FeedGuard, FeedItem, MemoryConnector, MemoryTransport,
    ServerConnection, StatusChanges, Transport,
};
pub use connectivity::{ConnectivityAggregator, ConnectivityStream};
pub use coordinator::{FailoverCoordinator, PassReport};
pub use error::{FailoverError, FeedError, Result};
pub use events::{DropReason, EventBus, EventListener, FailoverEvent, ListenerId};
pub use subscription::{
    ChangeHandler, ChangeSubscriber, ForwardingSubscriber, SubscriptionController,
    SubscriptionHandle,
};
pub use types::*;
