//! Per-connection subscription lifecycle.
//!
//! A [`SubscriptionController`] owns the subscribe/unsubscribe state of one
//! [`ServerConnection`](crate::connection::ServerConnection):
//! - No double subscribe, no double unsubscribe
//! - Subscribe and unsubscribe on the same connection never interleave
//! - Different connections never block each other
//!
//! What happens to the delivered changes is decided by the injected
//! [`ChangeSubscriber`]. [`ForwardingSubscriber`] is the stock one: it pumps
//! the change stream into a [`ChangeHandler`] on a dedicated thread.
//!
//! # Example
//!
//! ```ignore
//! let subscriber = Arc::new(ForwardingSubscriber::new(|server: &Endpoint, change: ChangeEvent| {
//!     println!("{} changed on {}", change.id, server);
//! }));
//! let controller = SubscriptionController::new(Arc::clone(&conn), subscriber);
//!
//! controller.subscribe()?;
//! assert!(controller.is_subscribed());
//! controller.unsubscribe();
//! ```

mod controller;
mod forwarding;
mod types;

pub use controller::SubscriptionController;
pub use forwarding::{ChangeHandler, ForwardingSubscriber};
pub use types::{ChangeSubscriber, SubscriptionHandle};
