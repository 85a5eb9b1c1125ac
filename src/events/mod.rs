//! Structured signal stream of coordinator state transitions.
//!
//! Every subscribe, unsubscribe, failure and no-server transition is
//! broadcast as a [`FailoverEvent`] to in-process listeners:
//! - Bounded per-listener buffers
//! - Slow listeners are dropped instead of blocking the coordinator
//!
//! # Example
//!
//! ```ignore
//! let listener = coordinator.listen_with_buffer(64);
//!
//! for event in listener.receiver.iter() {
//!     match event {
//!         FailoverEvent::Subscribed { server } => println!("live on {}", server),
//!         FailoverEvent::NoServerAvailable => println!("notifications suspended"),
//!         FailoverEvent::Stopped => break,
//!         _ => {}
//!     }
//! }
//! ```

mod bus;
mod types;

pub use bus::EventBus;
pub use types::{DropReason, EventListener, FailoverEvent, ListenerId};
