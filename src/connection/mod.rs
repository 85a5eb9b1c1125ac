//! Server connections and the transport seam they sit on.
//!
//! A [`ServerConnection`] wraps one server's change feed behind a
//! [`Transport`], which is supplied by the embedding application through a
//! [`Connector`]. The connection exposes:
//! - Level-valued connectivity (`connected()`)
//! - A stream of connectivity transitions (`status_changes()`)
//! - A filtered change stream (`open_change_stream()`)
//!
//! Reconnects, heartbeats and the wire protocol all live behind the
//! transport; nothing here retries.
//!
//! # Example
//!
//! ```ignore
//! let connector = MemoryConnector::new();
//! let primary = connector.add(Endpoint::new("http://primary", "orders"), true);
//!
//! let conn = ServerConnection::open(Endpoint::new("http://primary", "orders"), &connector, "_")?;
//! let mut changes = conn.open_change_stream()?;
//!
//! primary.publish(ChangeEvent::put("order-1", "1-a"));
//! assert_eq!(changes.next().unwrap()?.id, "order-1");
//! ```

mod memory;
mod server;
mod transport;

pub use memory::{MemoryConnector, MemoryTransport};
pub use server::{ChangeStream, ServerConnection, StatusChanges};
pub use transport::{Connector, Feed, FeedGuard, FeedItem, Transport};
