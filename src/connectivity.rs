//! Fan-in of per-connection connectivity transitions.

use crate::connection::ServerConnection;
use crate::error::Result;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Select, Sender};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Merges the status streams of many connections into one.
pub struct ConnectivityAggregator;

impl ConnectivityAggregator {
    /// Watch every connection and forward "this one changed" in arrival order.
    ///
    /// Each source's own order is preserved; sources are otherwise freely
    /// interleaved. Consumers re-read `connected()` on the emitted connection,
    /// since status is a level and intermediate transitions may be coalesced
    /// by the time they look.
    pub fn merge(connections: &[Arc<ServerConnection>]) -> Result<ConnectivityStream> {
        // Watchers are registered here, before the thread starts, so nothing
        // emitted after merge() returns can be missed.
        let sources: Vec<(Arc<ServerConnection>, Receiver<bool>)> = connections
            .iter()
            .map(|conn| (Arc::clone(conn), conn.status_changes().into_receiver()))
            .collect();

        let (out_tx, out_rx) = unbounded();
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let worker = thread::Builder::new()
            .name("connectivity-aggregator".to_string())
            .spawn(move || forward(sources, stop_rx, out_tx))?;

        Ok(ConnectivityStream {
            receiver: out_rx,
            stop: Some(stop_tx),
            worker: Some(worker),
        })
    }
}

fn forward(
    sources: Vec<(Arc<ServerConnection>, Receiver<bool>)>,
    stop: Receiver<()>,
    out: Sender<Arc<ServerConnection>>,
) {
    let mut select = Select::new();
    let stop_index = select.recv(&stop);

    // Select operation index -> position in `sources`
    let mut live: HashMap<usize, usize> = HashMap::with_capacity(sources.len());
    for (position, (_, receiver)) in sources.iter().enumerate() {
        live.insert(select.recv(receiver), position);
    }

    while !live.is_empty() {
        let oper = select.select();
        let index = oper.index();
        if index == stop_index {
            let _ = oper.recv(&stop);
            break;
        }

        let Some(&position) = live.get(&index) else {
            break;
        };
        let (conn, receiver) = &sources[position];
        match oper.recv(receiver) {
            Ok(connected) => {
                tracing::debug!(server = %conn.endpoint(), connected, "connectivity transition");
                if out.send(Arc::clone(conn)).is_err() {
                    break;
                }
            }
            Err(_) => {
                // Source closed; keep serving the others.
                select.remove(index);
                live.remove(&index);
            }
        }
    }

    tracing::debug!("connectivity aggregator stopped");
}

/// The merged stream. Dropping it stops the aggregator.
pub struct ConnectivityStream {
    receiver: Receiver<Arc<ServerConnection>>,
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl ConnectivityStream {
    /// A receiver for a consumer on another thread. It disconnects once the
    /// stream is closed.
    pub fn receiver(&self) -> Receiver<Arc<ServerConnection>> {
        self.receiver.clone()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<Arc<ServerConnection>, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Stop forwarding and wait for the aggregator thread. Idempotent.
    pub fn close(&mut self) {
        drop(self.stop.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("connectivity aggregator panicked");
            }
        }
    }
}

impl Iterator for ConnectivityStream {
    type Item = Arc<ServerConnection>;

    fn next(&mut self) -> Option<Arc<ServerConnection>> {
        self.receiver.recv().ok()
    }
}

impl Drop for ConnectivityStream {
    fn drop(&mut self) {
        self.close();
    }
}
