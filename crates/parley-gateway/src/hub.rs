use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use parley_store::HistoryStore;
use parley_types::events::ClientCommand;
use parley_types::models::ConnectionId;

use crate::router::{ChatState, Delivery};

/// A serialized event ready to be written to a socket. Shared between every
/// recipient of the same delivery.
pub type Outbound = Arc<str>;

/// Snapshot of hub counters for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    pub connections: usize,
    pub nicknames: usize,
    pub groups: usize,
    pub messages: usize,
}

/// Owns the chat state and every connection's outbound channel.
///
/// All events go through one lock: a handler sees the state, routes, and
/// queues its deliveries before the next handler runs.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<Mutex<HubInner>>,
}

struct HubInner {
    state: ChatState,
    /// Per-connection send channels: conn_id -> sender
    channels: HashMap<ConnectionId, mpsc::UnboundedSender<Outbound>>,
}

impl HubInner {
    fn deliver(&self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            let json: Outbound = match serde_json::to_string(&delivery.event) {
                Ok(json) => json.into(),
                Err(e) => {
                    warn!("Failed to serialize outbound event: {}", e);
                    continue;
                }
            };

            for conn in &delivery.recipients {
                match self.channels.get(conn) {
                    Some(tx) => {
                        if tx.send(Arc::clone(&json)).is_err() {
                            debug!("Connection {} closed before delivery", conn);
                        }
                    }
                    None => debug!("No channel for connection {}", conn),
                }
            }
        }
    }
}

impl Hub {
    pub fn new(history: HistoryStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                state: ChatState::new(history),
                channels: HashMap::new(),
            })),
        }
    }

    /// Register a new connection. Returns its id and the receiver its socket
    /// task drains.
    pub async fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<Outbound>) {
        let conn_id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut inner = self.inner.lock().await;
        inner.channels.insert(conn_id, tx);
        let deliveries = inner.state.connect(conn_id);
        inner.deliver(deliveries);

        (conn_id, rx)
    }

    /// Route one command from `from`.
    pub async fn handle(&self, from: ConnectionId, cmd: ClientCommand) {
        let mut inner = self.inner.lock().await;
        let deliveries = inner.state.handle(from, cmd);
        inner.deliver(deliveries);
    }

    /// Drop a connection and tell everyone who is left.
    pub async fn disconnect(&self, conn_id: ConnectionId) {
        let mut inner = self.inner.lock().await;
        if inner.channels.remove(&conn_id).is_none() {
            return;
        }
        let deliveries = inner.state.disconnect(conn_id);
        inner.deliver(deliveries);
    }

    /// Administrative reset: clear history and groups, keep connections.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        let deliveries = inner.state.reset();
        inner.deliver(deliveries);
    }

    /// Write any history the store still holds only in memory.
    pub async fn flush(&self) -> anyhow::Result<()> {
        self.inner.lock().await.state.history.flush()
    }

    pub async fn stats(&self) -> HubStats {
        let inner = self.inner.lock().await;
        HubStats {
            connections: inner.channels.len(),
            nicknames: inner.state.directory.all_nicknames().len(),
            groups: inner.state.groups.len(),
            messages: inner.state.history.len(),
        }
    }
}
