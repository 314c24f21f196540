//! Event fan-out to connected clients

use std::collections::HashMap;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::ws::protocol::ServerMsg;

use super::ConnectionId;

/// Outbound queue capacity per connection
pub const OUTBOUND_BUFFER: usize = 256;

/// Relays server events to connections. Holds only the outbound queue of
/// each live connection; sends never wait, so a slow or dead client cannot
/// hold up delivery to the others.
#[derive(Default)]
pub struct EventBroadcaster {
    connections: HashMap<ConnectionId, mpsc::Sender<ServerMsg>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, connection_id: ConnectionId, outbound: mpsc::Sender<ServerMsg>) {
        self.connections.insert(connection_id, outbound);
    }

    pub fn remove(&mut self, connection_id: ConnectionId) -> bool {
        self.connections.remove(&connection_id).is_some()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Send to a single connection
    pub fn unicast(&self, connection_id: ConnectionId, msg: ServerMsg) -> bool {
        match self.connections.get(&connection_id) {
            Some(tx) => deliver(connection_id, tx, msg),
            None => false,
        }
    }

    /// Send to every connection except `sender`. Returns how many accepted it.
    pub fn broadcast_except(&self, sender: ConnectionId, msg: &ServerMsg) -> usize {
        self.connections
            .iter()
            .filter(|(id, _)| **id != sender)
            .filter(|(id, tx)| deliver(**id, tx, msg.clone()))
            .count()
    }

    /// Send to every connection. Returns how many accepted it.
    pub fn broadcast_all(&self, msg: &ServerMsg) -> usize {
        self.connections
            .iter()
            .filter(|(id, tx)| deliver(**id, tx, msg.clone()))
            .count()
    }
}

fn deliver(connection_id: ConnectionId, tx: &mpsc::Sender<ServerMsg>, msg: ServerMsg) -> bool {
    match tx.try_send(msg) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(connection_id = %connection_id, "Outbound queue full, dropping event");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(connection_id = %connection_id, "Outbound queue closed");
            false
        }
    }
}
