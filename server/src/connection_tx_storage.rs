use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use whiteboard_system::{ConnectionId, ServerMessage};

use crate::connection::ConnectionEvent;

pub type ConnectionTx = tokio::sync::mpsc::Sender<ConnectionEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// The receiving side is gone; the connection is dead.
    Closed,
    /// The outbound buffer is full; only returned by non-waiting sends.
    Full,
}

/// Outbound channels of every registered connection.
pub struct ConnectionTxStorage {
    connection_txs: HashMap<ConnectionId, ConnectionTx>,
}

impl ConnectionTxStorage {
    pub fn new() -> Self {
        Self {
            connection_txs: HashMap::new(),
        }
    }

    pub fn insert(&mut self, connection_id: ConnectionId, tx: ConnectionTx) {
        self.connection_txs.insert(connection_id, tx);
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<ConnectionTx> {
        self.connection_txs.remove(connection_id)
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connection_txs.contains_key(connection_id)
    }

    /// Registered connection ids in ascending order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids = self.connection_txs.keys().cloned().collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    /// Waits for buffer space. Fails only when the connection is gone.
    pub async fn send(
        &self,
        to: &ConnectionId,
        event: ConnectionEvent,
    ) -> Result<(), SendFailure> {
        match self.connection_txs.get(to) {
            Some(tx) => tx.send(event).await.map_err(|_| SendFailure::Closed),
            None => {
                log::warn!("Tried to send to unknown connection {}", to);
                Err(SendFailure::Closed)
            }
        }
    }

    pub fn try_send(&self, to: &ConnectionId, event: ConnectionEvent) -> Result<(), SendFailure> {
        match self.connection_txs.get(to) {
            Some(tx) => tx.try_send(event).map_err(|err| match err {
                TrySendError::Full(_) => SendFailure::Full,
                TrySendError::Closed(_) => SendFailure::Closed,
            }),
            None => Err(SendFailure::Closed),
        }
    }

    /// Sends `message` to every registered connection except `without`.
    ///
    /// Iterates over a snapshot of the ids and never stops early. Returns
    /// the connections found dead so the caller can disconnect them once
    /// the broadcast is over. Lossy messages are skipped for connections
    /// whose buffer is full.
    pub async fn broadcast(
        &self,
        message: Arc<ServerMessage>,
        without: Option<&ConnectionId>,
    ) -> Vec<ConnectionId> {
        let mut failed = Vec::new();
        let mut delivered = 0usize;

        for connection_id in self.ids() {
            if without == Some(&connection_id) {
                continue;
            }
            let event = ConnectionEvent::Message(message.clone());
            let result = if message.is_lossy() {
                self.try_send(&connection_id, event)
            } else {
                self.send(&connection_id, event).await
            };
            match result {
                Ok(()) => delivered += 1,
                Err(SendFailure::Full) => {
                    log::trace!(
                        "Dropped {} for busy connection {}",
                        message.kind(),
                        connection_id
                    );
                }
                Err(SendFailure::Closed) => {
                    log::warn!(
                        "Failed to deliver {} to connection {}",
                        message.kind(),
                        connection_id
                    );
                    failed.push(connection_id);
                }
            }
        }

        if !message.is_lossy() {
            log::debug!("Broadcast {} to {} connections", message.kind(), delivered);
        }
        failed
    }
}
