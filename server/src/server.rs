use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc::{channel, Sender};

use whiteboard_system::{ClientMessage, ConnectionId, Operation, ServerMessage};

use super::connection::{ConnectionCommand, ConnectionEvent};
use crate::admin::{AdminCommand, ParticipantDescription, SessionDescription};
use crate::config::ServerConfig;
use crate::connection_tx_storage::{ConnectionTx, ConnectionTxStorage};
use crate::server_state::ServerState;

pub type ServerTx = Sender<ServerCommand>;

#[derive(Debug)]
pub enum ServerCommand {
    Connection(ConnectionCommand),
    Admin(AdminCommand),
}

/// Owns all session state. Runs as a single task, so every command is
/// applied to the store atomically with respect to every other command.
pub struct Server {
    server_state: ServerState,
    connections: ConnectionTxStorage,
}

impl Server {
    pub fn new() -> Self {
        Self {
            server_state: ServerState::new(),
            connections: ConnectionTxStorage::new(),
        }
    }

    pub async fn handle_command(&mut self, command: ServerCommand) {
        match command {
            ServerCommand::Connection(command) => self.handle_connection_command(command).await,
            ServerCommand::Admin(command) => self.handle_admin_command(command),
        }
    }

    async fn handle_connection_command(&mut self, command: ConnectionCommand) {
        match command {
            ConnectionCommand::Connect { tx } => self.connect(tx).await,
            ConnectionCommand::Disconnect { from } => {
                if self.connections.contains(&from) {
                    self.disconnect_all(vec![from]).await;
                } else {
                    log::debug!("Connection {} was already disconnected", from);
                }
            }
            ConnectionCommand::ClientMessage { from, message } => {
                self.handle_client_message(from, message).await
            }
        }
    }

    async fn connect(&mut self, tx: ConnectionTx) {
        let (connection_id, participant) = self.server_state.create_connection();
        self.connections.insert(connection_id, tx);

        let greeted = match self.server_state.snapshot_for(&connection_id) {
            Some(snapshot) => {
                let connected = self
                    .connections
                    .send(&connection_id, ConnectionEvent::Connected { connection_id })
                    .await;
                match connected {
                    Ok(()) => {
                        self.connections
                            .send(
                                &connection_id,
                                ConnectionEvent::Message(Arc::new(snapshot)),
                            )
                            .await
                    }
                    Err(failure) => Err(failure),
                }
            }
            None => Ok(()),
        };

        if greeted.is_err() {
            // Nobody has heard of this participant yet; no leave event.
            log::warn!("Connection {} closed before it was greeted", connection_id);
            self.connections.remove(&connection_id);
            self.server_state.disconnect(&connection_id);
            return;
        }

        self.broadcast(
            ServerMessage::UserJoined {
                user_id: participant.user_id,
                user_color: participant.color,
            },
            Some(&connection_id),
        )
        .await;
    }

    async fn handle_client_message(&mut self, from: ConnectionId, message: ClientMessage) {
        let user_id = match self.server_state.participant(&from) {
            Some(participant) => participant.user_id,
            None => {
                log::warn!("Dropping {} from unknown connection {}", message.kind(), from);
                return;
            }
        };

        match message {
            ClientMessage::Draw { data } => {
                if let Err(err) = data.validate() {
                    log::warn!("Dropping draw from {}: {}", user_id, err);
                    return;
                }
                let operation = self
                    .server_state
                    .store
                    .commit(Operation::stroke(user_id, data))
                    .clone();
                log::debug!(
                    "Draw {} from {}: {} points",
                    operation.id,
                    user_id,
                    operation.data.points.len()
                );
                // The sender gets its own stroke back to learn the assigned id.
                self.broadcast(ServerMessage::Draw { operation }, None).await;
            }
            ClientMessage::Undo => match self.server_state.store.undo(&user_id) {
                Some(operation) => {
                    log::debug!("Undo {} by {}", operation.id, user_id);
                    self.broadcast(
                        ServerMessage::Undo {
                            operation_id: operation.id,
                            user_id,
                        },
                        None,
                    )
                    .await;
                }
                None => log::debug!("Nothing to undo for {}", user_id),
            },
            ClientMessage::Redo => match self.server_state.store.redo(&user_id) {
                Some(operation) => {
                    log::debug!("Redo {} by {}", operation.id, user_id);
                    self.broadcast(ServerMessage::Redo { operation }, None).await;
                }
                None => log::debug!("Nothing to redo for {}", user_id),
            },
            ClientMessage::Cursor { data } => {
                if let Some(participant) = self.server_state.participant_mut(&from) {
                    participant.cursor = data;
                }
                log::trace!("Cursor of {} at ({}, {})", user_id, data.x, data.y);
                self.broadcast(
                    ServerMessage::Cursor {
                        user_id,
                        cursor: data,
                    },
                    Some(&from),
                )
                .await;
            }
            ClientMessage::Clear => {
                self.server_state.store.clear();
                log::info!("Canvas cleared by {}", user_id);
                self.broadcast(ServerMessage::Clear, None).await;
            }
            ClientMessage::Unknown => {
                log::debug!("Ignoring message of unknown type from {}", user_id);
            }
        }
    }

    async fn broadcast(&mut self, message: ServerMessage, without: Option<&ConnectionId>) {
        let failed = self.connections.broadcast(Arc::new(message), without).await;
        self.disconnect_all(failed).await;
    }

    /// Unregisters each connection and announces its departure. A leave
    /// broadcast may uncover more dead connections; those are queued too.
    async fn disconnect_all(&mut self, connection_ids: Vec<ConnectionId>) {
        let mut queue = VecDeque::from(connection_ids);
        while let Some(connection_id) = queue.pop_front() {
            self.connections.remove(&connection_id);
            if let Some(participant) = self.server_state.disconnect(&connection_id) {
                log::info!(
                    "Connection {} ({}) left, {} remaining",
                    connection_id,
                    participant.user_id,
                    self.server_state.participant_count()
                );
                let failed = self
                    .connections
                    .broadcast(
                        Arc::new(ServerMessage::UserLeft {
                            user_id: participant.user_id,
                        }),
                        None,
                    )
                    .await;
                queue.extend(failed);
            }
        }
    }

    fn handle_admin_command(&self, command: AdminCommand) {
        match command {
            AdminCommand::GetSessionState { tx } => {
                if tx.send(self.describe()).is_err() {
                    log::debug!("Session state requester went away");
                }
            }
        }
    }

    fn describe(&self) -> SessionDescription {
        let store = &self.server_state.store;
        SessionDescription {
            participants: self
                .server_state
                .participants()
                .into_iter()
                .map(|(_, participant)| ParticipantDescription {
                    user_id: participant.user_id,
                    user_color: participant.color.clone(),
                    cursor: participant.cursor,
                    can_undo: store.can_undo(&participant.user_id),
                    can_redo: store.can_redo(&participant.user_id),
                })
                .collect(),
            operations: store.len(),
            active_operations: store.active_len(),
        }
    }
}

pub fn spawn_server(config: &ServerConfig) -> ServerTx {
    let (srv_tx, mut srv_rx) = channel::<ServerCommand>(config.server_buffer);

    tokio::spawn(async move {
        let mut server = Box::new(Server::new());

        while let Some(command) = srv_rx.recv().await {
            server.handle_command(command).await;
        }
        log::info!("Server loop terminated");
    });

    srv_tx
}
