use std::collections::HashMap;
use std::num::Wrapping;

use whiteboard_system::{
    uuid::Uuid, ConnectionId, Participant, ParticipantSummary, ServerMessage, SessionStore, UserId,
};

/// Participant colors, handed out round-robin in connect order.
pub const PALETTE: [&str; 8] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A", "#98D8C8", "#F7DC6F", "#BB8FCE", "#85C1E2",
];

pub struct ServerState {
    connection_id_source: Wrapping<ConnectionId>,
    color_source: Wrapping<usize>,
    participants: HashMap<ConnectionId, Participant>,
    pub store: SessionStore,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            connection_id_source: Wrapping(0),
            color_source: Wrapping(0),
            participants: HashMap::new(),
            store: SessionStore::new(),
        }
    }

    /// Registers a participant for a new connection.
    pub fn create_connection(&mut self) -> (ConnectionId, Participant) {
        let connection_id = self.new_connection_id();
        let participant = Participant::new(self.new_user_id(), self.next_color());
        self.participants.insert(connection_id, participant.clone());
        log::info!(
            "Connection {} joined as {} ({})",
            connection_id,
            participant.user_id,
            participant.color
        );
        (connection_id, participant)
    }

    /// Forgets the participant. Their operations and stacks stay in the store.
    pub fn disconnect(&mut self, connection_id: &ConnectionId) -> Option<Participant> {
        self.participants.remove(connection_id)
    }

    pub fn participant(&self, connection_id: &ConnectionId) -> Option<&Participant> {
        self.participants.get(connection_id)
    }

    pub fn participant_mut(&mut self, connection_id: &ConnectionId) -> Option<&mut Participant> {
        self.participants.get_mut(connection_id)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Participants ordered by connection id.
    pub fn participants(&self) -> Vec<(ConnectionId, &Participant)> {
        let mut participants = self
            .participants
            .iter()
            .map(|(id, participant)| (*id, participant))
            .collect::<Vec<_>>();
        participants.sort_by_key(|(id, _)| *id);
        participants
    }

    /// Everyone except `connection_id`, in connect order.
    pub fn others(&self, connection_id: &ConnectionId) -> Vec<ParticipantSummary> {
        self.participants()
            .into_iter()
            .filter(|(id, _)| id != connection_id)
            .map(|(_, participant)| participant.summary())
            .collect()
    }

    /// Full-state snapshot for a participant that just connected.
    pub fn snapshot_for(&self, connection_id: &ConnectionId) -> Option<ServerMessage> {
        let participant = self.participant(connection_id)?;
        Some(ServerMessage::Init {
            user_id: participant.user_id,
            user_color: participant.color.clone(),
            history: self.store.active_history(),
            users: self.others(connection_id),
        })
    }

    fn new_connection_id(&mut self) -> ConnectionId {
        loop {
            self.connection_id_source += Wrapping(1);
            let candidate = self.connection_id_source.0;
            if !self.participants.contains_key(&candidate) {
                break candidate;
            }
        }
    }

    fn new_user_id(&self) -> UserId {
        loop {
            let candidate = Uuid::new_v4();
            if self.participants.values().all(|p| p.user_id != candidate) {
                break candidate;
            }
        }
    }

    fn next_color(&mut self) -> String {
        let color = PALETTE[self.color_source.0 % PALETTE.len()];
        self.color_source += Wrapping(1);
        color.to_string()
    }
}
