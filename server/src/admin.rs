use serde::Serialize;
use tokio::sync::oneshot::Sender;
use whiteboard_system::{Point, UserId};

#[derive(Debug)]
pub enum AdminCommand {
    GetSessionState { tx: Sender<SessionDescription> },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescription {
    pub participants: Vec<ParticipantDescription>,
    /// Every operation in the log, undone ones included.
    pub operations: usize,
    pub active_operations: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDescription {
    pub user_id: UserId,
    pub user_color: String,
    pub cursor: Point,
    pub can_undo: bool,
    pub can_redo: bool,
}
