use crate::MessageError;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub type ConnectionId = u32;
pub type UserId = uuid::Uuid;
pub type OperationId = uuid::Uuid;
/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl std::default::Default for Point {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Brush,
    Eraser,
}

/// Payload of a freehand stroke, as drawn by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub points: Vec<Point>,
    pub color: String,
    pub line_width: f64,
    pub tool: Tool,
}

impl Stroke {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn validate(&self) -> Result<(), MessageError> {
        if self.is_empty() {
            Err(MessageError::EmptyStroke)
        } else {
            Ok(())
        }
    }
}

/// Kind of a committed operation. Renderers recognize strokes by the
/// `draw` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    #[serde(rename = "draw")]
    Stroke,
}

/// One committed drawing action. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: OperationId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub data: Stroke,
    pub timestamp: Timestamp,
}

impl Operation {
    /// Builds a stroke operation with a fresh id and the current time.
    /// Ids are time-ordered: a later operation always has a greater id.
    pub fn stroke(user_id: UserId, stroke: Stroke) -> Self {
        Self {
            id: uuid::Uuid::now_v7(),
            user_id,
            kind: OperationKind::Stroke,
            data: stroke,
            timestamp: now_millis(),
        }
    }
}

/// A connected user. Lives exactly as long as its connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub user_id: UserId,
    pub color: String,
    pub cursor: Point,
}

impl Participant {
    pub fn new(user_id: UserId, color: String) -> Self {
        Self {
            user_id,
            color,
            cursor: Point::default(),
        }
    }

    pub fn summary(&self) -> ParticipantSummary {
        ParticipantSummary {
            user_id: self.user_id,
            user_color: self.color.clone(),
        }
    }
}

/// Identity of another participant as announced to joiners; no cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub user_id: UserId,
    pub user_color: String,
}

pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot() -> Stroke {
        Stroke {
            points: vec![Point::new(0.0, 0.0)],
            color: "#000000".into(),
            line_width: 1.0,
            tool: Tool::Brush,
        }
    }

    #[test]
    fn it_orders_operation_ids_by_creation() {
        let user_id = uuid::Uuid::new_v4();
        let ids = (0..256)
            .map(|_| Operation::stroke(user_id, dot()).id)
            .collect::<Vec<_>>();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(ids[0].get_version_num(), 7);
    }

    #[test]
    fn it_rejects_empty_stroke() {
        let mut stroke = dot();
        assert!(stroke.validate().is_ok());
        stroke.points.clear();
        assert!(matches!(stroke.validate(), Err(MessageError::EmptyStroke)));
    }
}
