use crate::{MessageError, Operation, OperationId, ParticipantSummary, Point, Stroke, UserId};
use serde::{Deserialize, Serialize};

/// Messages a client sends over its connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Draw {
        data: Stroke,
    },
    Undo,
    Redo,
    Cursor {
        data: Point,
    },
    Clear,
    /// Any `type` this server does not know about.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    pub fn decode(text: &str) -> Result<Self, MessageError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Draw { .. } => "draw",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::Cursor { .. } => "cursor",
            Self::Clear => "clear",
            Self::Unknown => "unknown",
        }
    }
}

/// Events the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Full-state snapshot for a participant that just joined.
    #[serde(rename_all = "camelCase")]
    Init {
        user_id: UserId,
        user_color: String,
        history: Vec<Operation>,
        users: Vec<ParticipantSummary>,
    },
    Draw {
        operation: Operation,
    },
    #[serde(rename_all = "camelCase")]
    Undo {
        operation_id: OperationId,
        user_id: UserId,
    },
    Redo {
        operation: Operation,
    },
    #[serde(rename_all = "camelCase")]
    Cursor {
        user_id: UserId,
        cursor: Point,
    },
    #[serde(rename_all = "camelCase")]
    UserJoined {
        user_id: UserId,
        user_color: String,
    },
    #[serde(rename_all = "camelCase")]
    UserLeft {
        user_id: UserId,
    },
    Clear,
}

impl ServerMessage {
    pub fn encode(&self) -> Result<String, MessageError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Cursor events may be dropped under load; everything else must arrive.
    pub fn is_lossy(&self) -> bool {
        matches!(self, Self::Cursor { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Draw { .. } => "draw",
            Self::Undo { .. } => "undo",
            Self::Redo { .. } => "redo",
            Self::Cursor { .. } => "cursor",
            Self::UserJoined { .. } => "user-joined",
            Self::UserLeft { .. } => "user-left",
            Self::Clear => "clear",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tool;

    #[test]
    fn it_decodes_draw() {
        let message = ClientMessage::decode(
            r##"{"type":"draw","data":{"points":[{"x":1,"y":2.5}],"color":"#000000","lineWidth":5,"tool":"eraser"}}"##,
        )
        .expect("");
        assert_eq!(
            message,
            ClientMessage::Draw {
                data: Stroke {
                    points: vec![Point::new(1.0, 2.5)],
                    color: "#000000".into(),
                    line_width: 5.0,
                    tool: Tool::Eraser,
                }
            }
        );
    }

    #[test]
    fn it_decodes_commands_without_payload() {
        assert_eq!(
            ClientMessage::decode(r#"{"type":"undo"}"#).expect(""),
            ClientMessage::Undo
        );
        assert_eq!(
            ClientMessage::decode(r#"{"type":"redo"}"#).expect(""),
            ClientMessage::Redo
        );
        assert_eq!(
            ClientMessage::decode(r#"{"type":"clear"}"#).expect(""),
            ClientMessage::Clear
        );
    }

    #[test]
    fn it_decodes_cursor() {
        assert_eq!(
            ClientMessage::decode(r#"{"type":"cursor","data":{"x":10,"y":20}}"#).expect(""),
            ClientMessage::Cursor {
                data: Point::new(10.0, 20.0)
            }
        );
    }

    #[test]
    fn it_maps_unknown_type_to_unknown() {
        assert_eq!(
            ClientMessage::decode(r#"{"type":"wave","data":{}}"#).expect(""),
            ClientMessage::Unknown
        );
    }

    #[test]
    fn it_rejects_malformed_input() {
        assert!(matches!(
            ClientMessage::decode("not json"),
            Err(MessageError::Malformed(_))
        ));
        // known type, missing field
        assert!(matches!(
            ClientMessage::decode(r#"{"type":"draw"}"#),
            Err(MessageError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::decode(r#"{"data":{"x":1,"y":1}}"#),
            Err(MessageError::Malformed(_))
        ));
        // every stroke field is required, `tool` included
        assert!(matches!(
            ClientMessage::decode(
                r##"{"type":"draw","data":{"points":[{"x":1,"y":1}],"color":"#000000","lineWidth":5}}"##
            ),
            Err(MessageError::Malformed(_))
        ));
    }

    #[test]
    fn it_encodes_with_wire_names() {
        let user_id = uuid::Uuid::new_v4();
        let joined = ServerMessage::UserJoined {
            user_id,
            user_color: "#FF6B6B".into(),
        }
        .encode()
        .expect("");
        let value: serde_json::Value = serde_json::from_str(&joined).expect("");
        assert_eq!(value["type"], "user-joined");
        assert_eq!(value["userId"], user_id.to_string());
        assert_eq!(value["userColor"], "#FF6B6B");

        let operation = Operation::stroke(
            user_id,
            Stroke {
                points: vec![Point::new(0.0, 0.0)],
                color: "#123456".into(),
                line_width: 3.0,
                tool: Tool::Brush,
            },
        );
        let draw = ServerMessage::Draw {
            operation: operation.clone(),
        }
        .encode()
        .expect("");
        let value: serde_json::Value = serde_json::from_str(&draw).expect("");
        assert_eq!(value["type"], "draw");
        assert_eq!(value["operation"]["type"], "draw");
        assert_eq!(value["operation"]["id"], operation.id.to_string());
        assert_eq!(value["operation"]["data"]["lineWidth"], 3.0);
        assert_eq!(value["operation"]["data"]["tool"], "brush");

        let clear = ServerMessage::Clear.encode().expect("");
        assert_eq!(clear, r#"{"type":"clear"}"#);
    }
}
