//! Wire vocabulary of the `grid_games.Room` service.
//!
//! Every message is a JSON object tagged with a `type` field, e.g.
//! `{"type":"make-move","target":4}`. Sessions always travel as full
//! [`SessionSnapshot`]s.

include!(concat!(env!("OUT_DIR"), "/grid_games.Room.rs"));

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::{GameKind, Mark, Participant, Role, SessionSnapshot, Target};

/// Fully qualified name of the room service, as reported by the health service.
pub const ROOM_SERVICE: &str = "grid_games.Room";

pub type RoomId = String;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Must open every session stream, including reconnects.
    #[serde(rename_all = "camelCase")]
    Join {
        room_id: RoomId,
        display_name: String,
    },
    StartGame {
        kind: GameKind,
    },
    MakeMove {
        target: Target,
    },
    ResetGame,
    Leave,
}

impl ClientMessage {
    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::Join { .. } => "join",
            ClientMessage::StartGame { .. } => "start-game",
            ClientMessage::MakeMove { .. } => "make-move",
            ClientMessage::ResetGame => "reset-game",
            ClientMessage::Leave => "leave",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveReason {
    Left,
    Disconnected,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Sent to the joiner only.
    Joined {
        role: Role,
        participants: Vec<Participant>,
    },
    SessionStarted {
        snapshot: SessionSnapshot,
    },
    MoveApplied {
        snapshot: SessionSnapshot,
    },
    SessionReset {
        snapshot: SessionSnapshot,
    },
    ParticipantJoined {
        participants: Vec<Participant>,
    },
    ParticipantLeft {
        participants: Vec<Participant>,
        reason: LeaveReason,
    },
    SessionEndedByTimeout {
        snapshot: SessionSnapshot,
        winner: Mark,
    },
    SessionEndedByDisconnect {
        snapshot: SessionSnapshot,
        winner: Mark,
    },
    ProtocolError {
        message: String,
    },
}

impl ServerMessage {
    pub fn name(&self) -> &'static str {
        match self {
            ServerMessage::Joined { .. } => "joined",
            ServerMessage::SessionStarted { .. } => "session-started",
            ServerMessage::MoveApplied { .. } => "move-applied",
            ServerMessage::SessionReset { .. } => "session-reset",
            ServerMessage::ParticipantJoined { .. } => "participant-joined",
            ServerMessage::ParticipantLeft { .. } => "participant-left",
            ServerMessage::SessionEndedByTimeout { .. } => "session-ended-by-timeout",
            ServerMessage::SessionEndedByDisconnect { .. } => "session-ended-by-disconnect",
            ServerMessage::ProtocolError { .. } => "protocol-error",
        }
    }

    pub fn protocol_error(message: impl Into<String>) -> Self {
        Self::ProtocolError {
            message: message.into(),
        }
    }
}

/// One frame of the session reply stream.
///
/// Decoding only fails on bytes that aren't JSON at all. A JSON frame that
/// isn't a known [`ServerMessage`] arrives as [`ServerFrame::Malformed`], so one
/// bad frame doesn't tear down the stream.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerFrame {
    Message(ServerMessage),
    Malformed {
        frame: serde_json::Value,
        error: String,
    },
}

impl ServerFrame {
    pub fn into_message(self) -> Result<ServerMessage, String> {
        match self {
            ServerFrame::Message(message) => Ok(message),
            ServerFrame::Malformed { error, .. } => Err(error),
        }
    }
}

impl From<ServerMessage> for ServerFrame {
    fn from(message: ServerMessage) -> Self {
        Self::Message(message)
    }
}

impl Serialize for ServerFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ServerFrame::Message(message) => message.serialize(serializer),
            ServerFrame::Malformed { frame, .. } => frame.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ServerFrame {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let frame = serde_json::Value::deserialize(deserializer)?;
        match ServerMessage::deserialize(&frame) {
            Ok(message) => Ok(Self::Message(message)),
            Err(err) => Ok(Self::Malformed {
                error: err.to_string(),
                frame,
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRoomRequest {
    pub room_id: RoomId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub participants: Vec<Participant>,
    pub snapshot: Option<SessionSnapshot>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_client_messages() -> Result<(), serde_json::Error> {
        let join: ClientMessage =
            serde_json::from_str(r#"{"type":"join","roomId":"abc","displayName":"alice"}"#)?;
        assert_eq!(
            join,
            ClientMessage::Join {
                room_id: "abc".into(),
                display_name: "alice".into()
            }
        );
        let start: ClientMessage =
            serde_json::from_str(r#"{"type":"start-game","kind":"connectfour"}"#)?;
        assert_eq!(
            start,
            ClientMessage::StartGame {
                kind: GameKind::ConnectFour
            }
        );
        assert_eq!(
            serde_json::to_string(&ClientMessage::ResetGame)?,
            r#"{"type":"reset-game"}"#
        );
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"teleport"}"#).is_err());
        Ok(())
    }

    #[test]
    fn test_server_message_tags() -> Result<(), serde_json::Error> {
        let message = ServerMessage::ParticipantLeft {
            participants: vec![],
            reason: LeaveReason::Disconnected,
        };
        let json = serde_json::to_value(&message)?;
        assert_eq!(json["type"], message.name());
        assert_eq!(json["reason"], "disconnected");

        let error = ServerMessage::protocol_error("room is full");
        assert_eq!(
            serde_json::to_string(&error)?,
            r#"{"type":"protocol-error","message":"room is full"}"#
        );
        Ok(())
    }

    #[test]
    fn test_unknown_server_frames_still_decode() -> Result<(), serde_json::Error> {
        let frame: ServerFrame =
            serde_json::from_str(r#"{"type":"protocol-error","message":"room is full"}"#)?;
        assert_eq!(
            frame.into_message(),
            Ok(ServerMessage::protocol_error("room is full"))
        );

        let frame: ServerFrame = serde_json::from_str(r#"{"type":"teleport","to":3}"#)?;
        match &frame {
            ServerFrame::Malformed { frame, error } => {
                assert_eq!(frame["type"], "teleport");
                assert!(error.contains("teleport"));
            }
            other => panic!("unexpected frame {:?}", other),
        }
        // re-encodes as received
        assert_eq!(serde_json::to_string(&frame)?, r#"{"to":3,"type":"teleport"}"#);

        let frame: ServerFrame = serde_json::from_str(r#"{"type":"move-applied"}"#)?;
        assert!(frame.into_message().is_err());

        assert!(serde_json::from_str::<ServerFrame>("not json").is_err());
        Ok(())
    }
}
