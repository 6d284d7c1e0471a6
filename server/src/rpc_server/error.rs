use std::sync::PoisonError;

use tokio::sync::mpsc::error::SendError;
use tonic::Status;

use crate::core::GameError;
use crate::proto::{RoomId, ServerMessage};

#[derive(thiserror::Error, Debug)]
pub enum RpcError {
    #[error("received an empty request")]
    EmptyRequest,
    #[error("unexpected request: expected {expected}, found: {found}")]
    UnexpectedRequest { expected: String, found: String },
    #[error("display name must not be empty")]
    EmptyDisplayName,
    #[error("room with this id doesn't exist: {id}")]
    NoSuchRoom { id: RoomId },
    #[error("room is full")]
    RoomFull,
    #[error("`{name}` is already connected to this room")]
    NameTaken { name: String },
    #[error("only the host can {action}")]
    NotHost { action: &'static str },
    #[error("waiting for an opponent to join")]
    NoOpponent,
    #[error("no game in progress")]
    NoSession,
    #[error("connection doesn't belong to this room")]
    ForeignConnection,
    #[error("failed to lock inner mutex: {reason}")]
    MutexPoison { reason: String },
    #[error("failed to send data over channel: {reason}")]
    ChannelSendFailed { reason: String },
    #[error("failed to read from input stream: {0}")]
    StreamingRequestReadFailed(#[from] Status),
    #[error("worker is not running")]
    WorkerDown,
    #[error("illegal move: {0}")]
    GameError(#[from] GameError),
}

impl<T> From<PoisonError<T>> for RpcError {
    fn from(value: PoisonError<T>) -> Self {
        Self::MutexPoison {
            reason: value.to_string(),
        }
    }
}

impl<T> From<SendError<T>> for RpcError {
    fn from(value: SendError<T>) -> Self {
        Self::ChannelSendFailed {
            reason: value.to_string(),
        }
    }
}

impl From<RpcError> for Status {
    fn from(value: RpcError) -> Self {
        match value {
            RpcError::StreamingRequestReadFailed(status) => status,
            RpcError::EmptyRequest | RpcError::EmptyDisplayName => {
                Status::invalid_argument(value.to_string())
            }
            RpcError::UnexpectedRequest { .. }
            | RpcError::NoOpponent
            | RpcError::NoSession
            | RpcError::GameError(_) => Status::failed_precondition(value.to_string()),
            RpcError::NoSuchRoom { .. } => Status::not_found(value.to_string()),
            RpcError::RoomFull => Status::resource_exhausted(value.to_string()),
            RpcError::NameTaken { .. } => Status::already_exists(value.to_string()),
            RpcError::NotHost { .. } | RpcError::ForeignConnection => {
                Status::permission_denied(value.to_string())
            }
            RpcError::MutexPoison { .. }
            | RpcError::ChannelSendFailed { .. }
            | RpcError::WorkerDown => Status::internal(value.to_string()),
        }
    }
}

impl From<&RpcError> for ServerMessage {
    fn from(value: &RpcError) -> Self {
        ServerMessage::protocol_error(value.to_string())
    }
}

impl RpcError {
    pub fn unexpected_request(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::UnexpectedRequest {
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn not_host(action: &'static str) -> Self {
        Self::NotHost { action }
    }
}

#[cfg(test)]
mod test {
    use tonic::Code;

    use super::*;
    use crate::core::Mark;

    #[test]
    fn test_status_codes() {
        assert_eq!(Status::from(RpcError::EmptyRequest).code(), Code::InvalidArgument);
        assert_eq!(
            Status::from(RpcError::unexpected_request("join", "leave")).code(),
            Code::FailedPrecondition
        );
        assert_eq!(
            Status::from(RpcError::NoSuchRoom { id: "x".into() }).code(),
            Code::NotFound
        );
    }

    #[test]
    fn test_protocol_error_message() {
        let err = RpcError::GameError(GameError::not_your_turn(Mark::X, Mark::O));
        assert_eq!(
            ServerMessage::from(&err),
            ServerMessage::protocol_error(
                "illegal move: other player's turn (expected: X, found: O)"
            )
        );
        assert_eq!(
            ServerMessage::from(&RpcError::RoomFull),
            ServerMessage::protocol_error("room is full")
        );
    }
}
