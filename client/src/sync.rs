//! Client-side mirror of a room's session.
//!
//! The server owns the canonical [`GameSession`]; the mirror is replaced by
//! every snapshot it broadcasts and is never advanced locally.

use game_server::core::{
    GameError, GameKind, GameSession, Mark, Participant, Role, SessionSnapshot, Target,
};
use game_server::proto::{ClientMessage, RoomId, ServerMessage};
use tracing::{debug, info, warn};

use crate::GameView;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    Timeout,
    Disconnect,
}

/// How the server ended the current session, when it wasn't decided on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionEnding {
    pub reason: EndReason,
    pub winner: Mark,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum SyncError {
    #[error("not connected to the room")]
    NotConnected,
    #[error("no session in progress")]
    NoSession,
    #[error("session is finished")]
    SessionFinished,
    #[error("it's not your turn")]
    NotYourTurn,
    #[error("only the host can {action}")]
    NotHost { action: &'static str },
    #[error("illegal move: {0}")]
    IllegalMove(#[from] GameError),
}

impl SyncError {
    pub fn not_host(action: &'static str) -> Self {
        Self::NotHost { action }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug)]
pub struct SessionSynchronizer {
    room_id: RoomId,
    display_name: String,
    role: Option<Role>,
    status: ConnectionStatus,
    session: Option<GameSession>,
    participants: Vec<Participant>,
    waiting_for_start: bool,
    banner: Option<String>,
    ending: Option<SessionEnding>,
}

impl SessionSynchronizer {
    pub fn new(room_id: impl Into<RoomId>, display_name: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            display_name: display_name.into(),
            role: None,
            status: ConnectionStatus::Connecting,
            session: None,
            participants: Vec::new(),
            waiting_for_start: false,
            banner: None,
            ending: None,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn is_host(&self) -> bool {
        self.role == Some(Role::Host)
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn is_waiting_for_start(&self) -> bool {
        self.waiting_for_start
    }

    /// Last protocol error reported by the server or found in a snapshot.
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn ending(&self) -> Option<SessionEnding> {
        self.ending
    }

    /// Mark of this client in the current session.
    pub fn own_mark(&self) -> Option<Mark> {
        let role = self.role?;
        self.session.as_ref().map(|session| session.mark_for(role))
    }

    pub fn view(&self) -> Option<GameView<'_>> {
        self.session.as_ref().map(GameView::from)
    }

    /// First message of every session stream, reconnects included.
    pub fn join_message(&self) -> ClientMessage {
        ClientMessage::Join {
            room_id: self.room_id.clone(),
            display_name: self.display_name.clone(),
        }
    }

    pub fn on_connected(&mut self) {
        self.status = ConnectionStatus::Connected;
    }

    /// Keeps the last known state; nothing is sent or accepted until reconnected.
    pub fn on_connection_lost(&mut self) {
        if self.status != ConnectionStatus::Disconnected {
            info!(room = %self.room_id, "disconnected from room");
        }
        self.status = ConnectionStatus::Disconnected;
    }

    pub fn handle(&mut self, message: ServerMessage) {
        debug!(message = message.name(), "received");
        match message {
            ServerMessage::Joined { role, participants } => {
                self.role = Some(role);
                self.status = ConnectionStatus::Connected;
                self.banner = None;
                self.set_participants(participants);
                self.waiting_for_start = self.session.is_none();
            }
            ServerMessage::SessionStarted { snapshot }
            | ServerMessage::SessionReset { snapshot } => {
                if self.replace(snapshot) {
                    self.ending = None;
                    self.waiting_for_start = false;
                }
            }
            ServerMessage::MoveApplied { snapshot } => {
                let undecided = snapshot.result.is_none();
                if self.replace(snapshot) && undecided {
                    self.ending = None;
                }
            }
            ServerMessage::ParticipantJoined { participants } => {
                self.set_participants(participants);
            }
            ServerMessage::ParticipantLeft {
                participants,
                reason,
            } => {
                debug!(?reason, "participant left");
                self.set_participants(participants);
                if self.session.is_none() {
                    self.waiting_for_start = false;
                }
            }
            ServerMessage::SessionEndedByTimeout { snapshot, winner } => {
                if self.replace(snapshot) {
                    self.ending = Some(SessionEnding {
                        reason: EndReason::Timeout,
                        winner,
                    });
                }
            }
            ServerMessage::SessionEndedByDisconnect { snapshot, winner } => {
                if self.replace(snapshot) {
                    self.ending = Some(SessionEnding {
                        reason: EndReason::Disconnect,
                        winner,
                    });
                }
            }
            ServerMessage::ProtocolError { message } => {
                warn!(%message, "server reported an error");
                self.banner = Some(message);
            }
        }
    }

    /// A frame the server sent that isn't a known message. Shown like a
    /// protocol error; the mirror is left alone.
    pub fn on_malformed(&mut self, error: String) {
        warn!(%error, "malformed server message");
        self.banner = Some(format!("malformed server message: {}", error));
    }

    /// Builds a move request. The mirror is left alone until the server echoes
    /// the move back.
    pub fn request_move(&self, target: Target) -> SyncResult<ClientMessage> {
        self.ensure_connected()?;
        let session = self.session.as_ref().ok_or(SyncError::NoSession)?;
        if session.is_finished() {
            return Err(SyncError::SessionFinished);
        }
        let own = self.own_mark().ok_or(SyncError::NotConnected)?;
        if session.turn() != own {
            return Err(SyncError::NotYourTurn);
        }
        session.board().check_target(target)?;
        Ok(ClientMessage::MakeMove { target })
    }

    pub fn request_start(&self, kind: GameKind) -> SyncResult<ClientMessage> {
        self.ensure_connected()?;
        if !self.is_host() {
            return Err(SyncError::not_host("start a game"));
        }
        Ok(ClientMessage::StartGame { kind })
    }

    pub fn request_reset(&self) -> SyncResult<ClientMessage> {
        self.ensure_connected()?;
        if !self.is_host() {
            return Err(SyncError::not_host("reset the game"));
        }
        if self.session.is_none() {
            return Err(SyncError::NoSession);
        }
        Ok(ClientMessage::ResetGame)
    }

    fn ensure_connected(&self) -> SyncResult<()> {
        match self.status {
            ConnectionStatus::Connected => Ok(()),
            _ => Err(SyncError::NotConnected),
        }
    }

    /// Host promotion arrives only through the participant list.
    fn set_participants(&mut self, participants: Vec<Participant>) {
        if let Some(me) = participants
            .iter()
            .find(|p| p.display_name() == self.display_name)
        {
            self.role = Some(me.role());
        }
        self.participants = participants;
    }

    fn replace(&mut self, snapshot: SessionSnapshot) -> bool {
        match GameSession::try_from(snapshot) {
            Ok(session) => {
                self.session = Some(session);
                true
            }
            Err(err) => {
                warn!(%err, "rejected snapshot");
                self.banner = Some(format!("invalid snapshot: {}", err));
                false
            }
        }
    }
}

#[cfg(test)]
mod test {
    use game_server::core::{FinishedState, Move};
    use game_server::proto::LeaveReason;

    use super::*;

    fn joined(role: Role) -> ServerMessage {
        let host = Participant::new("alice", Role::Host);
        let guest = Participant::new("bob", Role::Guest);
        ServerMessage::Joined {
            role,
            participants: vec![host, guest],
        }
    }

    fn session_after(kind: GameKind, targets: &[Target]) -> GameSession {
        let mut session = GameSession::new(kind);
        for &target in targets {
            session
                .apply_move(Move::new(session.turn(), target))
                .unwrap();
        }
        session
    }

    fn guest() -> SessionSynchronizer {
        let mut sync = SessionSynchronizer::new("room", "bob");
        sync.on_connected();
        sync.handle(joined(Role::Guest));
        sync.handle(ServerMessage::SessionStarted {
            snapshot: GameSession::new(GameKind::TicTacToe).snapshot(),
        });
        sync
    }

    #[test]
    fn test_join_sets_role_and_waits_for_start() {
        let mut sync = SessionSynchronizer::new("room", "alice");
        assert_eq!(sync.status(), ConnectionStatus::Connecting);
        assert_eq!(
            sync.join_message(),
            ClientMessage::Join {
                room_id: "room".into(),
                display_name: "alice".into()
            }
        );
        sync.handle(joined(Role::Host));
        assert_eq!(sync.role(), Some(Role::Host));
        assert_eq!(sync.status(), ConnectionStatus::Connected);
        assert!(sync.is_waiting_for_start());
        assert!(sync.view().is_none());
    }

    #[test]
    fn test_move_waits_for_echo() {
        let mut sync = guest();
        assert_eq!(sync.own_mark(), Some(Mark::O));
        assert_eq!(sync.request_move(0), Err(SyncError::NotYourTurn));

        sync.handle(ServerMessage::MoveApplied {
            snapshot: session_after(GameKind::TicTacToe, &[4]).snapshot(),
        });
        assert_eq!(
            sync.request_move(0),
            Ok(ClientMessage::MakeMove { target: 0 })
        );
        // no local prediction
        assert_eq!(sync.session().map(|s| s.version()), Some(1));
        assert!(matches!(
            sync.request_move(4),
            Err(SyncError::IllegalMove(GameError::CellIsOccupied { .. }))
        ));
    }

    #[test]
    fn test_last_snapshot_wins() {
        let mut sync = guest();
        let later = session_after(GameKind::TicTacToe, &[4, 0, 8]);
        let earlier = session_after(GameKind::TicTacToe, &[4]);
        sync.handle(ServerMessage::MoveApplied {
            snapshot: later.snapshot(),
        });
        sync.handle(ServerMessage::MoveApplied {
            snapshot: earlier.snapshot(),
        });
        assert_eq!(sync.session(), Some(&earlier));
    }

    #[test]
    fn test_snapshot_replaces_terminal_mirror() {
        let mut sync = guest();
        let won = session_after(GameKind::TicTacToe, &[0, 3, 1, 4, 2]);
        sync.handle(ServerMessage::MoveApplied {
            snapshot: won.snapshot(),
        });
        assert_eq!(sync.request_move(8), Err(SyncError::SessionFinished));
        assert_eq!(
            sync.view().and_then(|v| v.result),
            Some(FinishedState::Win(Mark::X))
        );

        let mut reset = won.clone();
        reset.reset();
        sync.handle(ServerMessage::SessionReset {
            snapshot: reset.snapshot(),
        });
        assert_eq!(sync.view().and_then(|v| v.result), None);

        // a move echo also replaces a decided mirror
        sync.handle(ServerMessage::MoveApplied {
            snapshot: won.snapshot(),
        });
        let replay = session_after(GameKind::TicTacToe, &[4]);
        sync.handle(ServerMessage::MoveApplied {
            snapshot: replay.snapshot(),
        });
        assert_eq!(sync.session(), Some(&replay));
        assert_eq!(sync.request_move(0), Ok(ClientMessage::MakeMove { target: 0 }));
    }

    #[test]
    fn test_undecided_move_echo_clears_ending() {
        let mut sync = guest();
        let mut forfeited = GameSession::new(GameKind::TicTacToe);
        forfeited.forfeit(Mark::X).unwrap();
        sync.handle(ServerMessage::SessionEndedByDisconnect {
            snapshot: forfeited.snapshot(),
            winner: Mark::X,
        });
        assert!(sync.ending().is_some());

        let won = session_after(GameKind::TicTacToe, &[0, 3, 1, 4, 2]);
        sync.handle(ServerMessage::MoveApplied {
            snapshot: won.snapshot(),
        });
        assert!(sync.ending().is_some());

        sync.handle(ServerMessage::MoveApplied {
            snapshot: session_after(GameKind::TicTacToe, &[4]).snapshot(),
        });
        assert_eq!(sync.ending(), None);
        assert_eq!(sync.view().and_then(|v| v.result), None);
    }

    #[test]
    fn test_malformed_message_keeps_session_and_connection() {
        let mut sync = guest();
        let before = sync.session().cloned();
        sync.on_malformed("unknown variant `teleport`".into());
        assert_eq!(
            sync.banner(),
            Some("malformed server message: unknown variant `teleport`")
        );
        assert_eq!(sync.session().cloned(), before);
        assert_eq!(sync.status(), ConnectionStatus::Connected);
    }

    #[test]
    fn test_invalid_snapshot_leaves_state_untouched() {
        let mut sync = guest();
        let before = sync.session().cloned();
        let mut snapshot = session_after(GameKind::TicTacToe, &[4]).snapshot();
        snapshot.board.pop();
        sync.handle(ServerMessage::MoveApplied { snapshot });
        assert_eq!(sync.session().cloned(), before);
        assert!(sync.banner().is_some_and(|b| b.starts_with("invalid snapshot")));
    }

    #[test]
    fn test_protocol_error_sets_banner() {
        let mut sync = guest();
        sync.handle(ServerMessage::protocol_error("it's not your turn"));
        assert_eq!(sync.banner(), Some("it's not your turn"));
        assert!(sync.session().is_some());
    }

    #[test]
    fn test_disconnect_freezes_moves() {
        let mut sync = guest();
        sync.handle(ServerMessage::MoveApplied {
            snapshot: session_after(GameKind::TicTacToe, &[4]).snapshot(),
        });
        sync.on_connection_lost();
        assert_eq!(sync.status(), ConnectionStatus::Disconnected);
        assert_eq!(sync.request_move(0), Err(SyncError::NotConnected));
        assert_eq!(sync.session().map(|s| s.version()), Some(1));

        sync.on_connected();
        assert!(sync.request_move(0).is_ok());
    }

    #[test]
    fn test_only_host_starts_and_resets() {
        let sync = guest();
        assert_eq!(
            sync.request_start(GameKind::ConnectFour),
            Err(SyncError::not_host("start a game"))
        );
        assert_eq!(
            sync.request_reset(),
            Err(SyncError::not_host("reset the game"))
        );

        let mut host = SessionSynchronizer::new("room", "alice");
        host.handle(joined(Role::Host));
        assert_eq!(host.request_reset(), Err(SyncError::NoSession));
        assert_eq!(
            host.request_start(GameKind::ConnectFour),
            Ok(ClientMessage::StartGame {
                kind: GameKind::ConnectFour
            })
        );
    }

    #[test]
    fn test_participant_left_before_session_clears_waiting() {
        let mut sync = SessionSynchronizer::new("room", "bob");
        sync.handle(joined(Role::Guest));
        assert!(sync.is_waiting_for_start());

        // host left, bob is promoted
        sync.handle(ServerMessage::ParticipantLeft {
            participants: vec![Participant::new("bob", Role::Host)],
            reason: LeaveReason::Left,
        });
        assert!(!sync.is_waiting_for_start());
        assert!(sync.is_host());
        assert_eq!(sync.participants().len(), 1);
    }

    #[test]
    fn test_session_endings() {
        let mut sync = guest();
        let mut session = GameSession::new(GameKind::TicTacToe);
        session.forfeit(Mark::O).unwrap();
        sync.handle(ServerMessage::SessionEndedByTimeout {
            snapshot: session.snapshot(),
            winner: Mark::O,
        });
        assert_eq!(
            sync.ending(),
            Some(SessionEnding {
                reason: EndReason::Timeout,
                winner: Mark::O
            })
        );

        sync.handle(ServerMessage::SessionStarted {
            snapshot: GameSession::new(GameKind::TicTacToe).snapshot(),
        });
        assert_eq!(sync.ending(), None);
    }
}
