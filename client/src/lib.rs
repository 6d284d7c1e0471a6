pub mod config;
pub mod connection;
pub mod local;
pub mod remote;
pub mod sync;

use std::fmt::{Display, Formatter};

use game_server::core::{Board, FinishedState, GameSession, Mark};

pub use config::ClientConfig;
pub use connection::{ConnectionError, ConnectionEvent, RoomConnection};
pub use local::{ComputerTurn, LocalGame};
pub use remote::RemoteGame;
pub use sync::{ConnectionStatus, SessionSynchronizer, SyncError};

/// What a presentation layer needs to draw a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameView<'a> {
    pub board: &'a Board,
    pub turn: Mark,
    pub result: Option<FinishedState>,
}

impl<'a> From<&'a GameSession> for GameView<'a> {
    fn from(session: &'a GameSession) -> Self {
        Self {
            board: session.board(),
            turn: session.turn(),
            result: session.result(),
        }
    }
}

impl Display for GameView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.board)?;
        match self.result {
            None => writeln!(f, "{} to move", self.turn),
            Some(FinishedState::Win(mark)) => writeln!(f, "{} wins", mark),
            Some(FinishedState::Draw) => writeln!(f, "draw"),
        }
    }
}
