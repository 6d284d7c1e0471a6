pub mod connect_four;
pub mod tic_tac_toe;

mod board;
mod encoding;
mod error;
mod grid;
mod participant;
mod session;

use std::fmt::{Display, Formatter};
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

pub use board::Board;
pub use encoding::{SessionSnapshot, SnapshotError, SnapshotResult};
pub use error::GameError;
pub use grid::{Grid, GridIndex};
pub use participant::{ConnectionState, Participant, Role};
pub use session::GameSession;

pub type GameResult<T> = Result<T, GameError>;

/// Cell index for Tic-Tac-Toe (`row * 3 + col`) or column for Connect Four.
pub type Target = usize;

/// Symbol identifying a participant's pieces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
    #[serde(rename = "R")]
    Red,
    #[serde(rename = "Y")]
    Yellow,
}

impl Display for Mark {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Mark::X => "X",
            Mark::O => "O",
            Mark::Red => "R",
            Mark::Yellow => "Y",
        };
        f.write_str(s)
    }
}

impl Mark {
    /// The mark playing against `self` in the same kind of game.
    pub fn opponent(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
            Mark::Red => Mark::Yellow,
            Mark::Yellow => Mark::Red,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    TicTacToe,
    ConnectFour,
}

impl Display for GameKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GameKind::TicTacToe => f.write_str("tictactoe"),
            GameKind::ConnectFour => f.write_str("connectfour"),
        }
    }
}

impl GameKind {
    /// Host and guest marks, in that order. The host always moves first.
    pub fn marks(self) -> (Mark, Mark) {
        match self {
            GameKind::TicTacToe => (Mark::X, Mark::O),
            GameKind::ConnectFour => (Mark::Red, Mark::Yellow),
        }
    }

    pub fn uses_mark(self, mark: Mark) -> bool {
        let (host, guest) = self.marks();
        mark == host || mark == guest
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoardCell<T>(pub Option<T>);

impl<T> Default for BoardCell<T> {
    fn default() -> Self {
        Self(Option::default())
    }
}

impl<T: Display> Display for BoardCell<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(val) => write!(f, "[{}]", val),
            None => f.write_str("[ ]"),
        }
    }
}

impl<T> From<T> for BoardCell<T> {
    fn from(value: T) -> Self {
        Self(Option::from(value))
    }
}

impl<T> Deref for BoardCell<T> {
    type Target = Option<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for BoardCell<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

pub type Cell = BoardCell<Mark>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishedState {
    Win(Mark),
    Draw,
}

/// Either the mark expected to move next or the final result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameState {
    Turn(Mark),
    Finished(FinishedState),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Move {
    actor: Mark,
    target: Target,
}

impl Move {
    pub fn new(actor: Mark, target: Target) -> Self {
        Self { actor, target }
    }

    pub fn actor(&self) -> Mark {
        self.actor
    }

    pub fn target(&self) -> Target {
        self.target
    }
}
