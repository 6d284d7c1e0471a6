use tracing::debug;

use super::{
    Board, FinishedState, GameError, GameKind, GameResult, GameState, Mark, Move, Role,
    SessionSnapshot,
};

/// One game between a host and a guest.
///
/// All board changes go through [`GameSession::apply_move`]; [`GameSession::reset`]
/// and [`GameSession::forfeit`] are the only other transitions. Each of them bumps
/// `version`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameSession {
    board: Board,
    turn: Mark,
    result: Option<FinishedState>,
    host: Mark,
    guest: Mark,
    version: u64,
}

impl GameSession {
    pub fn new(kind: GameKind) -> Self {
        let (host, guest) = kind.marks();
        Self {
            board: Board::create_empty(kind),
            turn: host,
            result: None,
            host,
            guest,
            version: 0,
        }
    }

    pub(super) fn from_parts(
        board: Board,
        turn: Mark,
        result: Option<FinishedState>,
        version: u64,
    ) -> Self {
        let (host, guest) = board.kind().marks();
        Self {
            board,
            turn,
            result,
            host,
            guest,
            version,
        }
    }

    pub fn kind(&self) -> GameKind {
        self.board.kind()
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Mark to move. Frozen at its last value once the session is decided.
    pub fn turn(&self) -> Mark {
        self.turn
    }

    pub fn result(&self) -> Option<FinishedState> {
        self.result
    }

    pub fn host_mark(&self) -> Mark {
        self.host
    }

    pub fn guest_mark(&self) -> Mark {
        self.guest
    }

    pub fn mark_for(&self, role: Role) -> Mark {
        match role {
            Role::Host => self.host,
            Role::Guest => self.guest,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn state(&self) -> GameState {
        match self.result {
            Some(result) => GameState::Finished(result),
            None => GameState::Turn(self.turn),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    pub fn has_mark(&self, mark: Mark) -> bool {
        mark == self.host || mark == self.guest
    }

    /// The other mark of this session.
    pub fn other(&self, mark: Mark) -> Mark {
        if mark == self.host {
            self.guest
        } else {
            self.host
        }
    }

    /// Validates and applies a move. On error the session is left unchanged.
    pub fn apply_move(&mut self, mv: Move) -> GameResult<GameState> {
        if self.is_finished() {
            return Err(GameError::GameIsFinished);
        }
        if mv.actor() != self.turn {
            return Err(GameError::not_your_turn(self.turn, mv.actor()));
        }

        let board = self.board.place(mv.target(), mv.actor())?;
        let result = board.evaluate();

        self.board = board;
        self.result = result;
        if result.is_none() {
            self.turn = self.other(self.turn);
        }
        self.version += 1;

        debug!(actor = %mv.actor(), target = mv.target(), version = self.version, "move applied");
        Ok(self.state())
    }

    /// Ends an undecided session in favour of `winner` without touching the board.
    pub fn forfeit(&mut self, winner: Mark) -> GameResult<GameState> {
        if self.is_finished() {
            return Err(GameError::GameIsFinished);
        }
        if !self.has_mark(winner) {
            return Err(GameError::ForeignMark { mark: winner });
        }
        self.result = Some(FinishedState::Win(winner));
        self.version += 1;

        debug!(%winner, version = self.version, "session forfeited");
        Ok(self.state())
    }

    /// Clears the board and gives the first move back to the host.
    pub fn reset(&mut self) {
        self.board = Board::create_empty(self.kind());
        self.turn = self.host;
        self.result = None;
        self.version += 1;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::from(self)
    }
}
