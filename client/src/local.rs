//! Single-player game against [`HeuristicOpponent`]. Moves apply immediately;
//! there is no server echo to wait for.

use std::time::Duration;

use game_server::core::{GameKind, GameSession, GameState, Mark, Move, Target};
use heuristic_opponent::HeuristicOpponent;
use rand::rngs::StdRng;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::sync::{SyncError, SyncResult};
use crate::{ClientConfig, GameView};

/// A scheduled computer move. Playing it after it was cancelled, or after the
/// session moved on, does nothing.
#[derive(Clone, Debug)]
pub struct ComputerTurn {
    token: CancellationToken,
    version: u64,
    delay: Duration,
}

impl ComputerTurn {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Sleeps out the delay. Returns `false` when cancelled first.
    pub async fn wait(&self) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(self.delay) => true,
        }
    }
}

pub struct LocalGame<R: Rng = StdRng> {
    session: GameSession,
    human: Mark,
    opponent: HeuristicOpponent<R>,
    delay: Duration,
    pending: Option<CancellationToken>,
}

impl LocalGame {
    /// The human plays the host mark and moves first.
    pub fn new(kind: GameKind, config: &ClientConfig) -> Self {
        Self::with_opponent(
            kind,
            kind.marks().0,
            HeuristicOpponent::new(),
            config.computer_delay(),
        )
    }
}

impl<R: Rng> LocalGame<R> {
    pub fn with_opponent(
        kind: GameKind,
        human: Mark,
        opponent: HeuristicOpponent<R>,
        delay: Duration,
    ) -> Self {
        Self {
            session: GameSession::new(kind),
            human,
            opponent,
            delay,
            pending: None,
        }
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn view(&self) -> GameView<'_> {
        GameView::from(&self.session)
    }

    pub fn human(&self) -> Mark {
        self.human
    }

    pub fn computer(&self) -> Mark {
        self.session.other(self.human)
    }

    pub fn is_computer_turn(&self) -> bool {
        !self.session.is_finished() && self.session.turn() == self.computer()
    }

    pub fn submit_move(&mut self, target: Target) -> SyncResult<GameState> {
        if self.session.is_finished() {
            return Err(SyncError::SessionFinished);
        }
        if self.session.turn() != self.human {
            return Err(SyncError::NotYourTurn);
        }
        Ok(self.session.apply_move(Move::new(self.human, target))?)
    }

    /// Cancels any outstanding computer turn and starts over.
    pub fn reset(&mut self) {
        self.cancel_pending();
        self.session.reset();
    }

    /// Schedules the computer's reply if it is the computer's turn. Any turn
    /// scheduled earlier is cancelled.
    pub fn schedule_computer_move(&mut self) -> Option<ComputerTurn> {
        self.cancel_pending();
        if !self.is_computer_turn() {
            return None;
        }
        let token = CancellationToken::new();
        self.pending = Some(token.clone());
        Some(ComputerTurn {
            token,
            version: self.session.version(),
            delay: self.delay,
        })
    }

    /// Plays a scheduled turn. Returns the target played, if any.
    pub fn play_computer_turn(&mut self, turn: &ComputerTurn) -> Option<Target> {
        if turn.is_cancelled() || turn.version != self.session.version() {
            debug!(version = turn.version, "stale computer turn");
            return None;
        }
        self.pending = None;
        if !self.is_computer_turn() {
            return None;
        }
        let computer = self.computer();
        let target = self.opponent.choose_move(&self.session, computer)?;
        match self.session.apply_move(Move::new(computer, target)) {
            Ok(_) => Some(target),
            Err(err) => {
                warn!(%err, target, "computer chose an illegal move");
                None
            }
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }
}
