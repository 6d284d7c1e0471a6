//! One-ply computer opponent: win if possible, otherwise block, otherwise
//! take the 3×3 center, otherwise play anywhere.

use game_server::core::{Board, FinishedState, GameSession, Mark, Target};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Returns the first target (in ascending order) where `mark` wins immediately.
fn winning_target(board: &Board, targets: &[Target], mark: Mark) -> Option<Target> {
    targets.iter().copied().find(|&target| {
        matches!(
            board.place(target, mark).map(|next| next.evaluate()),
            Ok(Some(FinishedState::Win(winner))) if winner == mark
        )
    })
}

pub struct HeuristicOpponent<R: Rng = StdRng> {
    rng: R,
}

impl Default for HeuristicOpponent {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicOpponent {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl<R: Rng> HeuristicOpponent<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Picks a target for `own` on the session's board.
    /// Returns `None` only when nothing is playable.
    pub fn choose_move(&mut self, session: &GameSession, own: Mark) -> Option<Target> {
        let board = session.board();
        let targets = board.playable_targets();
        if targets.is_empty() {
            return None;
        }

        if let Some(target) = winning_target(board, &targets, own) {
            debug!(target, "taking the win");
            return Some(target);
        }
        if let Some(target) = winning_target(board, &targets, session.other(own)) {
            debug!(target, "blocking");
            return Some(target);
        }
        if let Some(center) = board.center() {
            return Some(center);
        }

        let index = self.rng.gen_range(0..targets.len());
        Some(targets[index])
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use game_server::core::{GameKind, GameResult, Move};
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn opponent() -> HeuristicOpponent<ChaCha8Rng> {
        HeuristicOpponent::with_rng(ChaCha8Rng::seed_from_u64(7))
    }

    fn play(kind: GameKind, targets: &[Target]) -> GameResult<GameSession> {
        let mut session = GameSession::new(kind);
        for &target in targets {
            session.apply_move(Move::new(session.turn(), target))?;
        }
        Ok(session)
    }

    #[test]
    fn test_takes_center_on_empty_board() {
        let session = GameSession::new(GameKind::TicTacToe);
        assert_eq!(opponent().choose_move(&session, Mark::X), Some(4));
    }

    #[test]
    fn test_prefers_win_over_block() -> GameResult<()> {
        // X X . / O O . / . . .  with X to move
        let session = play(GameKind::TicTacToe, &[0, 3, 1, 4])?;
        assert_eq!(opponent().choose_move(&session, Mark::X), Some(2));
        Ok(())
    }

    #[test]
    fn test_blocks_opponent() -> GameResult<()> {
        // X X . / . O . / . . .  with O to move
        let session = play(GameKind::TicTacToe, &[0, 4, 1])?;
        assert_eq!(opponent().choose_move(&session, Mark::O), Some(2));
        Ok(())
    }

    #[test]
    fn test_own_win_beats_block() -> GameResult<()> {
        // X . X / O O . / X . .  with O to move: winning at 5 beats blocking at 1
        let session = play(GameKind::TicTacToe, &[0, 3, 2, 4, 6])?;
        assert_eq!(opponent().choose_move(&session, Mark::O), Some(5));
        Ok(())
    }

    #[test]
    fn test_connect_four_win_and_block() -> GameResult<()> {
        // red stacks three in column 2, yellow three in column 5
        let session = play(GameKind::ConnectFour, &[2, 5, 2, 5, 2, 5])?;
        assert_eq!(opponent().choose_move(&session, Mark::Red), Some(2));

        let session = play(GameKind::ConnectFour, &[2, 5, 2, 5, 2])?;
        assert_eq!(opponent().choose_move(&session, Mark::Yellow), Some(2));
        Ok(())
    }

    #[test]
    fn test_random_choice_stays_playable() -> GameResult<()> {
        let mut opponent = opponent();
        let session = play(GameKind::ConnectFour, &[0, 0, 0, 0, 0, 0])?;
        let mut seen = HashSet::new();
        for _ in 0..50 {
            let target = opponent
                .choose_move(&session, Mark::Red)
                .expect("board has room");
            assert!(session.board().is_playable(target));
            seen.insert(target);
        }
        assert!(!seen.contains(&0));
        assert!(seen.len() > 1);
        Ok(())
    }

    #[test]
    fn test_full_board_has_no_move() -> GameResult<()> {
        let session = play(GameKind::TicTacToe, &[0, 1, 2, 4, 3, 5, 7, 6, 8])?;
        assert_eq!(opponent().choose_move(&session, Mark::O), None);
        Ok(())
    }
}
