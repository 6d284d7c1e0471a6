use std::fmt::{Display, Formatter};

use super::{
    connect_four, tic_tac_toe, BoardCell, FinishedState, GameError, GameKind, GameResult,
    GridIndex, Mark, Target,
};

/// Playing field of either game kind.
///
/// Boards are values: [`Board::place`] returns a new board and never
/// touches the one it was called on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Board {
    TicTacToe(tic_tac_toe::Field),
    ConnectFour(connect_four::Field),
}

impl Display for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Board::TicTacToe(field) => Display::fmt(field, f),
            Board::ConnectFour(field) => Display::fmt(field, f),
        }
    }
}

impl Board {
    pub fn create_empty(kind: GameKind) -> Self {
        match kind {
            GameKind::TicTacToe => Board::TicTacToe(Default::default()),
            GameKind::ConnectFour => Board::ConnectFour(Default::default()),
        }
    }

    pub fn kind(&self) -> GameKind {
        match self {
            Board::TicTacToe(_) => GameKind::TicTacToe,
            Board::ConnectFour(_) => GameKind::ConnectFour,
        }
    }

    /// Number of distinct move targets: cells for Tic-Tac-Toe, columns for Connect Four.
    pub fn target_count(&self) -> usize {
        match self {
            Board::TicTacToe(_) => tic_tac_toe::SIDE * tic_tac_toe::SIDE,
            Board::ConnectFour(_) => connect_four::COLUMNS,
        }
    }

    /// Cell a mark played at `target` would occupy, if the target is playable.
    pub fn landing(&self, target: Target) -> Option<GridIndex> {
        match self {
            Board::TicTacToe(field) => {
                tic_tac_toe::index_of(target).filter(|&index| field[index].is_none())
            }
            Board::ConnectFour(field) => connect_four::drop_target_row(field, target)
                .map(|row| GridIndex::new(row, target)),
        }
    }

    pub fn is_playable(&self, target: Target) -> bool {
        self.landing(target).is_some()
    }

    /// Like [`Board::landing`] but explains why a target can't be played.
    pub fn check_target(&self, target: Target) -> GameResult<GridIndex> {
        if target >= self.target_count() {
            return Err(GameError::target_out_of_range(
                self.target_count() - 1,
                target,
            ));
        }
        self.landing(target).ok_or(match self {
            Board::TicTacToe(_) => GameError::cell_is_occupied(target),
            Board::ConnectFour(_) => GameError::column_is_full(target),
        })
    }

    /// Returns a new board with `mark` placed at `target`.
    pub fn place(&self, target: Target, mark: Mark) -> GameResult<Board> {
        if !self.kind().uses_mark(mark) {
            return Err(GameError::ForeignMark { mark });
        }
        let index = self.check_target(target)?;
        let cell = BoardCell::from(mark);
        let board = match self {
            Board::TicTacToe(field) => Board::TicTacToe(field.with(index, cell)),
            Board::ConnectFour(field) => Board::ConnectFour(field.with(index, cell)),
        };
        Ok(board)
    }

    /// Row a piece dropped into `column` would land in. Always `None` for Tic-Tac-Toe.
    pub fn drop_target_row(&self, column: Target) -> Option<usize> {
        match self {
            Board::TicTacToe(_) => None,
            Board::ConnectFour(field) => connect_four::drop_target_row(field, column),
        }
    }

    /// Playable targets in ascending order.
    pub fn playable_targets(&self) -> Vec<Target> {
        (0..self.target_count())
            .filter(|&target| self.is_playable(target))
            .collect()
    }

    /// The 3×3 center, when it is still free.
    pub fn center(&self) -> Option<Target> {
        match self {
            Board::TicTacToe(field) => {
                let center = GridIndex::new(1, 1);
                field[center]
                    .is_none()
                    .then(|| tic_tac_toe::target_of(center))
            }
            Board::ConnectFour(_) => None,
        }
    }

    pub fn count(&self, mark: Mark) -> usize {
        self.rows()
            .iter()
            .flatten()
            .filter(|cell| **cell == Some(mark))
            .count()
    }

    /// Row-major dump of the cells, top row first.
    pub fn rows(&self) -> Vec<Vec<Option<Mark>>> {
        match self {
            Board::TicTacToe(field) => field
                .iter()
                .map(|row| row.iter().map(|cell| cell.0).collect())
                .collect(),
            Board::ConnectFour(field) => field
                .iter()
                .map(|row| row.iter().map(|cell| cell.0).collect())
                .collect(),
        }
    }

    pub fn evaluate(&self) -> Option<FinishedState> {
        match self {
            Board::TicTacToe(field) => tic_tac_toe::evaluate(field),
            Board::ConnectFour(field) => connect_four::evaluate(field),
        }
    }
}
