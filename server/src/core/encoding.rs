use generic_array::ArrayLength;
use serde::{Deserialize, Serialize};

use super::{Board, BoardCell, FinishedState, GameKind, GameSession, Grid, GridIndex, Mark};

pub type SnapshotResult<T> = Result<T, SnapshotError>;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum SnapshotError {
    #[error("invalid board length: expected={expected}, found={found}")]
    InvalidBoardLength { expected: usize, found: usize },
    #[error("invalid length of row {row}: expected={expected}, found={found}")]
    InvalidRowLength {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("mark {mark} doesn't belong to {kind}")]
    ForeignMark { mark: Mark, kind: GameKind },
    #[error("host/guest marks {host}/{guest} don't match {kind}")]
    MarksMismatch {
        host: Mark,
        guest: Mark,
        kind: GameKind,
    },
    #[error("piece at row {row}, column {col} has nothing below it")]
    FloatingPiece { row: usize, col: usize },
    #[error("result {result:?} doesn't match the board ({board:?})")]
    ResultMismatch {
        result: Option<FinishedState>,
        board: Option<FinishedState>,
    },
}

/// Complete state of a session as it travels over the wire.
/// Receivers replace their whole mirror with it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub kind: GameKind,
    /// Rows top to bottom.
    pub board: Vec<Vec<Option<Mark>>>,
    pub turn: Mark,
    pub result: Option<FinishedState>,
    pub host: Mark,
    pub guest: Mark,
    pub version: u64,
}

impl From<&GameSession> for SessionSnapshot {
    fn from(session: &GameSession) -> Self {
        Self {
            kind: session.kind(),
            board: session.board().rows(),
            turn: session.turn(),
            result: session.result(),
            host: session.host_mark(),
            guest: session.guest_mark(),
            version: session.version(),
        }
    }
}

impl TryFrom<SessionSnapshot> for GameSession {
    type Error = SnapshotError;

    fn try_from(snapshot: SessionSnapshot) -> Result<Self, Self::Error> {
        let kind = snapshot.kind;
        if (snapshot.host, snapshot.guest) != kind.marks() {
            return Err(SnapshotError::MarksMismatch {
                host: snapshot.host,
                guest: snapshot.guest,
                kind,
            });
        }
        let check_mark = |mark: Mark| {
            if kind.uses_mark(mark) {
                Ok(mark)
            } else {
                Err(SnapshotError::ForeignMark { mark, kind })
            }
        };
        let turn = check_mark(snapshot.turn)?;
        if let Some(FinishedState::Win(winner)) = snapshot.result {
            check_mark(winner)?;
        }

        let board = match kind {
            GameKind::TicTacToe => Board::TicTacToe(fill(&snapshot.board, kind)?),
            GameKind::ConnectFour => {
                let field = fill(&snapshot.board, kind)?;
                check_gravity(&snapshot.board)?;
                Board::ConnectFour(field)
            }
        };
        // a forfeit decides a session the board leaves open, never the other way round
        let decided = board.evaluate();
        match (decided, snapshot.result) {
            (Some(found), result) if result != Some(found) => {
                return Err(SnapshotError::ResultMismatch {
                    result,
                    board: decided,
                })
            }
            (None, Some(FinishedState::Draw)) => {
                return Err(SnapshotError::ResultMismatch {
                    result: snapshot.result,
                    board: None,
                })
            }
            _ => {}
        }
        Ok(GameSession::from_parts(
            board,
            turn,
            snapshot.result,
            snapshot.version,
        ))
    }
}

fn fill<R: ArrayLength, C: ArrayLength>(
    rows: &[Vec<Option<Mark>>],
    kind: GameKind,
) -> SnapshotResult<Grid<BoardCell<Mark>, R, C>> {
    let mut grid = Grid::<BoardCell<Mark>, R, C>::default();
    let expected_rows = Grid::<BoardCell<Mark>, R, C>::rows();
    let expected_cols = Grid::<BoardCell<Mark>, R, C>::cols();
    if rows.len() != expected_rows {
        return Err(SnapshotError::InvalidBoardLength {
            expected: expected_rows,
            found: rows.len(),
        });
    }
    for (row, cells) in rows.iter().enumerate() {
        if cells.len() != expected_cols {
            return Err(SnapshotError::InvalidRowLength {
                row,
                expected: expected_cols,
                found: cells.len(),
            });
        }
        for (col, cell) in cells.iter().enumerate() {
            if let Some(mark) = *cell {
                if !kind.uses_mark(mark) {
                    return Err(SnapshotError::ForeignMark { mark, kind });
                }
            }
            grid[GridIndex::new(row, col)] = BoardCell(*cell);
        }
    }
    Ok(grid)
}

/// Every piece rests on the bottom row or on another piece.
fn check_gravity(rows: &[Vec<Option<Mark>>]) -> SnapshotResult<()> {
    for (row, pair) in rows.windows(2).enumerate() {
        let (cells, below) = (&pair[0], &pair[1]);
        for (col, (cell, under)) in cells.iter().zip(below).enumerate() {
            if cell.is_some() && under.is_none() {
                return Err(SnapshotError::FloatingPiece { row, col });
            }
        }
    }
    Ok(())
}
