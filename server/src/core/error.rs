use super::{Mark, Target};

/// Reasons a move (or forfeit) is refused by the session state machine.
/// Every variant is an illegal move: the session is left unchanged.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum GameError {
    #[error("can't make turn on a finished game")]
    GameIsFinished,
    #[error("other player's turn (expected: {expected}, found: {found})")]
    NotYourTurn { expected: Mark, found: Mark },
    #[error("cell {target} is occupied")]
    CellIsOccupied { target: Target },
    #[error("column {target} is full")]
    ColumnIsFull { target: Target },
    #[error("invalid target (expected: 0-{max_expected}, found: {found})")]
    TargetOutOfRange { max_expected: Target, found: Target },
    #[error("mark {mark} doesn't take part in this game")]
    ForeignMark { mark: Mark },
}

impl GameError {
    pub fn not_your_turn(expected: Mark, found: Mark) -> Self {
        Self::NotYourTurn { expected, found }
    }

    pub fn cell_is_occupied(target: Target) -> Self {
        Self::CellIsOccupied { target }
    }

    pub fn column_is_full(target: Target) -> Self {
        Self::ColumnIsFull { target }
    }

    pub fn target_out_of_range(max_expected: Target, found: Target) -> Self {
        Self::TargetOutOfRange {
            max_expected,
            found,
        }
    }
}
