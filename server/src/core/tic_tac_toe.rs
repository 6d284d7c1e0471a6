use generic_array::typenum::U3;

use super::{Cell, FinishedState, Grid, GridIndex, Target};

pub const SIDE: usize = 3;

pub type Field = Grid<Cell, U3, U3>;

/// Maps a cell index (`row * 3 + col`) onto the field.
pub fn index_of(target: Target) -> Option<GridIndex> {
    if target >= SIDE * SIDE {
        return None;
    }
    Some(GridIndex::new(target / SIDE, target % SIDE))
}

pub fn target_of(index: GridIndex) -> Target {
    index.row() * SIDE + index.col()
}

fn winning_combinations() -> [[GridIndex; 3]; 8] {
    let at = |row, col| GridIndex::new(row, col);
    [
        [at(0, 0), at(0, 1), at(0, 2)],
        [at(1, 0), at(1, 1), at(1, 2)],
        [at(2, 0), at(2, 1), at(2, 2)],
        [at(0, 0), at(1, 0), at(2, 0)],
        [at(0, 1), at(1, 1), at(2, 1)],
        [at(0, 2), at(1, 2), at(2, 2)],
        [at(0, 0), at(1, 1), at(2, 2)],
        [at(2, 0), at(1, 1), at(0, 2)],
    ]
}

/// Returns the result of a 3×3 field, or `None` while the game goes on.
pub fn evaluate(field: &Field) -> Option<FinishedState> {
    for [idx1, idx2, idx3] in winning_combinations() {
        if let (Some(s1), Some(s2), Some(s3)) = (*field[idx1], *field[idx2], *field[idx3]) {
            if s1 == s2 && s2 == s3 {
                return Some(FinishedState::Win(s1));
            }
        }
    }

    if field.iter().flatten().all(|cell| cell.is_some()) {
        return Some(FinishedState::Draw);
    }

    None
}
