use generic_array::typenum::{U6, U7};

use super::{Cell, FinishedState, Grid, GridIndex, Mark, Target};

pub const ROWS: usize = 6;
pub const COLUMNS: usize = 7;
pub const WIN_LENGTH: usize = 4;

pub type Field = Grid<Cell, U6, U7>;

/// Row where a piece dropped into `column` comes to rest.
/// Scans from the bottom row upward; `None` when the column is full
/// or doesn't exist.
pub fn drop_target_row(field: &Field, column: Target) -> Option<usize> {
    if column >= COLUMNS {
        return None;
    }
    (0..ROWS)
        .rev()
        .find(|&row| field[GridIndex::new(row, column)].is_none())
}

fn is_line<'a>(cells: impl Iterator<Item = &'a Cell>, mark: Mark) -> bool {
    cells
        .take_while(|cell| ***cell == Some(mark))
        .take(WIN_LENGTH)
        .count()
        == WIN_LENGTH
}

/// Returns the result of a 6×7 field, or `None` while the game goes on.
pub fn evaluate(field: &Field) -> Option<FinishedState> {
    for (index, cell) in field.all_indexed() {
        let Some(mark) = **cell else {
            continue;
        };
        if is_line(field.right_iter(index), mark)
            || is_line(field.bottom_iter(index), mark)
            || is_line(field.bottom_right_iter(index), mark)
            || is_line(field.top_right_iter(index), mark)
        {
            return Some(FinishedState::Win(mark));
        }
    }

    // pieces only stack, so a full top row means a full field
    if field.right_iter(GridIndex::new(0, 0)).all(|cell| cell.is_some()) {
        return Some(FinishedState::Draw);
    }

    None
}
