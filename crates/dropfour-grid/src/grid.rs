//! The 6×7 playing field.
//!
//! Two invariants hold for every reachable grid:
//! - a non-empty cell never becomes empty again;
//! - gravity: every cell below an occupied cell (same column, greater row
//!   index) is occupied.
//!
//! Only [`Grid::place`] mutates cells, and it preserves both.

use dropfour_types::{
    DropfourError, GridCell, GridSnapshot, Result, Token,
    constants::{COLS, ROWS},
};

use crate::win;

/// Fixed-size matrix of cells. Row 0 is the top row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    cells: GridSnapshot,
}

impl Grid {
    /// An empty grid.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cells: [[GridCell::Empty; COLS]; ROWS],
        }
    }

    /// Rebuild a grid from a snapshot, checking the gravity invariant.
    ///
    /// # Errors
    /// `InvalidState` if any occupied cell floats above an empty one.
    pub fn from_snapshot(cells: GridSnapshot) -> Result<Self> {
        for col in 0..COLS {
            for row in 0..ROWS - 1 {
                if !cells[row][col].is_empty() && cells[row + 1][col].is_empty() {
                    return Err(DropfourError::InvalidState {
                        reason: format!("cell ({row}, {col}) is above an empty cell"),
                    });
                }
            }
        }
        Ok(Self { cells })
    }

    /// Drop `token` into `column`.
    ///
    /// Scans from the bottom row upwards and occupies the first empty cell.
    /// Returns the row index that was filled.
    ///
    /// # Errors
    /// - `InvalidColumn` if `column >= COLS`
    /// - `ColumnFull` if the column has no empty cell (grid unchanged)
    pub fn place(&mut self, column: usize, token: Token) -> Result<usize> {
        if column >= COLS {
            return Err(DropfourError::InvalidColumn { column });
        }
        let row = (0..ROWS)
            .rev()
            .find(|&row| self.cells[row][column].is_empty())
            .ok_or(DropfourError::ColumnFull { column })?;
        self.cells[row][column] = GridCell::from(token);
        Ok(row)
    }

    /// True iff the top row has no empty cell, i.e. no column has room.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.cells[0].iter().all(|cell| !cell.is_empty())
    }

    /// Whether `token` has four consecutive cells in any orientation.
    #[must_use]
    pub fn has_four_in_a_row(&self, token: Token) -> bool {
        win::has_four_in_a_row(&self.cells, token)
    }

    /// Cell at `(row, col)`, or `None` outside the grid.
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> Option<GridCell> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Number of tokens in `column` (0 for an unknown column).
    #[must_use]
    pub fn column_height(&self, column: usize) -> usize {
        if column >= COLS {
            return 0;
        }
        self.cells
            .iter()
            .filter(|row| !row[column].is_empty())
            .count()
    }

    /// Whether `column` can take another token.
    #[must_use]
    pub fn has_room(&self, column: usize) -> bool {
        column < COLS && self.cells[0][column].is_empty()
    }

    /// Total number of tokens on the grid.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|cell| !cell.is_empty())
            .count()
    }

    /// Copy of the cells for the view model.
    #[must_use]
    pub fn snapshot(&self) -> GridSnapshot {
        self.cells
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}
