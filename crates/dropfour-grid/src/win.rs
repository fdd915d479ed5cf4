//! Four-in-a-row detection.
//!
//! Every cell is treated as the origin of four rays: →, ↓, ↘ and ↙. Those
//! four cover every orientation once (their opposites are the same lines
//! read from the other end). A ray stops at the grid edge, so no bounds
//! pre-checks are needed per direction. The scan is O(ROWS·COLS) and runs
//! once per applied move.

use dropfour_types::{
    GridCell, GridSnapshot, Token,
    constants::{COLS, ROWS, WIN_LENGTH},
};

/// Ray directions scanned from each origin cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Same row, increasing column.
    Right,
    /// Same column, increasing row (downwards).
    Down,
    /// Increasing row and column.
    DownRight,
    /// Increasing row, decreasing column.
    DownLeft,
}

impl Direction {
    pub const ALL: [Self; 4] = [Self::Right, Self::Down, Self::DownRight, Self::DownLeft];

    /// The next cell along this direction, or `None` past the grid edge.
    #[must_use]
    pub fn step(self, (row, col): (usize, usize)) -> Option<(usize, usize)> {
        let (row, col) = match self {
            Self::Right => (row, col + 1),
            Self::Down => (row + 1, col),
            Self::DownRight => (row + 1, col + 1),
            Self::DownLeft => (row + 1, col.checked_sub(1)?),
        };
        (row < ROWS && col < COLS).then_some((row, col))
    }
}

/// Whether `token` has `WIN_LENGTH` consecutive cells anywhere on the grid.
///
/// Short-circuits on the first complete line.
#[must_use]
pub fn has_four_in_a_row(cells: &GridSnapshot, token: Token) -> bool {
    winning_line(cells, token).is_some()
}

/// The first complete line of `token`, as cell coordinates from its origin.
#[must_use]
pub fn winning_line(cells: &GridSnapshot, token: Token) -> Option<[(usize, usize); WIN_LENGTH]> {
    let target = GridCell::from(token);
    for row in 0..ROWS {
        for col in 0..COLS {
            if cells[row][col] != target {
                continue;
            }
            for direction in Direction::ALL {
                if let Some(line) = line_from(cells, (row, col), direction, target) {
                    return Some(line);
                }
            }
        }
    }
    None
}

fn line_from(
    cells: &GridSnapshot,
    origin: (usize, usize),
    direction: Direction,
    target: GridCell,
) -> Option<[(usize, usize); WIN_LENGTH]> {
    let mut line = [origin; WIN_LENGTH];
    let mut pos = origin;
    for slot in line.iter_mut().skip(1) {
        pos = direction.step(pos)?;
        if cells[pos.0][pos.1] != target {
            return None;
        }
        *slot = pos;
    }
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> GridSnapshot {
        [[GridCell::Empty; COLS]; ROWS]
    }

    fn with(cells: &[(usize, usize)], token: Token) -> GridSnapshot {
        let mut grid = empty();
        for &(r, c) in cells {
            grid[r][c] = GridCell::from(token);
        }
        grid
    }

    #[test]
    fn empty_grid_has_no_line() {
        assert!(!has_four_in_a_row(&empty(), Token::A));
        assert!(!has_four_in_a_row(&empty(), Token::B));
    }

    #[test]
    fn horizontal_line_detected() {
        let grid = with(&[(5, 2), (5, 3), (5, 4), (5, 5)], Token::A);
        assert!(has_four_in_a_row(&grid, Token::A));
        assert!(!has_four_in_a_row(&grid, Token::B));
    }

    #[test]
    fn horizontal_line_at_right_edge() {
        let grid = with(&[(0, 3), (0, 4), (0, 5), (0, 6)], Token::B);
        assert!(has_four_in_a_row(&grid, Token::B));
    }

    #[test]
    fn vertical_line_detected() {
        let grid = with(&[(2, 0), (3, 0), (4, 0), (5, 0)], Token::A);
        assert!(has_four_in_a_row(&grid, Token::A));
    }

    #[test]
    fn down_right_diagonal_detected() {
        let grid = with(&[(1, 1), (2, 2), (3, 3), (4, 4)], Token::B);
        assert!(has_four_in_a_row(&grid, Token::B));
    }

    #[test]
    fn down_left_diagonal_detected() {
        let grid = with(&[(2, 6), (3, 5), (4, 4), (5, 3)], Token::A);
        assert!(has_four_in_a_row(&grid, Token::A));
    }

    #[test]
    fn down_left_diagonal_touching_column_zero() {
        let grid = with(&[(2, 3), (3, 2), (4, 1), (5, 0)], Token::A);
        assert!(has_four_in_a_row(&grid, Token::A));
    }

    #[test]
    fn three_with_gap_is_not_a_line() {
        let cases: [&[(usize, usize)]; 4] = [
            &[(5, 0), (5, 1), (5, 2), (5, 4)],
            &[(1, 3), (2, 3), (3, 3), (5, 3)],
            &[(0, 0), (1, 1), (2, 2), (4, 4)],
            &[(0, 6), (1, 5), (2, 4), (4, 2)],
        ];
        for cells in cases {
            let grid = with(cells, Token::A);
            assert!(!has_four_in_a_row(&grid, Token::A), "false positive for {cells:?}");
        }
    }

    #[test]
    fn interrupted_by_other_token() {
        let mut grid = with(&[(5, 0), (5, 1), (5, 3), (5, 4)], Token::A);
        grid[5][2] = GridCell::TokenB;
        assert!(!has_four_in_a_row(&grid, Token::A));
    }

    #[test]
    fn rays_do_not_wrap_rows() {
        // Three at the end of row 4, one at the start of row 5.
        let grid = with(&[(4, 4), (4, 5), (4, 6), (5, 0)], Token::A);
        assert!(!has_four_in_a_row(&grid, Token::A));
    }

    #[test]
    fn winning_line_reports_coordinates() {
        let grid = with(&[(5, 1), (4, 2), (3, 3), (2, 4)], Token::B);
        let line = winning_line(&grid, Token::B).unwrap();
        assert_eq!(line, [(2, 4), (3, 3), (4, 2), (5, 1)]);
    }

    #[test]
    fn step_stops_at_edges() {
        assert_eq!(Direction::Right.step((0, COLS - 1)), None);
        assert_eq!(Direction::Down.step((ROWS - 1, 0)), None);
        assert_eq!(Direction::DownLeft.step((0, 0)), None);
        assert_eq!(Direction::DownRight.step((0, 0)), Some((1, 1)));
    }
}
