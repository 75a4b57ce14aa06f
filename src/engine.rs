use rand::Rng;
use std::fmt;

/// A direction to move/merge tiles.
///
/// `ALL` fixes the iteration order used wherever direction order affects
/// tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];
}

pub const MIN_SIZE: usize = 4;
pub const MAX_SIZE: usize = 7;

/// An N×N board (N in 4..=7) storing tile exponents row-major.
///
/// A cell holds 0 when empty, otherwise `k` for the tile `2^k`. Boards are
/// immutable values: every operation returns a fresh board and never aliases
/// the input.
///
/// ```
/// use slide_ai::engine::{Board, Move, simulate};
/// let b = Board::from_values(4, &[
///     2, 2, 0, 0,
///     0, 0, 0, 0,
///     0, 0, 0, 0,
///     0, 0, 0, 0,
/// ]);
/// let res = simulate(&b, Move::Left);
/// assert!(res.moved);
/// assert_eq!(res.score_delta, 4);
/// assert_eq!(res.board.value(0, 0), 4);
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Board {
    n: usize,
    cells: Box<[u8]>,
}

/// Outcome of simulating one move. `moved` is false iff `board` is cell-wise
/// identical to the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationResult {
    pub board: Board,
    pub moved: bool,
    pub score_delta: u64,
}

impl Board {
    /// An empty `n`×`n` board. Panics if `n` is outside 4..=7.
    pub fn empty(n: usize) -> Self {
        assert!(
            (MIN_SIZE..=MAX_SIZE).contains(&n),
            "board size {n} outside supported range {MIN_SIZE}..={MAX_SIZE}"
        );
        Board {
            n,
            cells: vec![0u8; n * n].into_boxed_slice(),
        }
    }

    /// Construct from raw exponents (0 = empty), row-major.
    ///
    /// Panics on length mismatch; exponent validity is a caller contract.
    pub fn from_exponents(n: usize, exponents: &[u8]) -> Self {
        let mut board = Board::empty(n);
        assert_eq!(
            exponents.len(),
            n * n,
            "expected {} exponents for a {n}x{n} board, got {}",
            n * n,
            exponents.len()
        );
        board.cells.copy_from_slice(exponents);
        board
    }

    /// Construct from tile values (0 = empty, otherwise a power of two),
    /// row-major. Panics on malformed input rather than corrupting state.
    pub fn from_values(n: usize, values: &[u32]) -> Self {
        let mut board = Board::empty(n);
        assert_eq!(
            values.len(),
            n * n,
            "expected {} values for a {n}x{n} board, got {}",
            n * n,
            values.len()
        );
        for (cell, &val) in board.cells.iter_mut().zip(values) {
            *cell = match val {
                0 => 0,
                v if v.is_power_of_two() => v.trailing_zeros() as u8,
                v => panic!("tile value {v} is not zero or a power of two"),
            };
        }
        board
    }

    /// Side length of the board.
    #[inline]
    pub fn size(&self) -> usize {
        self.n
    }

    /// Tile exponent at (row, col); 0 when empty.
    #[inline]
    pub fn exponent(&self, row: usize, col: usize) -> u8 {
        self.cells[row * self.n + col]
    }

    /// Tile value at (row, col); 0 when empty.
    #[inline]
    pub fn value(&self, row: usize, col: usize) -> u32 {
        match self.exponent(row, col) {
            0 => 0,
            e => 1u32 << e,
        }
    }

    /// Row-major tile values (0 for empty cells).
    pub fn to_values(&self) -> Vec<u32> {
        self.cells
            .iter()
            .map(|&e| if e == 0 { 0 } else { 1u32 << e })
            .collect()
    }

    /// Row-major tile exponents.
    #[inline]
    pub fn exponents(&self) -> &[u8] {
        &self.cells
    }

    /// Count the number of empty cells.
    pub fn count_empty(&self) -> usize {
        self.cells.iter().filter(|&&e| e == 0).count()
    }

    /// The highest tile value present, or 0 on an empty board.
    pub fn highest_tile(&self) -> u32 {
        match self.cells.iter().copied().max() {
            None | Some(0) => 0,
            Some(e) => 1u32 << e,
        }
    }

    /// Sum of all tile values on the board.
    pub fn tile_sum(&self) -> u64 {
        self.cells
            .iter()
            .map(|&e| if e == 0 { 0u64 } else { 1u64 << e })
            .sum()
    }

    /// Return the board resulting from sliding/merging in `dir` (no random
    /// insert). Shorthand for [`simulate`] when only the board is needed.
    #[inline]
    pub fn shifted(&self, dir: Move) -> Board {
        simulate(self, dir).board
    }

    /// Insert a 2 (90%) or 4 (10%) tile into a uniformly random empty cell.
    ///
    /// Panics if the board is full; callers check `count_empty` first.
    pub fn with_random_tile<R: Rng + ?Sized>(&self, rng: &mut R) -> Board {
        let empties: Vec<usize> = self
            .cells
            .iter()
            .enumerate()
            .filter(|(_, &e)| e == 0)
            .map(|(i, _)| i)
            .collect();
        assert!(!empties.is_empty(), "cannot insert a tile into a full board");
        let slot = empties[rng.gen_range(0..empties.len())];
        let exponent = if rng.gen_range(0..10) < 9 { 1 } else { 2 };
        let mut board = self.clone();
        board.cells[slot] = exponent;
        board
    }

    /// Simulate a move and, if it changed the board, insert a random tile.
    pub fn make_move<R: Rng + ?Sized>(&self, dir: Move, rng: &mut R) -> Board {
        let result = simulate(self, dir);
        if result.moved {
            result.board.with_random_tile(rng)
        } else {
            result.board
        }
    }

    /// True if no move in any direction changes the board.
    pub fn is_game_over(&self) -> bool {
        Move::ALL.iter().all(|&dir| !can_move(self, dir))
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({}x{}, {:?})", self.n, self.n, self.cells)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = "-".repeat(8 * self.n);
        for row in 0..self.n {
            if row > 0 {
                writeln!(f, "{sep}")?;
            }
            for col in 0..self.n {
                if col > 0 {
                    write!(f, "|")?;
                }
                write!(f, "{}", format_val(self.value(row, col)))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Cell indices of one line in collapse order for a direction.
///
/// A "line" is the row or column a move collapses along; the first returned
/// index is the edge tiles slide toward.
fn line_indices(n: usize, dir: Move, line: usize) -> impl Iterator<Item = usize> {
    let (start, step): (usize, isize) = match dir {
        Move::Left => (line * n, 1),
        Move::Right => (line * n + n - 1, -1),
        Move::Up => (line, n as isize),
        Move::Down => ((n - 1) * n + line, -(n as isize)),
    };
    (0..n).map(move |i| (start as isize + step * i as isize) as usize)
}

/// Collapse one extracted line in place: drop zeros, merge adjacent equal
/// exponents exactly once per pair, pad with zeros. Returns the score delta
/// (sum of post-merge tile values).
fn collapse_line(line: &mut [u8]) -> u64 {
    let n = line.len();
    let mut compact: Vec<u8> = line.iter().copied().filter(|&e| e != 0).collect();
    let mut score = 0u64;
    let mut write = 0;
    let mut read = 0;
    while read < compact.len() {
        if read + 1 < compact.len() && compact[read] == compact[read + 1] {
            // A merged tile never merges again within the same move.
            let merged = compact[read] + 1;
            compact[write] = merged;
            score += 1u64 << merged;
            read += 2;
        } else {
            compact[write] = compact[read];
            read += 1;
        }
        write += 1;
    }
    compact.truncate(write);
    for (i, slot) in line.iter_mut().enumerate().take(n) {
        *slot = compact.get(i).copied().unwrap_or(0);
    }
    score
}

/// Slide and merge tiles in `dir`, returning the fresh board, whether any
/// cell changed, and the points earned from merges. Never mutates the input.
pub fn simulate(board: &Board, dir: Move) -> SimulationResult {
    let n = board.n;
    let mut cells = board.cells.clone();
    let mut score_delta = 0u64;
    let mut line_buf = vec![0u8; n];
    for line in 0..n {
        for (slot, idx) in line_buf.iter_mut().zip(line_indices(n, dir, line)) {
            *slot = cells[idx];
        }
        score_delta += collapse_line(&mut line_buf);
        for (&val, idx) in line_buf.iter().zip(line_indices(n, dir, line)) {
            cells[idx] = val;
        }
    }
    let moved = cells != board.cells;
    SimulationResult {
        board: Board { n, cells },
        moved,
        score_delta,
    }
}

/// True if moving in `dir` would change the board.
#[inline]
pub fn can_move(board: &Board, dir: Move) -> bool {
    simulate(board, dir).moved
}

fn format_val(val: u32) -> String {
    if val == 0 {
        "       ".to_string()
    } else {
        format!("{val:^7}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn row_board(row: [u32; 4]) -> Board {
        let mut values = vec![0u32; 16];
        values[..4].copy_from_slice(&row);
        Board::from_values(4, &values)
    }

    fn top_row(board: &Board) -> Vec<u32> {
        (0..4).map(|c| board.value(0, c)).collect()
    }

    #[test]
    fn merges_each_pair_once() {
        let res = simulate(&row_board([2, 2, 2, 2]), Move::Left);
        assert_eq!(top_row(&res.board), vec![4, 4, 0, 0]);
        assert_eq!(res.score_delta, 8);
        assert!(res.moved);
    }

    #[test]
    fn merges_two_distinct_pairs() {
        let res = simulate(&row_board([2, 2, 4, 4]), Move::Left);
        assert_eq!(top_row(&res.board), vec![4, 8, 0, 0]);
        assert_eq!(res.score_delta, 12);
    }

    #[test]
    fn merges_across_gaps() {
        let res = simulate(&row_board([2, 0, 0, 2]), Move::Left);
        assert_eq!(top_row(&res.board), vec![4, 0, 0, 0]);
        assert_eq!(res.score_delta, 4);

        let res = simulate(&row_board([2, 0, 0, 2]), Move::Right);
        assert_eq!(top_row(&res.board), vec![0, 0, 0, 4]);
        assert_eq!(res.score_delta, 4);
    }

    #[test]
    fn no_merge_keeps_order() {
        let res = simulate(&row_board([2, 4, 2, 4]), Move::Left);
        assert_eq!(top_row(&res.board), vec![2, 4, 2, 4]);
        assert!(!res.moved);
        assert_eq!(res.score_delta, 0);
    }

    #[test]
    fn vertical_moves_collapse_columns() {
        let board = Board::from_values(4, &[
            2, 0, 0, 0,
            2, 0, 0, 0,
            4, 0, 0, 0,
            4, 0, 0, 0,
        ]);
        let res = simulate(&board, Move::Up);
        assert_eq!(res.board.value(0, 0), 4);
        assert_eq!(res.board.value(1, 0), 8);
        assert_eq!(res.board.value(2, 0), 0);
        assert_eq!(res.score_delta, 12);

        let res = simulate(&board, Move::Down);
        assert_eq!(res.board.value(3, 0), 8);
        assert_eq!(res.board.value(2, 0), 4);
    }

    #[test]
    fn simulate_does_not_mutate_input() {
        let board = row_board([2, 2, 0, 0]);
        let snapshot = board.clone();
        let _ = simulate(&board, Move::Left);
        assert_eq!(board, snapshot);
    }

    #[test]
    fn merging_conserves_tile_sum() {
        let board = Board::from_values(4, &[
            2, 2, 4, 0,
            8, 8, 0, 0,
            0, 0, 2, 2,
            4, 0, 4, 0,
        ]);
        let before = board.tile_sum();
        for &dir in &Move::ALL {
            let res = simulate(&board, dir);
            assert_eq!(res.board.tile_sum(), before);
        }
    }

    #[test]
    fn locked_board_cannot_move() {
        // Checkerboard of distinct neighbors, no empties.
        let board = Board::from_values(4, &[
            2, 4, 2, 4,
            4, 2, 4, 2,
            2, 4, 2, 4,
            4, 2, 4, 2,
        ]);
        for &dir in &Move::ALL {
            assert!(!can_move(&board, dir));
        }
        assert!(board.is_game_over());
    }

    #[test]
    fn random_tile_fills_an_empty_cell() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut board = Board::empty(4);
        for expected in 1..=16 {
            board = board.with_random_tile(&mut rng);
            assert_eq!(16 - board.count_empty(), expected);
        }
    }

    #[test]
    fn larger_boards_follow_the_same_rules() {
        let mut values = vec![0u32; 36];
        values[0] = 2;
        values[5] = 2;
        let board = Board::from_values(6, &values);
        let res = simulate(&board, Move::Left);
        assert_eq!(res.board.value(0, 0), 4);
        assert_eq!(res.score_delta, 4);
        assert_eq!(res.board.count_empty(), 35);
    }

    #[test]
    #[should_panic(expected = "not zero or a power of two")]
    fn rejects_non_power_of_two_values() {
        let mut values = vec![0u32; 16];
        values[0] = 3;
        let _ = Board::from_values(4, &values);
    }

    #[test]
    #[should_panic(expected = "outside supported range")]
    fn rejects_out_of_range_size() {
        let _ = Board::empty(3);
    }
}
