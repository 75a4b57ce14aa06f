//! Stateless heuristic board evaluation.
//!
//! `evaluate` is a pure weighted sum of board features: empty-cell count
//! (scaled up under scarcity), monotonicity in log2 space, smoothness,
//! a small max-tile bonus, a corner/snake bonus and, for the optimal
//! preset, merge potential. Higher is better.

use crate::engine::Board;

/// Feature multipliers for [`evaluate`]. Presets differ only in the corner
/// weight and whether merge potential contributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalWeights {
    pub empty: f64,
    pub monotonicity: f64,
    pub smoothness: f64,
    pub max_tile: f64,
    pub corner: f64,
    pub merge_potential: f64,
}

impl EvalWeights {
    /// Weights for the "balanced" preset (minimax leaf evaluator).
    pub fn balanced() -> Self {
        EvalWeights {
            empty: 2.7,
            monotonicity: 1.0,
            smoothness: 0.1,
            max_tile: 1.0,
            corner: 1.0,
            merge_potential: 0.0,
        }
    }

    /// Weights for the "optimal" preset (expectimax leaf evaluator).
    pub fn optimal() -> Self {
        EvalWeights {
            corner: 2.0,
            merge_potential: 0.7,
            ..EvalWeights::balanced()
        }
    }
}

/// Empty fraction below which emptiness is scaled by `SCARCITY_FACTOR`.
const LOW_EMPTY_FRACTION: f64 = 0.25;
const SCARCITY_FACTOR: f64 = 2.5;

/// Divisor applied to the snake term of the corner bonus.
const SNAKE_SCALE: f64 = 0.1;

/// Score a board; higher is better. Pure and deterministic.
pub fn evaluate(board: &Board, weights: &EvalWeights) -> f64 {
    let mut score = 0.0;
    score += weights.empty * empty_term(board);
    score += weights.monotonicity * monotonicity_term(board);
    score += weights.smoothness * smoothness_term(board);
    score += weights.max_tile * max_tile_term(board);
    score += weights.corner * corner_term(board);
    if weights.merge_potential != 0.0 {
        score += weights.merge_potential * merge_potential_term(board);
    }
    score
}

fn empty_term(board: &Board) -> f64 {
    let n = board.size();
    let empty = board.count_empty() as f64;
    let fraction = empty / (n * n) as f64;
    if fraction < LOW_EMPTY_FRACTION {
        empty * SCARCITY_FACTOR
    } else {
        empty
    }
}

/// Signed non-increase totals per axis in log2 space, taking the better of
/// the two orientations for each axis. Totals are <= 0; a perfectly ordered
/// board scores 0.
fn monotonicity_term(board: &Board) -> f64 {
    let n = board.size();
    // [up, down, left, right] penalties
    let mut totals = [0.0f64; 4];
    for r in 0..n {
        for c in 0..n - 1 {
            let cur = board.exponent(r, c) as f64;
            let next = board.exponent(r, c + 1) as f64;
            if cur > next {
                totals[3] += next - cur;
            } else {
                totals[2] += cur - next;
            }
        }
    }
    for c in 0..n {
        for r in 0..n - 1 {
            let cur = board.exponent(r, c) as f64;
            let next = board.exponent(r + 1, c) as f64;
            if cur > next {
                totals[1] += next - cur;
            } else {
                totals[0] += cur - next;
            }
        }
    }
    totals[0].max(totals[1]) + totals[2].max(totals[3])
}

/// Negative sum of |Δlog2| over adjacent non-empty pairs.
fn smoothness_term(board: &Board) -> f64 {
    let n = board.size();
    let mut total = 0.0;
    for r in 0..n {
        for c in 0..n {
            let e = board.exponent(r, c);
            if e == 0 {
                continue;
            }
            if c + 1 < n && board.exponent(r, c + 1) != 0 {
                total -= (e as f64 - board.exponent(r, c + 1) as f64).abs();
            }
            if r + 1 < n && board.exponent(r + 1, c) != 0 {
                total -= (e as f64 - board.exponent(r + 1, c) as f64).abs();
            }
        }
    }
    total
}

fn max_tile_term(board: &Board) -> f64 {
    (board.highest_tile() as f64 + 1.0).log2()
}

/// Bonus when the maximum tile sits in a corner: the max tile value plus a
/// snake term weighting each cell's log2 value by 0.5^(Manhattan distance
/// from that corner), scaled down by `SNAKE_SCALE`.
fn corner_term(board: &Board) -> f64 {
    let n = board.size();
    let max = board.highest_tile();
    if max == 0 {
        return 0.0;
    }
    let corners = [(0, 0), (0, n - 1), (n - 1, 0), (n - 1, n - 1)];
    for &(cr, cc) in &corners {
        if board.value(cr, cc) == max {
            let mut snake = 0.0;
            for r in 0..n {
                for c in 0..n {
                    let e = board.exponent(r, c);
                    if e == 0 {
                        continue;
                    }
                    let dist = cr.abs_diff(r) + cc.abs_diff(c);
                    snake += e as f64 * 0.5f64.powi(dist as i32);
                }
            }
            return max as f64 + snake * SNAKE_SCALE;
        }
    }
    0.0
}

/// Sum of log2(value) over adjacent equal non-empty pairs; rewards boards
/// one merge away from progress.
fn merge_potential_term(board: &Board) -> f64 {
    let n = board.size();
    let mut total = 0.0;
    for r in 0..n {
        for c in 0..n {
            let e = board.exponent(r, c);
            if e == 0 {
                continue;
            }
            if c + 1 < n && board.exponent(r, c + 1) == e {
                total += e as f64;
            }
            if r + 1 < n && board.exponent(r + 1, c) == e {
                total += e as f64;
            }
        }
    }
    total
}
