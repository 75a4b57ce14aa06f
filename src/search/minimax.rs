//! Depth-bounded minimax for the "balanced" mode.
//!
//! The chance ply is adversarial rather than probabilistic: it assumes the
//! environment drops a 2 into one of the first few empty cells in scan
//! order and takes the worst case. Cheap and fully deterministic.

use crate::engine::{simulate, Board, Move};
use crate::heuristic;

use super::memo::Ply;
use super::Ai;

const MINIMAX_DEPTH: u8 = 2;
/// Empty cells considered by the adversarial ply, first in scan order.
const CHANCE_SAMPLES: usize = 4;

impl Ai {
    pub(crate) fn minimax_move(&mut self, board: &Board) -> Option<Move> {
        let mut best: Option<(Move, f64)> = None;
        for &dir in &Move::ALL {
            let res = simulate(board, dir);
            if !res.moved {
                continue;
            }
            let score = self.minimax_chance(&res.board, MINIMAX_DEPTH - 1);
            match best {
                Some((_, s)) if s >= score => {}
                _ => best = Some((dir, score)),
            }
        }
        best.map(|(dir, _)| dir)
    }

    /// Root score: the maximizing ply at the fixed minimax depth.
    pub(crate) fn minimax_value(&mut self, board: &Board) -> f64 {
        let depth = match self.cfg.depth_cap {
            Some(cap) => MINIMAX_DEPTH.min(cap),
            None => MINIMAX_DEPTH,
        };
        self.minimax_agent(board, depth)
    }

    fn minimax_agent(&mut self, board: &Board, depth: u8) -> f64 {
        self.nodes += 1;
        if depth == 0 {
            return self.balanced_eval(board);
        }
        if self.cfg.cache_enabled {
            if let Some(score) = self.minimax_memo.get(board, depth, Ply::Agent) {
                return score;
            }
        }
        let mut best: Option<f64> = None;
        for &dir in &Move::ALL {
            let res = simulate(board, dir);
            if !res.moved {
                continue;
            }
            let score = self.minimax_chance(&res.board, depth - 1);
            if best.map_or(true, |b| score > b) {
                best = Some(score);
            }
        }
        // No legal move: score the unchanged board statically.
        let score = best.unwrap_or_else(|| self.balanced_eval(board));
        if self.cfg.cache_enabled {
            self.minimax_memo.insert(board, depth, Ply::Agent, score);
        }
        score
    }

    fn minimax_chance(&mut self, board: &Board, depth: u8) -> f64 {
        self.nodes += 1;
        if depth == 0 {
            return self.balanced_eval(board);
        }
        if self.cfg.cache_enabled {
            if let Some(score) = self.minimax_memo.get(board, depth, Ply::Chance) {
                return score;
            }
        }
        let n = board.size();
        let empties: Vec<(usize, usize)> = (0..n)
            .flat_map(|r| (0..n).map(move |c| (r, c)))
            .filter(|&(r, c)| board.exponent(r, c) == 0)
            .take(CHANCE_SAMPLES)
            .collect();
        let score = if empties.is_empty() {
            // Nothing to place; fall straight through to the next agent ply.
            self.minimax_agent(board, depth - 1)
        } else {
            let mut worst = f64::INFINITY;
            for (r, c) in empties {
                let child = place_tile(board, r, c, 1);
                worst = worst.min(self.minimax_agent(&child, depth - 1));
            }
            worst
        };
        if self.cfg.cache_enabled {
            self.minimax_memo.insert(board, depth, Ply::Chance, score);
        }
        score
    }

    fn balanced_eval(&self, board: &Board) -> f64 {
        heuristic::evaluate(board, &self.balanced_weights)
    }
}

/// Fresh board with one tile of `exponent` placed at (row, col).
pub(crate) fn place_tile(board: &Board, row: usize, col: usize, exponent: u8) -> Board {
    let n = board.size();
    let mut exps = board.exponents().to_vec();
    exps[row * n + col] = exponent;
    Board::from_exponents(n, &exps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ntuple::NTupleEvaluator;
    use crate::search::SearchConfig;
    use std::sync::Arc;

    fn ai() -> Ai {
        Ai::with_seed(
            Arc::new(NTupleEvaluator::with_default(4)),
            SearchConfig::default(),
            5,
        )
    }

    #[test]
    fn picks_a_legal_move() {
        let board = Board::from_values(4, &[
            2, 2, 4, 0,
            0, 0, 0, 0,
            0, 0, 0, 0,
            0, 0, 0, 0,
        ]);
        let chosen = ai().minimax_move(&board).unwrap();
        assert!(simulate(&board, chosen).moved);
    }

    #[test]
    fn returns_none_when_locked() {
        let board = Board::from_values(4, &[
            2, 4, 2, 4,
            4, 2, 4, 2,
            2, 4, 2, 4,
            4, 2, 4, 2,
        ]);
        assert_eq!(ai().minimax_move(&board), None);
    }

    #[test]
    fn value_is_deterministic() {
        let board = Board::from_values(4, &[
            16, 8, 4, 2,
            2, 2, 0, 0,
            0, 0, 0, 0,
            0, 0, 0, 0,
        ]);
        let mut a = ai();
        let v = a.minimax_value(&board);
        assert_eq!(a.minimax_value(&board), v);
        assert_eq!(ai().minimax_value(&board), v);
    }

    #[test]
    fn chance_ply_uses_scan_order_cells() {
        // With exactly one empty cell the adversary's choice is forced, so
        // the chance score equals the agent score after placing a 2 there.
        let board = Board::from_values(4, &[
            2, 4, 2, 4,
            4, 2, 4, 2,
            2, 4, 2, 4,
            4, 2, 4, 0,
        ]);
        let mut a = ai();
        let chance = a.minimax_chance(&board, 1);
        let forced = place_tile(&board, 3, 3, 1);
        let mut b = ai();
        let agent = b.minimax_agent(&forced, 0);
        assert_eq!(chance, agent);
    }

    #[test]
    fn place_tile_does_not_mutate() {
        let board = Board::empty(4);
        let child = place_tile(&board, 2, 2, 3);
        assert_eq!(board.count_empty(), 16);
        assert_eq!(child.value(2, 2), 8);
    }
}
