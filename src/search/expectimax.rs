//! Probability-weighted expectimax for the "optimal" and "ntuple" modes.
//!
//! Depth adapts to the empty-cell count: wide-open positions get shallow
//! searches (large branching factor, low criticality), cramped positions
//! get deep ones. Chance plies sample empty cells up to a cap and weight
//! tile insertions 90/10 between 2 and 4.

use std::hash::{BuildHasher, Hash, Hasher};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::engine::{simulate, Board, Move};
use crate::heuristic;

use super::memo::Ply;
use super::minimax::place_tile;
use super::Ai;

/// Leaf evaluator selection; each leaf owns its own memo table so cached
/// scores never cross evaluators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Leaf {
    Heuristic,
    NTuple,
}

/// Chance-ply sample caps by remaining depth.
const SAMPLE_CAP_DEEP: usize = 4;
const SAMPLE_CAP_SHALLOW: usize = 6;
const DEEP_DEPTH_THRESHOLD: u8 = 3;

/// Insertion probabilities for a new tile.
const PROB_TWO: f64 = 0.9;
const PROB_FOUR: f64 = 0.1;

/// More empty cells mean a larger branching factor and a less critical
/// position, so the search gets shallower.
fn adaptive_depth(empty: usize) -> u8 {
    match empty {
        10.. => 3,
        6..=9 => 4,
        3..=5 => 5,
        _ => 6,
    }
}

impl Ai {
    pub(crate) fn expectimax_move(&mut self, board: &Board, leaf: Leaf) -> Option<Move> {
        // Fresh table per top-level choice: bounded memory, and the leaf
        // evaluator may have been swapped since the last move.
        self.memo_clear(leaf);
        let depth = self.root_depth(board);
        let mut best: Option<(Move, f64)> = None;
        for &dir in &Move::ALL {
            let res = simulate(board, dir);
            if !res.moved {
                continue;
            }
            let score = self.expectimax_chance(&res.board, depth.saturating_sub(1), leaf);
            match best {
                Some((_, s)) if s >= score => {}
                _ => best = Some((dir, score)),
            }
        }
        best.map(|(dir, _)| dir)
    }

    /// Root score: the maximizing ply at the adaptive depth.
    pub(crate) fn expectimax_value(&mut self, board: &Board, leaf: Leaf) -> f64 {
        self.memo_clear(leaf);
        let depth = self.root_depth(board);
        self.expectimax_agent(board, depth, leaf)
    }

    fn root_depth(&self, board: &Board) -> u8 {
        let depth = adaptive_depth(board.count_empty());
        match self.cfg.depth_cap {
            Some(cap) => depth.min(cap),
            None => depth,
        }
    }

    fn expectimax_agent(&mut self, board: &Board, depth: u8, leaf: Leaf) -> f64 {
        self.nodes += 1;
        if depth == 0 {
            return self.leaf_eval(board, leaf);
        }
        if self.cfg.cache_enabled {
            if let Some(score) = self.memo_get(leaf, board, depth, Ply::Agent) {
                return score;
            }
        }
        let mut best: Option<f64> = None;
        for &dir in &Move::ALL {
            let res = simulate(board, dir);
            if !res.moved {
                continue;
            }
            let score = self.expectimax_chance(&res.board, depth - 1, leaf);
            if best.map_or(true, |b| score > b) {
                best = Some(score);
            }
        }
        let score = best.unwrap_or_else(|| self.leaf_eval(board, leaf));
        if self.cfg.cache_enabled {
            self.memo_insert(leaf, board, depth, Ply::Agent, score);
        }
        score
    }

    fn expectimax_chance(&mut self, board: &Board, depth: u8, leaf: Leaf) -> f64 {
        self.nodes += 1;
        if depth == 0 {
            return self.leaf_eval(board, leaf);
        }
        if self.cfg.cache_enabled {
            if let Some(score) = self.memo_get(leaf, board, depth, Ply::Chance) {
                return score;
            }
        }
        let cells = self.sample_cells(board, depth);
        let score = if cells.is_empty() {
            self.expectimax_agent(board, depth - 1, leaf)
        } else {
            // Each sampled cell is equally likely; within a cell the 2/4
            // outcomes are weighted 90/10.
            let mut total = 0.0;
            let count = cells.len() as f64;
            for (r, c) in cells {
                let with_two = place_tile(board, r, c, 1);
                let with_four = place_tile(board, r, c, 2);
                total += PROB_TWO * self.expectimax_agent(&with_two, depth - 1, leaf)
                    + PROB_FOUR * self.expectimax_agent(&with_four, depth - 1, leaf);
            }
            total / count
        };
        if self.cfg.cache_enabled {
            self.memo_insert(leaf, board, depth, Ply::Chance, score);
        }
        score
    }

    /// Empty cells to branch on: all of them when under the cap, otherwise a
    /// full shuffle-then-take. The shuffle is seeded from the board and the
    /// instance salt so identical nodes sample identically regardless of
    /// cache hits elsewhere in the tree.
    fn sample_cells(&self, board: &Board, depth: u8) -> Vec<(usize, usize)> {
        let n = board.size();
        let mut cells: Vec<(usize, usize)> = (0..n)
            .flat_map(|r| (0..n).map(move |c| (r, c)))
            .filter(|&(r, c)| board.exponent(r, c) == 0)
            .collect();
        let cap = if depth > DEEP_DEPTH_THRESHOLD {
            SAMPLE_CAP_DEEP
        } else {
            SAMPLE_CAP_SHALLOW
        };
        if cells.len() > cap {
            let mut rng = StdRng::seed_from_u64(self.board_seed(board));
            cells.shuffle(&mut rng);
            cells.truncate(cap);
        }
        cells
    }

    fn board_seed(&self, board: &Board) -> u64 {
        let fixed = ahash::RandomState::with_seeds(0x2048, 0x4096, 0x8192, 0x16384);
        let mut hasher = fixed.build_hasher();
        board.hash(&mut hasher);
        hasher.finish() ^ self.sample_salt
    }

    fn leaf_eval(&self, board: &Board, leaf: Leaf) -> f64 {
        match leaf {
            Leaf::Heuristic => heuristic::evaluate(board, &self.optimal_weights),
            Leaf::NTuple => self.ntuple.evaluate(board),
        }
    }

    fn memo_get(&self, leaf: Leaf, board: &Board, depth: u8, ply: Ply) -> Option<f64> {
        match leaf {
            Leaf::Heuristic => self.expectimax_memo.get(board, depth, ply),
            Leaf::NTuple => self.expectimax_ntuple_memo.get(board, depth, ply),
        }
    }

    fn memo_insert(&mut self, leaf: Leaf, board: &Board, depth: u8, ply: Ply, score: f64) {
        match leaf {
            Leaf::Heuristic => self.expectimax_memo.insert(board, depth, ply, score),
            Leaf::NTuple => self.expectimax_ntuple_memo.insert(board, depth, ply, score),
        }
    }

    fn memo_clear(&mut self, leaf: Leaf) {
        match leaf {
            Leaf::Heuristic => self.expectimax_memo.clear(),
            Leaf::NTuple => self.expectimax_ntuple_memo.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ntuple::NTupleEvaluator;
    use crate::search::SearchConfig;
    use std::sync::Arc;

    fn ai_with_seed(seed: u64) -> Ai {
        Ai::with_seed(
            Arc::new(NTupleEvaluator::with_default(4)),
            SearchConfig::default(),
            seed,
        )
    }

    #[test]
    fn depth_adapts_to_empty_count() {
        assert_eq!(adaptive_depth(14), 3);
        assert_eq!(adaptive_depth(10), 3);
        assert_eq!(adaptive_depth(8), 4);
        assert_eq!(adaptive_depth(4), 5);
        assert_eq!(adaptive_depth(2), 6);
        assert_eq!(adaptive_depth(0), 6);
    }

    #[test]
    fn sampling_respects_the_caps() {
        let ai = ai_with_seed(1);
        let board = Board::empty(4);
        assert_eq!(ai.sample_cells(&board, 4).len(), SAMPLE_CAP_DEEP);
        assert_eq!(ai.sample_cells(&board, 2).len(), SAMPLE_CAP_SHALLOW);
    }

    #[test]
    fn sampling_keeps_all_cells_under_the_cap() {
        let ai = ai_with_seed(1);
        let board = Board::from_values(4, &[
            2, 4, 2, 4,
            4, 2, 4, 2,
            2, 4, 2, 4,
            4, 2, 0, 0,
        ]);
        let cells = ai.sample_cells(&board, 5);
        assert_eq!(cells.len(), 2);
        assert!(cells.contains(&(3, 2)));
        assert!(cells.contains(&(3, 3)));
    }

    #[test]
    fn sampling_is_reproducible_per_board() {
        let ai = ai_with_seed(9);
        let board = Board::empty(4);
        let first = ai.sample_cells(&board, 4);
        assert_eq!(ai.sample_cells(&board, 4), first);
        assert_eq!(first.len(), SAMPLE_CAP_DEEP);
        for &(r, c) in &first {
            assert_eq!(board.exponent(r, c), 0);
        }
    }

    #[test]
    fn search_values_are_reproducible() {
        let board = Board::from_values(4, &[
            32, 16, 8, 4,
            4, 2, 2, 0,
            2, 0, 0, 0,
            0, 0, 0, 0,
        ]);
        let mut a = ai_with_seed(21);
        let mut b = ai_with_seed(21);
        assert_eq!(
            a.expectimax_value(&board, Leaf::Heuristic),
            b.expectimax_value(&board, Leaf::Heuristic)
        );
        assert_eq!(
            a.expectimax_value(&board, Leaf::NTuple),
            b.expectimax_value(&board, Leaf::NTuple)
        );
    }

    #[test]
    fn chance_ply_weighting_matches_by_hand() {
        // Depth 1 chance ply over a single empty cell: the score is
        // 0.9 * agent(2 placed) + 0.1 * agent(4 placed), and at depth 0 the
        // agent scores are leaf evaluations of the forced boards.
        let board = Board::from_values(4, &[
            2, 4, 2, 4,
            4, 2, 4, 2,
            2, 4, 2, 4,
            4, 2, 4, 0,
        ]);
        let mut ai = ai_with_seed(3);
        let got = ai.expectimax_chance(&board, 1, Leaf::Heuristic);
        let with_two = place_tile(&board, 3, 3, 1);
        let with_four = place_tile(&board, 3, 3, 2);
        let expected = PROB_TWO * ai.leaf_eval(&with_two, Leaf::Heuristic)
            + PROB_FOUR * ai.leaf_eval(&with_four, Leaf::Heuristic);
        assert!((got - expected).abs() < 1e-9);
    }

    #[test]
    fn best_move_prefers_keeping_structure() {
        let board = Board::from_values(4, &[
            64, 32, 16, 8,
            4, 2, 2, 0,
            0, 0, 0, 0,
            0, 0, 0, 0,
        ]);
        let mut ai = ai_with_seed(17);
        let chosen = ai.expectimax_move(&board, Leaf::Heuristic).unwrap();
        assert!(simulate(&board, chosen).moved);
    }
}
