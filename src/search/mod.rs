//! Move selection: mode dispatch, the greedy fast policy, and shared state
//! for the minimax/expectimax searches.
//!
//! [`Ai`] owns the per-family memo tables and the injected n-tuple
//! evaluator; constructing independent `Ai` instances keeps searches (and
//! tests) from interfering through shared caches.

mod expectimax;
mod memo;
mod minimax;

use std::sync::Arc;

use crate::engine::{simulate, Board, Move};
use crate::heuristic::EvalWeights;
use crate::ntuple::NTupleEvaluator;
use memo::MemoTable;

pub(crate) use expectimax::Leaf;

/// Which evaluator/search combination picks the move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiMode {
    /// Greedy direction-priority policy; cheapest.
    Fast,
    /// Depth-2 minimax with the balanced heuristic.
    Balanced,
    /// Adaptive-depth expectimax with the optimal heuristic.
    Optimal,
    /// Adaptive-depth expectimax with the n-tuple evaluator.
    NTuple,
}

/// Knobs for the searches. Defaults match production behavior; the cache
/// toggle exists so tests can compare cached and uncached scores.
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    /// Enable/disable memo table usage.
    pub cache_enabled: bool,
    /// Entry ceiling per memo table; exceeding it clears the table.
    pub memo_ceiling: usize,
    /// Optional hard cap on search depth.
    pub depth_cap: Option<u8>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            cache_enabled: true,
            memo_ceiling: 50_000,
            depth_cap: None,
        }
    }
}

/// Basic search stats for the last evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    pub nodes: u64,
    pub peak_nodes: u64,
}

/// Fast-mode direction priority.
const FAST_PRIORITY: [Move; 4] = [Move::Down, Move::Right, Move::Left, Move::Up];
/// Fast mode takes the first legal move leaving at least this many empties.
const FAST_MIN_EMPTY: usize = 2;

/// The move chooser. One instance per independent consumer; memo tables are
/// owned state, never global.
pub struct Ai {
    cfg: SearchConfig,
    balanced_weights: EvalWeights,
    optimal_weights: EvalWeights,
    ntuple: Arc<NTupleEvaluator>,
    minimax_memo: MemoTable,
    expectimax_memo: MemoTable,
    expectimax_ntuple_memo: MemoTable,
    /// Salt for the per-board sampling shuffle; fixed by `with_seed` so the
    /// shuffle is reproducible and independent of traversal order (cache
    /// hits must not change which cells later nodes sample).
    sample_salt: u64,
    stats: SearchStats,
    nodes: u64,
}

impl Ai {
    pub fn new(ntuple: Arc<NTupleEvaluator>) -> Self {
        Self::with_config(ntuple, SearchConfig::default())
    }

    pub fn with_config(ntuple: Arc<NTupleEvaluator>, cfg: SearchConfig) -> Self {
        Ai {
            cfg,
            balanced_weights: EvalWeights::balanced(),
            optimal_weights: EvalWeights::optimal(),
            ntuple,
            minimax_memo: MemoTable::with_ceiling(cfg.memo_ceiling),
            expectimax_memo: MemoTable::with_ceiling(cfg.memo_ceiling),
            expectimax_ntuple_memo: MemoTable::with_ceiling(cfg.memo_ceiling),
            sample_salt: rand::random(),
            stats: SearchStats::default(),
            nodes: 0,
        }
    }

    /// Deterministic sampling for reproducible expectimax searches in tests.
    pub fn with_seed(ntuple: Arc<NTupleEvaluator>, cfg: SearchConfig, seed: u64) -> Self {
        let mut ai = Self::with_config(ntuple, cfg);
        ai.sample_salt = seed;
        ai
    }

    /// Choose the best direction for `board` under `mode`.
    ///
    /// Returns `None` iff no direction is legal (terminal board).
    ///
    /// ```
    /// use std::sync::Arc;
    /// use slide_ai::engine::Board;
    /// use slide_ai::ntuple::NTupleEvaluator;
    /// use slide_ai::search::{Ai, AiMode};
    ///
    /// let mut ai = Ai::new(Arc::new(NTupleEvaluator::with_default(4)));
    /// let board = Board::from_values(4, &[
    ///     2, 2, 0, 0,
    ///     0, 0, 0, 0,
    ///     0, 0, 0, 0,
    ///     0, 0, 0, 0,
    /// ]);
    /// assert!(ai.best_move(&board, AiMode::Fast).is_some());
    /// ```
    pub fn best_move(&mut self, board: &Board, mode: AiMode) -> Option<Move> {
        self.nodes = 0;
        let chosen = match mode {
            AiMode::Fast => self.fast_move(board),
            AiMode::Balanced => self.minimax_move(board),
            AiMode::Optimal => self.expectimax_move(board, Leaf::Heuristic),
            AiMode::NTuple => self.expectimax_move(board, Leaf::NTuple),
        };
        self.stats.nodes = self.nodes;
        self.stats.peak_nodes = self.stats.peak_nodes.max(self.nodes);
        chosen
    }

    /// Root score of `board` under `mode`'s search (maximizing ply at the
    /// configured depth). `Fast` has no score; it reports the resulting
    /// empty-cell count of its chosen move.
    pub fn state_value(&mut self, board: &Board, mode: AiMode) -> f64 {
        self.nodes = 0;
        let value = match mode {
            AiMode::Fast => self
                .fast_move(board)
                .map(|dir| simulate(board, dir).board.count_empty() as f64)
                .unwrap_or(0.0),
            AiMode::Balanced => self.minimax_value(board),
            AiMode::Optimal => self.expectimax_value(board, Leaf::Heuristic),
            AiMode::NTuple => self.expectimax_value(board, Leaf::NTuple),
        };
        self.stats.nodes = self.nodes;
        self.stats.peak_nodes = self.stats.peak_nodes.max(self.nodes);
        value
    }

    /// Stats from the last `best_move`/`state_value` call.
    #[inline]
    pub fn last_stats(&self) -> SearchStats {
        self.stats
    }

    #[inline]
    pub fn reset_stats(&mut self) {
        self.stats = SearchStats::default();
    }

    /// Greedy policy: first legal direction in priority order whose result
    /// keeps at least [`FAST_MIN_EMPTY`] cells empty; otherwise the legal
    /// direction maximizing resulting empties.
    fn fast_move(&mut self, board: &Board) -> Option<Move> {
        let mut fallback: Option<(Move, usize)> = None;
        for &dir in &FAST_PRIORITY {
            let res = simulate(board, dir);
            if !res.moved {
                continue;
            }
            self.nodes += 1;
            let empty = res.board.count_empty();
            if empty >= FAST_MIN_EMPTY {
                return Some(dir);
            }
            match fallback {
                Some((_, best)) if best >= empty => {}
                _ => fallback = Some((dir, empty)),
            }
        }
        fallback.map(|(dir, _)| dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristic;

    fn ai() -> Ai {
        Ai::with_seed(
            Arc::new(NTupleEvaluator::with_default(4)),
            SearchConfig::default(),
            7,
        )
    }

    fn locked_board() -> Board {
        Board::from_values(4, &[
            2, 4, 2, 4,
            4, 2, 4, 2,
            2, 4, 2, 4,
            4, 2, 4, 2,
        ])
    }

    #[test]
    fn every_mode_returns_none_on_locked_boards() {
        let board = locked_board();
        let mut ai = ai();
        for mode in [AiMode::Fast, AiMode::Balanced, AiMode::Optimal, AiMode::NTuple] {
            assert_eq!(ai.best_move(&board, mode), None, "{mode:?}");
        }
    }

    #[test]
    fn every_mode_moves_on_open_boards() {
        let board = Board::from_values(4, &[
            4, 2, 0, 0,
            2, 2, 0, 0,
            0, 0, 0, 0,
            0, 0, 0, 0,
        ]);
        let mut ai = ai();
        for mode in [AiMode::Fast, AiMode::Balanced, AiMode::Optimal, AiMode::NTuple] {
            let chosen = ai.best_move(&board, mode);
            assert!(chosen.is_some(), "{mode:?}");
            assert!(simulate(&board, chosen.unwrap()).moved);
        }
    }

    #[test]
    fn fast_prefers_down_when_legal() {
        let board = Board::from_values(4, &[
            2, 2, 0, 0,
            0, 0, 0, 0,
            0, 0, 0, 0,
            0, 0, 0, 0,
        ]);
        assert_eq!(ai().best_move(&board, AiMode::Fast), Some(Move::Down));
    }

    #[test]
    fn fast_skips_directions_leaving_too_few_empties() {
        // Down is legal but leaves a single empty cell; Right merges the top
        // row and keeps two cells empty, so the priority scan settles there.
        let board = Board::from_values(4, &[
            2, 2, 4, 8,
            16, 32, 64, 128,
            4, 8, 16, 32,
            64, 128, 256, 0,
        ]);
        assert!(simulate(&board, Move::Down).moved);
        assert_eq!(simulate(&board, Move::Down).board.count_empty(), 1);
        assert!(simulate(&board, Move::Right).board.count_empty() >= 2);
        assert_eq!(ai().best_move(&board, AiMode::Fast), Some(Move::Right));
    }

    #[test]
    fn fast_falls_back_to_max_empties() {
        // Only one legal move and it leaves a single empty cell.
        let board = Board::from_values(4, &[
            2, 4, 2, 4,
            4, 2, 4, 2,
            2, 4, 2, 4,
            4, 2, 4, 4,
        ]);
        let legal: Vec<Move> = Move::ALL
            .iter()
            .copied()
            .filter(|&d| simulate(&board, d).moved)
            .collect();
        assert!(!legal.is_empty());
        let chosen = ai().best_move(&board, AiMode::Fast);
        assert!(chosen.is_some());
        assert!(legal.contains(&chosen.unwrap()));
    }

    #[test]
    fn cached_and_uncached_scores_agree() {
        let board = Board::from_values(4, &[
            64, 32, 16, 8,
            4, 2, 2, 0,
            2, 0, 0, 0,
            0, 0, 0, 0,
        ]);
        let uncached_cfg = SearchConfig {
            cache_enabled: false,
            ..SearchConfig::default()
        };
        for mode in [AiMode::Balanced, AiMode::Optimal, AiMode::NTuple] {
            let evaluator = Arc::new(NTupleEvaluator::with_default(4));
            let mut cached = Ai::with_seed(evaluator.clone(), SearchConfig::default(), 11);
            let mut uncached = Ai::with_seed(evaluator, uncached_cfg, 11);
            assert_eq!(
                cached.state_value(&board, mode),
                uncached.state_value(&board, mode),
                "{mode:?}"
            );
        }
    }

    #[test]
    fn depth_zero_expectimax_equals_leaf_score() {
        let board = Board::from_values(4, &[
            8, 4, 2, 0,
            2, 2, 0, 0,
            0, 0, 0, 0,
            0, 0, 0, 0,
        ]);
        let cfg = SearchConfig {
            depth_cap: Some(0),
            ..SearchConfig::default()
        };
        let evaluator = Arc::new(NTupleEvaluator::with_default(4));
        let mut ai = Ai::with_seed(evaluator.clone(), cfg, 3);
        assert_eq!(
            ai.state_value(&board, AiMode::Optimal),
            heuristic::evaluate(&board, &EvalWeights::optimal())
        );
        assert_eq!(
            ai.state_value(&board, AiMode::NTuple),
            evaluator.evaluate(&board)
        );
    }

    #[test]
    fn stats_track_visited_nodes() {
        let board = Board::from_values(4, &[
            4, 2, 0, 0,
            2, 2, 0, 0,
            0, 0, 0, 0,
            0, 0, 0, 0,
        ]);
        let mut ai = ai();
        ai.best_move(&board, AiMode::Optimal);
        let stats = ai.last_stats();
        assert!(stats.nodes > 0);
        assert!(stats.peak_nodes >= stats.nodes);
        ai.reset_stats();
        assert_eq!(ai.last_stats().nodes, 0);
    }
}
