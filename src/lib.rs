//! slide-ai: a decision-making core for N×N sliding-tile merge puzzles.
//!
//! This crate provides:
//! - A value-type `Board` with pure move simulation (`engine` module)
//! - Stateless heuristic evaluation with preset weight sets (`heuristic`)
//! - A learned N-Tuple evaluator with swappable weight sets (`ntuple`)
//! - Minimax and expectimax searches behind a mode dispatch (`search`)
//! - A cancellable autoplay scheduler driving an external game (`scheduler`)
//!
//! Quick start:
//! ```
//! use std::sync::Arc;
//! use rand::{rngs::StdRng, SeedableRng};
//! use slide_ai::engine::Board;
//! use slide_ai::ntuple::NTupleEvaluator;
//! use slide_ai::search::{Ai, AiMode};
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let mut board = Board::empty(4)
//!     .with_random_tile(&mut rng)
//!     .with_random_tile(&mut rng);
//!
//! let mut ai = Ai::new(Arc::new(NTupleEvaluator::with_default(4)));
//! let mut moves = 0u32;
//! while !board.is_game_over() && moves < 4 {
//!     match ai.best_move(&board, AiMode::Balanced) {
//!         Some(dir) => {
//!             board = board.make_move(dir, &mut rng);
//!             moves += 1;
//!         }
//!         None => break,
//!     }
//! }
//! assert!(moves > 0);
//! ```
pub mod engine;
pub mod heuristic;
pub mod ntuple;
pub mod scheduler;
pub mod search;
