//! Learned additive evaluation over fixed board sub-patterns.
//!
//! A [`PatternSet`] holds a list of cell patterns and one weight vector per
//! pattern, indexed by the base-16 number formed from the tile exponents the
//! pattern covers. [`NTupleEvaluator`] wraps the active set behind an
//! atomic-by-replacement swap so a background loader can install trained
//! weights without invalidating evaluations already in flight.
//!
//! A deterministic default set is always available synchronously, so
//! evaluation never blocks on I/O.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::engine::Board;

/// Exponents are indexed base-16; values above 15 clamp to 15.
const EXPONENT_BASE: usize = 16;
const MAX_EXPONENT: u8 = 15;

/// An ordered list of board coordinates covered by one tuple, typically
/// 4 to 6 cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub cells: Vec<(usize, usize)>,
}

impl Pattern {
    pub fn new(cells: Vec<(usize, usize)>) -> Self {
        Pattern { cells }
    }

    /// Weight index for this pattern on `board`: the base-16 number formed
    /// from the covered exponents, first cell most significant.
    fn index(&self, board: &Board) -> usize {
        self.cells.iter().fold(0usize, |key, &(r, c)| {
            key * EXPONENT_BASE + board.exponent(r, c).min(MAX_EXPONENT) as usize
        })
    }
}

/// A versioned set of patterns plus one weight vector per pattern.
///
/// `version` and `metadata` record training provenance and do not affect
/// evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSet {
    pub version: u32,
    pub metadata: String,
    patterns: Vec<Pattern>,
    weights: Vec<Vec<f32>>,
}

/// Recoverable weight-set failures. Never fatal: callers keep the previous
/// (or default) set active.
#[derive(thiserror::Error, Debug)]
pub enum WeightError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("weight decode error: {0}")]
    Decode(#[from] postcard::Error),
    #[error("invalid weight set: {0}")]
    Invalid(String),
}

impl PatternSet {
    /// Build a set from explicit patterns and weights.
    ///
    /// Returns `WeightError::Invalid` when the two lists disagree in length
    /// or a pattern is empty.
    pub fn new(
        version: u32,
        metadata: impl Into<String>,
        patterns: Vec<Pattern>,
        weights: Vec<Vec<f32>>,
    ) -> Result<Self, WeightError> {
        if patterns.len() != weights.len() {
            return Err(WeightError::Invalid(format!(
                "{} patterns but {} weight vectors",
                patterns.len(),
                weights.len()
            )));
        }
        if patterns.iter().any(|p| p.cells.is_empty()) {
            return Err(WeightError::Invalid("empty pattern".to_string()));
        }
        Ok(PatternSet {
            version,
            metadata: metadata.into(),
            patterns,
            weights,
        })
    }

    /// Deterministic default set for an `n`×`n` board, derived from a snake
    /// gradient so it is usable without any trained data. Rows and columns
    /// contribute 4-cell windows; 2×2 squares cover local structure.
    pub fn default_for(n: usize) -> Self {
        let mut patterns = Vec::new();
        for r in 0..n {
            for start in 0..=(n - 4) {
                patterns.push(Pattern::new((0..4).map(|i| (r, start + i)).collect()));
            }
        }
        for c in 0..n {
            for start in 0..=(n - 4) {
                patterns.push(Pattern::new((0..4).map(|i| (start + i, c)).collect()));
            }
        }
        for r in 0..n - 1 {
            for c in 0..n - 1 {
                patterns.push(Pattern::new(vec![
                    (r, c),
                    (r, c + 1),
                    (r + 1, c),
                    (r + 1, c + 1),
                ]));
            }
        }
        let weights = patterns
            .iter()
            .map(|p| default_weight_vector(p))
            .collect();
        PatternSet {
            version: 0,
            metadata: format!("default snake-gradient set for {n}x{n}"),
            patterns,
            weights,
        }
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Check that every pattern coordinate fits an `n`×`n` board.
    pub fn validate(&self, n: usize) -> Result<(), WeightError> {
        for (i, pattern) in self.patterns.iter().enumerate() {
            for &(r, c) in &pattern.cells {
                if r >= n || c >= n {
                    return Err(WeightError::Invalid(format!(
                        "pattern {i} coordinate ({r}, {c}) outside {n}x{n} board"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Serialize to postcard bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WeightError> {
        Ok(postcard::to_stdvec(self)?)
    }

    /// Deserialize from postcard bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WeightError> {
        Ok(postcard::from_bytes(bytes)?)
    }
}

/// Default weights: each index scores the covered exponents against a
/// corner-decay gradient, favoring large tiles near the (0, 0) corner.
fn default_weight_vector(pattern: &Pattern) -> Vec<f32> {
    let len = EXPONENT_BASE.pow(pattern.cells.len() as u32);
    let grads: Vec<f32> = pattern
        .cells
        .iter()
        .map(|&(r, c)| 16.0 * 0.5f32.powi((r + c) as i32))
        .collect();
    (0..len)
        .map(|key| {
            let mut score = 0.0;
            let mut rest = key;
            for &grad in grads.iter().rev() {
                let exp = (rest % EXPONENT_BASE) as f32;
                score += exp * grad;
                rest /= EXPONENT_BASE;
            }
            score
        })
        .collect()
}

/// Sum of per-pattern weight lookups for `board`. Indices past the end of a
/// weight vector (possible with truncated trained sets) contribute 0.
pub fn evaluate_patterns(board: &Board, set: &PatternSet) -> f64 {
    set.patterns
        .iter()
        .zip(&set.weights)
        .map(|(pattern, weights)| {
            weights.get(pattern.index(board)).copied().unwrap_or(0.0) as f64
        })
        .sum()
}

/// The active pattern evaluator: an explicit instance constructed once and
/// injected where needed, with a swappable active set.
///
/// Swaps are atomic-by-replacement: evaluations that already cloned the
/// active `Arc` keep using the old set, new evaluations read the new one.
pub struct NTupleEvaluator {
    active: RwLock<Arc<PatternSet>>,
    board_size: usize,
}

impl NTupleEvaluator {
    /// Evaluator starting from the default set for an `n`×`n` board.
    pub fn with_default(n: usize) -> Self {
        NTupleEvaluator {
            active: RwLock::new(Arc::new(PatternSet::default_for(n))),
            board_size: n,
        }
    }

    /// Evaluator with an explicit initial set.
    pub fn new(n: usize, set: PatternSet) -> Result<Self, WeightError> {
        set.validate(n)?;
        Ok(NTupleEvaluator {
            active: RwLock::new(Arc::new(set)),
            board_size: n,
        })
    }

    pub fn board_size(&self) -> usize {
        self.board_size
    }

    /// Snapshot of the active set.
    pub fn active(&self) -> Arc<PatternSet> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Score `board` with the currently active set.
    pub fn evaluate(&self, board: &Board) -> f64 {
        let set = self.active();
        evaluate_patterns(board, &set)
    }

    /// Install a new active set; in-flight evaluations keep the old one.
    pub fn replace(&self, set: PatternSet) -> Result<(), WeightError> {
        set.validate(self.board_size)?;
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        *active = Arc::new(set);
        Ok(())
    }

    /// Restore the default set.
    pub fn reset(&self) {
        let default = Arc::new(PatternSet::default_for(self.board_size));
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        *active = default;
    }
}

/// A source of trained weight sets, loaded off the scheduler thread.
pub trait WeightSource: Send + Sync {
    fn load(&self) -> Result<PatternSet, WeightError>;
}

/// Loads a postcard-encoded [`PatternSet`] from a file.
pub struct FileWeightSource {
    path: PathBuf,
}

impl FileWeightSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileWeightSource { path: path.into() }
    }
}

impl WeightSource for FileWeightSource {
    fn load(&self) -> Result<PatternSet, WeightError> {
        let bytes = fs::read(&self.path)?;
        PatternSet::from_bytes(&bytes)
    }
}
