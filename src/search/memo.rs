use ahash::RandomState;
use std::collections::HashMap;

use crate::engine::Board;

/// Which side of the alternating game tree a cached score belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Ply {
    Agent,
    Chance,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct MemoKey {
    pub board: Board,
    pub depth: u8,
    pub ply: Ply,
}

/// Bounded score cache keyed on (board, remaining depth, ply kind).
///
/// When an insert pushes the table past its ceiling the whole table is
/// cleared; recomputation is cheap relative to unbounded memory growth, so
/// no partial eviction is attempted.
pub(crate) struct MemoTable {
    entries: HashMap<MemoKey, f64, RandomState>,
    ceiling: usize,
}

impl MemoTable {
    pub fn with_ceiling(ceiling: usize) -> Self {
        MemoTable {
            entries: HashMap::with_hasher(RandomState::new()),
            ceiling,
        }
    }

    pub fn get(&self, board: &Board, depth: u8, ply: Ply) -> Option<f64> {
        let key = MemoKey {
            board: board.clone(),
            depth,
            ply,
        };
        self.entries.get(&key).copied()
    }

    pub fn insert(&mut self, board: &Board, depth: u8, ply: Ply, score: f64) {
        self.entries.insert(
            MemoKey {
                board: board.clone(),
                depth,
                ply,
            },
            score,
        );
        if self.entries.len() > self.ceiling {
            self.entries.clear();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
