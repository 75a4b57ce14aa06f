use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;

use slide_ai::engine::{simulate, Board, Move};
use slide_ai::ntuple::NTupleEvaluator;
use slide_ai::search::{Ai, AiMode, SearchConfig};

fn corpus() -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(7777);
    let mut boards = Vec::new();
    let mut b = Board::empty(4)
        .with_random_tile(&mut rng)
        .with_random_tile(&mut rng);
    boards.push(b.clone());
    let seq = [Move::Left, Move::Up, Move::Right, Move::Down];
    for i in 0..32 {
        let res = simulate(&b, seq[i % seq.len()]);
        if res.moved {
            b = res.board.with_random_tile(&mut rng);
        }
        boards.push(b.clone());
    }
    boards
}

fn bench_search(c: &mut Criterion) {
    let boards = corpus();
    let evaluator = Arc::new(NTupleEvaluator::with_default(4));

    for (name, mode) in [
        ("search/fast", AiMode::Fast),
        ("search/minimax", AiMode::Balanced),
        ("search/expectimax", AiMode::Optimal),
        ("search/expectimax_ntuple", AiMode::NTuple),
    ] {
        let mut ai = Ai::with_seed(evaluator.clone(), SearchConfig::default(), 99);
        c.bench_function(name, |bch| {
            bch.iter(|| {
                let mut legal = 0u32;
                for bd in &boards {
                    if ai.best_move(bd, mode).is_some() {
                        legal += 1;
                    }
                }
                black_box(legal)
            })
        });
    }
}

criterion_group!(search, bench_search);
criterion_main!(search);
