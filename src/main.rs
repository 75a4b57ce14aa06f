use std::sync::Arc;

use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};

use slide_ai::engine::Board;
use slide_ai::ntuple::{FileWeightSource, NTupleEvaluator, WeightSource};
use slide_ai::search::{Ai, AiMode, SearchConfig};

#[derive(Parser, Debug)]
#[command(about = "Self-play a sliding-tile merge game with the AI core")]
struct Args {
    /// Decision mode: fast, balanced, optimal or ntuple
    #[arg(long, default_value = "optimal", value_parser = parse_mode)]
    mode: AiMode,
    /// Board side length (4..=7)
    #[arg(long, default_value_t = 4)]
    size: usize,
    /// Number of games to play
    #[arg(long, default_value_t = 1)]
    games: u32,
    /// RNG seed for reproducible games
    #[arg(long)]
    seed: Option<u64>,
    /// Optional trained n-tuple weight file (postcard-encoded PatternSet)
    #[arg(long)]
    weights: Option<String>,
    /// Print every board along the way
    #[arg(long)]
    verbose: bool,
}

fn parse_mode(s: &str) -> Result<AiMode, String> {
    match s {
        "fast" => Ok(AiMode::Fast),
        "balanced" => Ok(AiMode::Balanced),
        "optimal" => Ok(AiMode::Optimal),
        "ntuple" => Ok(AiMode::NTuple),
        other => Err(format!(
            "unknown mode '{other}' (expected fast, balanced, optimal or ntuple)"
        )),
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let evaluator = Arc::new(NTupleEvaluator::with_default(args.size));
    if let Some(path) = &args.weights {
        match FileWeightSource::new(path).load() {
            Ok(set) => match evaluator.replace(set) {
                Ok(()) => log::info!("loaded trained weights from {path}"),
                Err(err) => log::warn!("rejected weights from {path}: {err}"),
            },
            Err(err) => log::warn!("failed to load weights from {path}: {err}"),
        }
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    for game in 1..=args.games {
        let mut ai = match args.seed {
            Some(seed) => Ai::with_seed(evaluator.clone(), SearchConfig::default(), seed),
            None => Ai::new(evaluator.clone()),
        };
        let mut board = Board::empty(args.size)
            .with_random_tile(&mut rng)
            .with_random_tile(&mut rng);
        let mut moves = 0u64;
        let mut score = 0u64;
        while !board.is_game_over() {
            let Some(dir) = ai.best_move(&board, args.mode) else {
                break;
            };
            let res = slide_ai::engine::simulate(&board, dir);
            score += res.score_delta;
            board = res.board.with_random_tile(&mut rng);
            moves += 1;
            if args.verbose {
                println!("{board}");
            }
        }
        println!(
            "game {game}: {moves} moves, score {score}, highest tile {}, peak nodes {}",
            board.highest_tile(),
            ai.last_stats().peak_nodes
        );
    }
}
