//! The autoplay scheduler: a state machine (Idle/Running) driving repeated
//! choose-move/apply cycles on a worker thread at a configurable cadence.
//!
//! The worker owns all mutable scheduling state and is steered through a
//! command channel; waits between cycles are `recv_timeout` calls, so stop,
//! speed changes and teardown cancel any pending wait immediately. Trained
//! n-tuple weights load on a separate background thread and are installed
//! between cycles; until then the previous evaluator stays active.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{info, warn};

use crate::engine::{Board, Move};
use crate::ntuple::{NTupleEvaluator, WeightError, WeightSource};
use crate::search::{Ai, AiMode};

/// Inter-move delay presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveSpeed {
    Turbo,
    Fast,
    Normal,
    Slow,
}

impl MoveSpeed {
    /// Delay between cycles. Turbo is zero: cycles repeat back to back with
    /// only a cooperative yield in between.
    pub fn delay(self) -> Duration {
        match self {
            MoveSpeed::Turbo => Duration::ZERO,
            MoveSpeed::Fast => Duration::from_millis(100),
            MoveSpeed::Normal => Duration::from_millis(300),
            MoveSpeed::Slow => Duration::from_millis(500),
        }
    }
}

/// Hooks into the external game-state owner.
pub struct SchedulerCallbacks {
    /// Latest board snapshot.
    pub board: Box<dyn Fn() -> Board + Send>,
    /// Externally-reported game-over flag.
    pub game_over: Box<dyn Fn() -> bool + Send>,
    /// Apply a chosen move (with animation).
    pub apply_move: Box<dyn FnMut(Move) + Send>,
    /// Animation-skipping variant, used only at Turbo speed.
    pub apply_move_immediate: Option<Box<dyn FnMut(Move) + Send>>,
}

enum Command {
    Start,
    Stop,
    SetMode(AiMode),
    SetSpeed(MoveSpeed),
    Shutdown,
}

struct Shared {
    running: AtomicBool,
    mode: Mutex<AiMode>,
    speed: Mutex<MoveSpeed>,
    last_error: Mutex<Option<String>>,
}

/// Handle to the scheduler worker. Dropping it tears the worker down; no
/// callback fires afterwards.
pub struct Scheduler {
    tx: mpsc::Sender<Command>,
    shared: Arc<Shared>,
    join: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn the worker thread in the Idle state.
    ///
    /// `weight_source`, when present, supplies trained n-tuple weights the
    /// first time the mode switches to [`AiMode::NTuple`].
    pub fn spawn(
        callbacks: SchedulerCallbacks,
        ai: Ai,
        evaluator: Arc<NTupleEvaluator>,
        weight_source: Option<Arc<dyn WeightSource>>,
    ) -> Self {
        let shared = Arc::new(Shared {
            running: AtomicBool::new(false),
            mode: Mutex::new(AiMode::Fast),
            speed: Mutex::new(MoveSpeed::Normal),
            last_error: Mutex::new(None),
        });
        let (tx, rx) = mpsc::channel();
        let worker_shared = Arc::clone(&shared);
        let join = std::thread::spawn(move || {
            let mut worker = Worker {
                callbacks,
                ai,
                evaluator,
                weight_source,
                shared: worker_shared,
                rx,
                running: false,
                mode: AiMode::Fast,
                speed: MoveSpeed::Normal,
                pending_load: None,
                weights_loaded: false,
            };
            worker.run();
        });
        Scheduler {
            tx,
            shared,
            join: Some(join),
        }
    }

    /// Transition Idle -> Running and perform one cycle immediately.
    /// A no-op when the game is already over or the worker is running.
    pub fn start(&self) {
        let _ = self.tx.send(Command::Start);
    }

    /// Transition Running -> Idle, cancelling any pending wait.
    pub fn stop(&self) {
        let _ = self.tx.send(Command::Stop);
    }

    /// Switch the mode for subsequent cycles without interrupting the
    /// schedule. Switching to NTuple may trigger a background weight load;
    /// the mode change is held pending until the load resolves.
    pub fn set_mode(&self, mode: AiMode) {
        let _ = self.tx.send(Command::SetMode(mode));
    }

    /// Change the cadence; a pending wait is cancelled and re-armed with
    /// the new delay.
    pub fn set_speed(&self, speed: MoveSpeed) {
        let _ = self.tx.send(Command::SetSpeed(speed));
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn mode(&self) -> AiMode {
        *lock(&self.shared.mode)
    }

    pub fn speed(&self) -> MoveSpeed {
        *lock(&self.shared.speed)
    }

    /// Most recent surfaced error (weight-load failure or a contained
    /// search panic), if any. The worker keeps going after either.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.shared.last_error).clone()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How long an idle worker sleeps between polls of an in-flight weight load.
const LOAD_POLL: Duration = Duration::from_millis(10);

struct Worker {
    callbacks: SchedulerCallbacks,
    ai: Ai,
    evaluator: Arc<NTupleEvaluator>,
    weight_source: Option<Arc<dyn WeightSource>>,
    shared: Arc<Shared>,
    rx: mpsc::Receiver<Command>,
    running: bool,
    mode: AiMode,
    speed: MoveSpeed,
    /// In-flight background weight load; resolving it completes a pending
    /// switch to NTuple mode.
    pending_load: Option<mpsc::Receiver<Result<crate::ntuple::PatternSet, WeightError>>>,
    weights_loaded: bool,
}

impl Worker {
    fn run(&mut self) {
        loop {
            self.poll_pending_load();
            if self.running {
                let delay = self.speed.delay();
                if delay.is_zero() {
                    // Turbo: drain commands so stop is never starved, run a
                    // cycle, then yield to stay cooperative.
                    loop {
                        match self.rx.try_recv() {
                            Ok(Command::Shutdown) => return,
                            Ok(cmd) => self.handle(cmd),
                            Err(TryRecvError::Empty) => break,
                            Err(TryRecvError::Disconnected) => return,
                        }
                    }
                    if self.running {
                        self.cycle();
                        std::thread::yield_now();
                    }
                } else {
                    match self.rx.recv_timeout(delay) {
                        Ok(Command::Shutdown) => return,
                        Ok(cmd) => self.handle(cmd),
                        Err(RecvTimeoutError::Timeout) => self.cycle(),
                        Err(RecvTimeoutError::Disconnected) => return,
                    }
                }
            } else if self.pending_load.is_some() {
                match self.rx.recv_timeout(LOAD_POLL) {
                    Ok(Command::Shutdown) => return,
                    Ok(cmd) => self.handle(cmd),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            } else {
                match self.rx.recv() {
                    Ok(Command::Shutdown) => return,
                    Ok(cmd) => self.handle(cmd),
                    Err(_) => return,
                }
            }
        }
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Start => {
                if (self.callbacks.game_over)() {
                    info!("start ignored: game is over");
                    return;
                }
                if !self.running {
                    self.set_running(true);
                    info!("scheduler started in {:?} mode", self.mode);
                    self.cycle();
                }
            }
            Command::Stop => {
                if self.running {
                    self.set_running(false);
                    info!("scheduler stopped");
                }
            }
            Command::SetMode(mode) => self.switch_mode(mode),
            Command::SetSpeed(speed) => {
                self.speed = speed;
                *lock(&self.shared.speed) = speed;
            }
            Command::Shutdown => unreachable!("handled by the run loop"),
        }
    }

    fn switch_mode(&mut self, mode: AiMode) {
        if mode == AiMode::NTuple && !self.weights_loaded {
            if let Some(source) = self.weight_source.clone() {
                if self.pending_load.is_none() {
                    info!("loading n-tuple weights in the background");
                    let (tx, rx) = mpsc::channel();
                    std::thread::spawn(move || {
                        let _ = tx.send(source.load());
                    });
                    self.pending_load = Some(rx);
                }
                // Mode switch held pending until the load resolves.
                return;
            }
            // No source configured: the default set is already active.
            self.weights_loaded = true;
        }
        self.mode = mode;
        *lock(&self.shared.mode) = mode;
        info!("mode set to {mode:?}");
    }

    fn poll_pending_load(&mut self) {
        let Some(rx) = &self.pending_load else {
            return;
        };
        match rx.try_recv() {
            Ok(Ok(set)) => {
                self.pending_load = None;
                match self.evaluator.replace(set) {
                    Ok(()) => {
                        self.weights_loaded = true;
                        self.mode = AiMode::NTuple;
                        *lock(&self.shared.mode) = AiMode::NTuple;
                        info!("n-tuple weights installed; mode set to NTuple");
                    }
                    Err(err) => self.surface_error(err.to_string()),
                }
            }
            Ok(Err(err)) => {
                self.pending_load = None;
                self.surface_error(err.to_string());
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.pending_load = None;
                self.surface_error("weight loader stopped without a result".to_string());
            }
        }
    }

    /// One choose-move/apply cycle. A terminal board is a quiet no-op;
    /// an externally-flipped game-over flag forces Idle; a panicking
    /// evaluator is contained and surfaced instead of escaping the loop.
    fn cycle(&mut self) {
        if (self.callbacks.game_over)() {
            if self.running {
                self.set_running(false);
                info!("game over; scheduler idle");
            }
            return;
        }
        let board = (self.callbacks.board)();
        let mode = self.mode;
        let chosen = catch_unwind(AssertUnwindSafe(|| self.ai.best_move(&board, mode)));
        match chosen {
            Ok(Some(dir)) => {
                if self.speed == MoveSpeed::Turbo {
                    if let Some(apply) = self.callbacks.apply_move_immediate.as_mut() {
                        apply(dir);
                        return;
                    }
                }
                (self.callbacks.apply_move)(dir);
            }
            Ok(None) => {
                // No legal move; the owner is expected to flip game-over.
            }
            Err(_) => {
                self.set_running(false);
                self.surface_error(format!("search panicked in {mode:?} mode"));
            }
        }
    }

    fn set_running(&mut self, running: bool) {
        self.running = running;
        self.shared.running.store(running, Ordering::SeqCst);
    }

    fn surface_error(&self, message: String) {
        warn!("{message}");
        *lock(&self.shared.last_error) = Some(message);
    }
}
