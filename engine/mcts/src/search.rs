//! Multi-threaded search driver.
//!
//! Implements the search loop every worker thread runs against one shared
//! tree:
//! 1. Selection: descend by the configured strategy, claiming a virtual
//!    visit per node to steer concurrent workers apart
//! 2. Expansion: claim one unexpanded child slot; losers of the claim race
//!    reuse the winner's node
//! 3. Playout: score the new leaf with the configured playout strategy, or
//!    read the exact result off a terminal or proven node
//! 4. Backpropagation: fold the utilities into every node on the path,
//!    carrying solver proofs upward as far as they hold
//!
//! Workers stop when the time or iteration budget runs out or the root's
//! value is proven. Budget checks happen between iterations; an iteration
//! in flight always runs to completion.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use engine_core::{Game, GameError};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, FinalMoveKind, PlayoutKind, SearchConfig, SelectionKind};
use crate::evaluator::{CachingEvaluator, Evaluator, EvaluatorError};
use crate::minimax::propagate_expansion;
use crate::node::{Node, Proof, TreeContext, PROVEN_SCORE};
use crate::playout::{EpsilonGreedyPlayout, PlayoutStrategy, RandomPlayout};
use crate::recommend::{FinalMoveStrategy, RobustChild, SecureChild};
use crate::scored::{ScoredMove, ScoredMoveList};
use crate::select::{Descent, ProofBiasedEpsilonGreedy, SelectionStrategy, Ucb1};
use crate::tt::TranspositionTable;

/// Errors that can occur while building a searcher or running a search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("evaluator error: {0}")]
    Evaluator(#[from] EvaluatorError),

    #[error("game error: {0}")]
    Game(#[from] GameError),

    /// A statistics or scaling invariant was broken. The node hash and its
    /// depth identify the position so the failure can be reproduced.
    #[error("invariant violated at node {hash:#018x} (depth {depth}): {detail}")]
    InvariantViolation { hash: u64, depth: usize, detail: String },

    #[error("no legal moves at the searched position")]
    NoLegalMoves,

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

impl SearchError {
    /// Whether the error corrupts only its own iteration. A game failure on
    /// an exploratory position copy does; everything else aborts the search.
    fn abandons_iteration_only(&self) -> bool {
        matches!(
            self,
            SearchError::Game(_) | SearchError::Evaluator(EvaluatorError::Game(_))
        )
    }
}

/// Bounds on one [`Searcher::select_move`] call.
///
/// At least one of time or iterations must be set; a depth bound alone
/// never stops the search.
#[derive(Debug, Clone, Copy)]
pub struct SearchBudget {
    pub max_time: Option<Duration>,
    pub max_iterations: Option<u64>,
    /// Tree depth at which selection stops descending and plays out.
    pub max_depth: Option<usize>,
}

impl SearchBudget {
    pub fn by_time(limit: Duration) -> Self {
        Self { max_time: Some(limit), max_iterations: None, max_depth: None }
    }

    pub fn by_iterations(limit: u64) -> Self {
        Self { max_time: None, max_iterations: Some(limit), max_depth: None }
    }

    pub fn with_max_time(mut self, limit: Duration) -> Self {
        self.max_time = Some(limit);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_time.is_none() && self.max_iterations.is_none() {
            return Err(ConfigError::UnboundedBudget);
        }
        Ok(())
    }
}

/// Everything a finished search reports.
#[derive(Debug, Clone)]
pub struct SearchOutcome<M> {
    /// The move to play.
    pub mv: M,

    /// Expected score of the chosen move for the root mover. Carries the
    /// proof sentinel when the move's outcome is proven.
    pub value: f64,

    /// Visits accumulated at the root.
    pub root_visits: u32,

    /// Iterations that completed backpropagation.
    pub iterations: u64,

    /// Iterations rolled back after a game error on an exploratory copy.
    pub abandoned: u64,

    pub elapsed: Duration,

    /// Proof status of the root for its mover.
    pub proof: Proof,

    /// Every root move with its final statistics, best first.
    pub moves: ScoredMoveList<M>,
}

/// Builds one evaluator per worker thread from the worker index. Workers
/// meant to share a single evaluator (batching backends) return clones of
/// an `Arc` instead of fresh instances.
pub type EvaluatorFactory<G> = Arc<dyn Fn(usize) -> Box<dyn Evaluator<G>> + Send + Sync>;

/// Stop signal and accounting shared by the workers of one search.
struct SearchShared {
    stop: AtomicBool,
    claimed: AtomicU64,
    completed: AtomicU64,
    abandoned: AtomicU64,
    deadline: Option<Instant>,
    fatal: Mutex<Option<SearchError>>,
}

impl SearchShared {
    fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Keeps the first fatal error and stops every worker.
    fn record_fatal(&self, err: SearchError) {
        let mut slot = self.fatal.lock().unwrap();
        if slot.is_none() {
            *slot = Some(err);
        }
        drop(slot);
        self.request_stop();
    }
}

/// A reusable multi-threaded searcher for one game.
///
/// The worker pool, strategies, and optional value table live as long as
/// the searcher; every [`select_move`](Self::select_move) call builds a
/// fresh tree. The value table persists across calls so consecutive
/// searches share cached evaluations, with its stamp advanced and stale
/// entries swept after each search.
pub struct Searcher<G: Game> {
    ctx: TreeContext<G>,
    config: SearchConfig,
    evaluators: Vec<Box<dyn Evaluator<G>>>,
    selection: Box<dyn SelectionStrategy<G>>,
    playout: Box<dyn PlayoutStrategy<G>>,
    final_move: Box<dyn FinalMoveStrategy<G>>,
    value_table: Option<Arc<TranspositionTable<f64>>>,
    pool: rayon::ThreadPool,
}

impl<G: Game> std::fmt::Debug for Searcher<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Searcher").field("config", &self.config).finish_non_exhaustive()
    }
}

impl<G: Game> Searcher<G> {
    /// Validates the configuration and wires up strategies, per-worker
    /// evaluators, and the thread pool.
    ///
    /// Fails fast when the solver or implicit minimax is enabled for a
    /// game without exactly two agents, and when batched evaluation is
    /// requested but the factory's evaluators report no batch support.
    pub fn new(
        game: Arc<G>,
        config: SearchConfig,
        factory: EvaluatorFactory<G>,
    ) -> Result<Self, SearchError> {
        config.validate()?;
        let num_agents = game.num_agents();
        if (config.proof_aware || config.implicit_minimax) && num_agents != 2 {
            return Err(ConfigError::UnsupportedAgentCount(num_agents).into());
        }

        let value_table = if config.use_transposition_table {
            Some(Arc::new(TranspositionTable::new(
                config.num_bits_primary_code,
                config.retention_offset,
            )))
        } else {
            None
        };

        let mut evaluators: Vec<Box<dyn Evaluator<G>>> = Vec::with_capacity(config.num_threads);
        for index in 0..config.num_threads {
            let base = factory(index);
            evaluators.push(match &value_table {
                Some(table) => Box::new(CachingEvaluator::new(
                    base,
                    Arc::clone(&game),
                    Arc::clone(table),
                )),
                None => base,
            });
        }
        if config.batched_evaluation && !evaluators.iter().all(|e| e.supports_batch()) {
            return Err(ConfigError::BatchingUnsupported.into());
        }

        let selection = build_selection::<G>(&config);
        let playout = build_playout::<G>(&config);
        let final_move = build_final_move::<G>(&config);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .thread_name(|i| format!("mcts-{i}"))
            .build()
            .map_err(|e| SearchError::ThreadPool(e.to_string()))?;

        Ok(Self {
            ctx: TreeContext {
                game,
                num_agents,
                proof_aware: config.proof_aware,
                implicit_minimax: config.implicit_minimax,
            },
            config,
            evaluators,
            selection,
            playout,
            final_move,
            value_table,
            pool,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The value table shared across this searcher's searches, if enabled.
    pub fn value_table(&self) -> Option<&Arc<TranspositionTable<f64>>> {
        self.value_table.as_ref()
    }

    /// Searches `position` until the budget is spent or the root is proven,
    /// then picks the move to play with the final-move strategy.
    pub fn select_move(
        &self,
        position: &G::Position,
        budget: SearchBudget,
    ) -> Result<SearchOutcome<G::Move>, SearchError> {
        budget.validate()?;
        let start = Instant::now();
        debug!(
            game = self.ctx.game.id(),
            threads = self.config.num_threads,
            ?budget,
            "search starting"
        );

        let root = Node::build_root(&self.ctx, position.clone(), self.evaluators[0].as_ref())?;
        if root.num_moves() == 0 {
            return Err(SearchError::NoLegalMoves);
        }

        let shared = SearchShared {
            stop: AtomicBool::new(false),
            claimed: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
            deadline: budget.max_time.map(|limit| start + limit),
            fatal: Mutex::new(None),
        };

        self.pool.broadcast(|worker_ctx| {
            let index = worker_ctx.index();
            let mut rng = self.worker_rng(index);
            self.worker(&root, &shared, budget, self.evaluators[index].as_ref(), &mut rng);
        });

        if let Some(err) = shared.fatal.lock().unwrap().take() {
            return Err(err);
        }

        if let Some(table) = &self.value_table {
            table.update_stamp();
            table.sweep();
        }

        let mut rng = match self.config.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        };
        let slot = self
            .final_move
            .choose(&root, &mut rng)
            .ok_or(SearchError::NoLegalMoves)?;
        let mover = root.mover();
        let mv = root.moves()[slot].clone();
        let value = root.child(slot).map_or(0.0, |child| child.expected_score(mover));

        let entries = root
            .moves()
            .iter()
            .enumerate()
            .map(|(child_slot, candidate)| match root.child(child_slot) {
                Some(child) => ScoredMove {
                    mv: candidate.clone(),
                    score: child.expected_score(mover),
                    visits: u64::from(child.visits()),
                    resolved: child.is_resolved(),
                    completion: match child.proof(mover) {
                        Proof::Win => 1.0,
                        Proof::Loss => -1.0,
                        Proof::Unproven => 0.0,
                    },
                },
                None => ScoredMove {
                    mv: candidate.clone(),
                    score: 0.0,
                    visits: 0,
                    resolved: false,
                    completion: 0.0,
                },
            })
            .collect();

        let outcome = SearchOutcome {
            mv,
            value,
            root_visits: root.visits(),
            iterations: shared.completed.load(Ordering::Relaxed),
            abandoned: shared.abandoned.load(Ordering::Relaxed),
            elapsed: start.elapsed(),
            proof: root.proof(mover),
            moves: ScoredMoveList::new(entries),
        };
        info!(
            game = self.ctx.game.id(),
            iterations = outcome.iterations,
            abandoned = outcome.abandoned,
            root_visits = outcome.root_visits,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            value = outcome.value,
            proof = ?outcome.proof,
            chosen = ?outcome.mv,
            "search finished"
        );
        Ok(outcome)
    }

    fn worker_rng(&self, index: usize) -> ChaCha20Rng {
        match self.config.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed.wrapping_add(1 + index as u64)),
            None => ChaCha20Rng::from_entropy(),
        }
    }

    /// One thread's iteration loop.
    fn worker(
        &self,
        root: &Arc<Node<G>>,
        shared: &SearchShared,
        budget: SearchBudget,
        evaluator: &dyn Evaluator<G>,
        rng: &mut ChaCha20Rng,
    ) {
        loop {
            if shared.stopped() {
                return;
            }
            if self.ctx.proof_aware && root.is_resolved() {
                debug!(game = self.ctx.game.id(), "root proven, stopping");
                shared.request_stop();
                return;
            }
            if let Some(deadline) = shared.deadline {
                if Instant::now() >= deadline {
                    shared.request_stop();
                    return;
                }
            }
            if let Some(limit) = budget.max_iterations {
                if shared.claimed.fetch_add(1, Ordering::Relaxed) >= limit {
                    shared.request_stop();
                    return;
                }
            }
            match self.run_iteration(root, shared, evaluator, budget.max_depth, rng) {
                Ok(()) => {
                    shared.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) if err.abandons_iteration_only() => {
                    shared.abandoned.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %err, "iteration abandoned");
                }
                Err(err) => {
                    shared.record_fatal(err);
                    return;
                }
            }
        }
    }

    /// One select→expand→playout→backpropagate pass over the shared tree.
    fn run_iteration(
        &self,
        root: &Arc<Node<G>>,
        shared: &SearchShared,
        evaluator: &dyn Evaluator<G>,
        max_depth: Option<usize>,
        rng: &mut ChaCha20Rng,
    ) -> Result<(), SearchError> {
        let mut path = Vec::new();
        root.add_virtual_visit();
        path.push(Arc::clone(root));

        match self.descend(&mut path, shared, evaluator, max_depth, rng) {
            Ok(utilities) => self.backpropagate(&path, utilities),
            Err(err) => {
                // Release every virtual visit claimed on the way down.
                for node in &path {
                    node.cancel_virtual_visit();
                }
                Err(err)
            }
        }
    }

    /// Walks from the root to the node this iteration scores, claiming one
    /// virtual visit per node touched. `path` ends at the node the returned
    /// utilities describe.
    fn descend(
        &self,
        path: &mut Vec<Arc<Node<G>>>,
        shared: &SearchShared,
        evaluator: &dyn Evaluator<G>,
        max_depth: Option<usize>,
        rng: &mut ChaCha20Rng,
    ) -> Result<Vec<f64>, SearchError> {
        let game = self.ctx.game.as_ref();
        let mut node = Arc::clone(&path[0]);
        loop {
            if node.is_terminal() || (self.ctx.proof_aware && node.is_resolved()) {
                return Ok(node.resolved_utilities(&self.ctx));
            }
            if max_depth.map_or(false, |limit| node.depth() >= limit) {
                return self.playout.playout(game, node.position(), node.depth(), evaluator, rng);
            }

            let descent = self.selection.select(&node, rng);
            if matches!(descent, Descent::AllLost(_)) && node.depth() == 0 {
                // Every root reply is refuted; searching further is useless.
                shared.request_stop();
            }

            let (child, created) = node.child_or_build(&self.ctx, descent.slot(), evaluator)?;
            child.add_virtual_visit();
            path.push(Arc::clone(&child));
            if created {
                if self.ctx.implicit_minimax {
                    propagate_expansion(&child);
                }
                if child.is_terminal() || (self.ctx.proof_aware && child.is_resolved()) {
                    return Ok(child.resolved_utilities(&self.ctx));
                }
                return self
                    .playout
                    .playout(game, child.position(), child.depth(), evaluator, rng);
            }
            node = child;
        }
    }

    /// Folds one iteration's utilities into every node on the path, leaf
    /// first.
    ///
    /// In solver mode a sentinel vector walks upward as long as its proof
    /// holds: a win for a node's mover always does, since the mover picks
    /// that child; a loss holds only once every child of the node is a
    /// proven loss. Where a loss proof stalls, the iteration downgrades to
    /// an ordinary unit-score loss from that node upward.
    fn backpropagate(
        &self,
        path: &[Arc<Node<G>>],
        mut utilities: Vec<f64>,
    ) -> Result<(), SearchError> {
        for node in path.iter().rev() {
            if self.ctx.proof_aware {
                let mover = node.mover();
                if utilities[mover.index()] == -PROVEN_SCORE
                    && !node.all_children_proven_loss(mover)
                {
                    for (agent, utility) in utilities.iter_mut().enumerate() {
                        *utility = if agent == mover.index() { -1.0 } else { 1.0 };
                    }
                }
            }
            node.update(&utilities)?;
        }
        Ok(())
    }
}

fn build_selection<G: Game>(config: &SearchConfig) -> Box<dyn SelectionStrategy<G>> {
    let blend = if config.implicit_minimax { config.minimax_blend_weight } else { 0.0 };
    let base = Ucb1::new(config.exploration_constant, blend);
    match config.selection {
        SelectionKind::Ucb1 => Box::new(base),
        SelectionKind::EpsilonGreedy => {
            Box::new(ProofBiasedEpsilonGreedy::new(config.epsilon, Box::new(base)))
        }
    }
}

fn build_playout<G: Game>(config: &SearchConfig) -> Box<dyn PlayoutStrategy<G>> {
    match config.playout {
        PlayoutKind::Random => Box::new(RandomPlayout::new(config.playout_turn_limit)),
        PlayoutKind::EpsilonGreedy => Box::new(EpsilonGreedyPlayout::new(
            config.epsilon,
            config.playout_turn_limit,
            config.decisive_threshold,
        )),
    }
}

fn build_final_move<G: Game>(config: &SearchConfig) -> Box<dyn FinalMoveStrategy<G>> {
    match config.final_move {
        FinalMoveKind::RobustChild => Box::new(RobustChild),
        FinalMoveKind::SecureChild => Box::new(SecureChild::new(config.unvisited_move_value)),
    }
}
