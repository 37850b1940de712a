//! Evaluator trait for position scoring.
//!
//! An evaluator estimates the value of a position for one agent on the
//! heuristic scale of -1.0 (certain loss) to +1.0 (certain win). Search
//! workers each own an evaluator instance created by a factory, so stateful
//! implementations never need internal synchronization for the single-item
//! path. [`CachingEvaluator`] and [`BatchingEvaluator`] wrap an inner
//! evaluator to add transposition-table memoization and cross-worker batch
//! assembly.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use engine_core::{Agent, Game, GameError};
use thiserror::Error;

use crate::tt::TranspositionTable;

/// Errors that can occur during evaluation.
#[derive(Debug, Clone, Error)]
pub enum EvaluatorError {
    #[error("evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error(transparent)]
    Game(#[from] GameError),
}

/// Trait for position evaluators.
///
/// `evaluate_moves` scores the positions reached by each candidate move in
/// one call; the default implementation applies and evaluates them one at a
/// time. Implementations backed by batched inference should report
/// `supports_batch() == true` so a search configured for batched evaluation
/// can reject incompatible evaluators up front.
pub trait Evaluator<G: Game>: Send + Sync {
    /// Estimate the value of `position` for `perspective`, in [-1.0, 1.0].
    fn evaluate(&self, position: &G::Position, perspective: Agent) -> Result<f64, EvaluatorError>;

    /// Score the position reached by each move in `moves`, all from
    /// `perspective`. Results are in `moves` order.
    fn evaluate_moves(
        &self,
        game: &G,
        position: &G::Position,
        moves: &[G::Move],
        perspective: Agent,
    ) -> Result<Vec<f64>, EvaluatorError> {
        moves
            .iter()
            .map(|mv| {
                let next = game.apply(position, mv)?;
                self.evaluate(&next, perspective)
            })
            .collect()
    }

    /// Whether this evaluator assembles true evaluation batches.
    fn supports_batch(&self) -> bool {
        false
    }
}

impl<G: Game, E: Evaluator<G> + ?Sized> Evaluator<G> for Box<E> {
    fn evaluate(&self, position: &G::Position, perspective: Agent) -> Result<f64, EvaluatorError> {
        (**self).evaluate(position, perspective)
    }

    fn evaluate_moves(
        &self,
        game: &G,
        position: &G::Position,
        moves: &[G::Move],
        perspective: Agent,
    ) -> Result<Vec<f64>, EvaluatorError> {
        (**self).evaluate_moves(game, position, moves, perspective)
    }

    fn supports_batch(&self) -> bool {
        (**self).supports_batch()
    }
}

impl<G: Game, E: Evaluator<G> + ?Sized> Evaluator<G> for Arc<E> {
    fn evaluate(&self, position: &G::Position, perspective: Agent) -> Result<f64, EvaluatorError> {
        (**self).evaluate(position, perspective)
    }

    fn evaluate_moves(
        &self,
        game: &G,
        position: &G::Position,
        moves: &[G::Move],
        perspective: Agent,
    ) -> Result<Vec<f64>, EvaluatorError> {
        (**self).evaluate_moves(game, position, moves, perspective)
    }

    fn supports_batch(&self) -> bool {
        (**self).supports_batch()
    }
}

/// Neutral evaluator scoring every position 0.0. Useful for plain MCTS
/// where only terminal outcomes carry signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformEvaluator;

impl UniformEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl<G: Game> Evaluator<G> for UniformEvaluator {
    fn evaluate(
        &self,
        _position: &G::Position,
        _perspective: Agent,
    ) -> Result<f64, EvaluatorError> {
        Ok(0.0)
    }
}

/// Adapts a plain scoring function to the [`Evaluator`] trait.
pub struct HeuristicEvaluator<F>(pub F);

impl<G, F> Evaluator<G> for HeuristicEvaluator<F>
where
    G: Game,
    F: Fn(&G::Position, Agent) -> f64 + Send + Sync,
{
    fn evaluate(&self, position: &G::Position, perspective: Agent) -> Result<f64, EvaluatorError> {
        Ok((self.0)(position, perspective))
    }
}

/// Memoizes an inner evaluator through a transposition table.
///
/// Scores are stored canonicalized to agent 0's perspective, so a lookup
/// from either agent reuses the same entry with the sign flipped as needed.
/// Games with more than two agents bypass the cache.
pub struct CachingEvaluator<G: Game, E> {
    inner: E,
    game: Arc<G>,
    table: Arc<TranspositionTable<f64>>,
}

impl<G: Game, E: Evaluator<G>> CachingEvaluator<G, E> {
    pub fn new(inner: E, game: Arc<G>, table: Arc<TranspositionTable<f64>>) -> Self {
        Self { inner, game, table }
    }

    pub fn table(&self) -> &Arc<TranspositionTable<f64>> {
        &self.table
    }

    fn canonical(value: f64, perspective: Agent) -> f64 {
        if perspective.index() == 0 {
            value
        } else {
            -value
        }
    }
}

impl<G: Game, E: Evaluator<G>> Evaluator<G> for CachingEvaluator<G, E> {
    fn evaluate(&self, position: &G::Position, perspective: Agent) -> Result<f64, EvaluatorError> {
        if self.game.num_agents() != 2 {
            return self.inner.evaluate(position, perspective);
        }
        let hash = self.game.position_hash(position);
        if let Some(stored) = self.table.retrieve(hash) {
            return Ok(Self::canonical(stored, perspective));
        }
        let value = self.inner.evaluate(position, perspective)?;
        self.table.store(hash, Self::canonical(value, perspective));
        Ok(value)
    }

    fn evaluate_moves(
        &self,
        game: &G,
        position: &G::Position,
        moves: &[G::Move],
        perspective: Agent,
    ) -> Result<Vec<f64>, EvaluatorError> {
        if self.game.num_agents() != 2 {
            return self.inner.evaluate_moves(game, position, moves, perspective);
        }
        let mut values = vec![0.0; moves.len()];
        let mut miss_moves = Vec::new();
        let mut miss_slots = Vec::new();
        let mut miss_hashes = Vec::new();
        for (i, mv) in moves.iter().enumerate() {
            let next = game.apply(position, mv)?;
            let hash = game.position_hash(&next);
            match self.table.retrieve(hash) {
                Some(stored) => values[i] = Self::canonical(stored, perspective),
                None => {
                    miss_moves.push(mv.clone());
                    miss_slots.push(i);
                    miss_hashes.push(hash);
                }
            }
        }
        if !miss_moves.is_empty() {
            let fresh = self.inner.evaluate_moves(game, position, &miss_moves, perspective)?;
            for ((slot, hash), value) in miss_slots.iter().zip(miss_hashes).zip(fresh) {
                self.table.store(hash, Self::canonical(value, perspective));
                values[*slot] = value;
            }
        }
        Ok(values)
    }

    fn supports_batch(&self) -> bool {
        self.inner.supports_batch()
    }
}

/// Backend that can score many positions in a single inference call.
pub trait BatchBackend<G: Game>: Send + Sync {
    fn infer(
        &self,
        positions: &[G::Position],
        perspectives: &[Agent],
    ) -> Result<Vec<f64>, EvaluatorError>;
}

struct PendingRequest<G: Game> {
    ticket: u64,
    position: G::Position,
    perspective: Agent,
}

struct BatchQueue<G: Game> {
    pending: Vec<PendingRequest<G>>,
    results: std::collections::HashMap<u64, Result<f64, EvaluatorError>>,
    next_ticket: u64,
}

/// Gathers single-position evaluations from concurrent search workers into
/// batched backend calls.
///
/// A caller enqueues its request and blocks. The request is flushed either
/// by the caller that fills the batch to `max_batch` or by any caller whose
/// wait exceeds `max_wait`, so no request is delayed indefinitely when the
/// search winds down. The backend call runs outside the queue lock.
pub struct BatchingEvaluator<G: Game, B> {
    backend: B,
    max_batch: usize,
    max_wait: Duration,
    queue: Mutex<BatchQueue<G>>,
    ready: Condvar,
}

impl<G: Game, B: BatchBackend<G>> BatchingEvaluator<G, B> {
    pub fn new(backend: B, max_batch: usize, max_wait: Duration) -> Self {
        Self {
            backend,
            max_batch: max_batch.max(1),
            max_wait,
            queue: Mutex::new(BatchQueue {
                pending: Vec::new(),
                results: std::collections::HashMap::new(),
                next_ticket: 0,
            }),
            ready: Condvar::new(),
        }
    }

    fn run_batch(&self, batch: Vec<PendingRequest<G>>) {
        let positions: Vec<G::Position> = batch.iter().map(|r| r.position.clone()).collect();
        let perspectives: Vec<Agent> = batch.iter().map(|r| r.perspective).collect();
        let outcome = self.backend.infer(&positions, &perspectives);
        let mut queue = self.queue.lock().unwrap();
        match outcome {
            Ok(values) => {
                for (request, value) in batch.iter().zip(values) {
                    queue.results.insert(request.ticket, Ok(value));
                }
            }
            Err(err) => {
                for request in &batch {
                    queue.results.insert(request.ticket, Err(err.clone()));
                }
            }
        }
        drop(queue);
        self.ready.notify_all();
    }
}

impl<G: Game, B: BatchBackend<G>> Evaluator<G> for BatchingEvaluator<G, B> {
    fn evaluate(&self, position: &G::Position, perspective: Agent) -> Result<f64, EvaluatorError> {
        let ticket;
        {
            let mut queue = self.queue.lock().unwrap();
            ticket = queue.next_ticket;
            queue.next_ticket += 1;
            queue.pending.push(PendingRequest { ticket, position: position.clone(), perspective });
            if queue.pending.len() >= self.max_batch {
                let batch = std::mem::take(&mut queue.pending);
                drop(queue);
                self.run_batch(batch);
            }
        }
        loop {
            let mut queue = self.queue.lock().unwrap();
            if let Some(result) = queue.results.remove(&ticket) {
                return result;
            }
            let (guard, timeout) = self.ready.wait_timeout(queue, self.max_wait).unwrap();
            queue = guard;
            if let Some(result) = queue.results.remove(&ticket) {
                return result;
            }
            if timeout.timed_out() && !queue.pending.is_empty() {
                let batch = std::mem::take(&mut queue.pending);
                drop(queue);
                self.run_batch(batch);
            }
        }
    }

    fn supports_batch(&self) -> bool {
        true
    }
}
