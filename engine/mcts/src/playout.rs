//! Playout strategies.
//!
//! A playout completes one search iteration from a freshly expanded leaf,
//! producing the per-agent utility vector that is backpropagated along the
//! selection path. Playouts work on private position copies; errors from
//! the game or evaluator abandon the iteration without touching the tree.

use engine_core::Game;
use rand::{Rng, RngCore};

use crate::evaluator::Evaluator;
use crate::search::SearchError;

/// Policy completing an iteration from a leaf position.
pub trait PlayoutStrategy<G: Game>: Send + Sync {
    /// Plays out from `position`, returning one utility per agent.
    /// `start_depth` is the tree depth of the leaf, for diagnostics.
    fn playout(
        &self,
        game: &G,
        position: &G::Position,
        start_depth: usize,
        evaluator: &dyn Evaluator<G>,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<f64>, SearchError>;
}

/// Uniformly random playout to a terminal position.
///
/// If the ply limit is reached first the playout is scored as neutral,
/// zero for every agent.
pub struct RandomPlayout {
    turn_limit: usize,
}

impl RandomPlayout {
    pub fn new(turn_limit: usize) -> Self {
        Self { turn_limit }
    }
}

impl<G: Game> PlayoutStrategy<G> for RandomPlayout {
    fn playout(
        &self,
        game: &G,
        position: &G::Position,
        _start_depth: usize,
        _evaluator: &dyn Evaluator<G>,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<f64>, SearchError> {
        let mut position = position.clone();
        for _ in 0..self.turn_limit {
            if game.is_terminal(&position) {
                return Ok(game.utilities(&position));
            }
            let moves = game.legal_moves(&position);
            let mv = &moves[rng.gen_range(0..moves.len())];
            position = game.apply(&position, mv)?;
        }
        if game.is_terminal(&position) {
            return Ok(game.utilities(&position));
        }
        Ok(vec![0.0; game.num_agents()])
    }
}

/// Epsilon-greedy playout with a decisiveness cutoff.
///
/// Each ply the current position is scored for its mover; once the score's
/// magnitude reaches `decisive_threshold` the position is treated as
/// decided and the playout stops, crediting the score to the mover and its
/// negation to the opponent. Otherwise a move is chosen greedily by
/// one-ply lookahead, or uniformly at random with probability epsilon. The
/// ply limit scores the frontier position the same way.
pub struct EpsilonGreedyPlayout {
    epsilon: f64,
    turn_limit: usize,
    decisive_threshold: f64,
}

impl EpsilonGreedyPlayout {
    pub fn new(epsilon: f64, turn_limit: usize, decisive_threshold: f64) -> Self {
        Self { epsilon, turn_limit, decisive_threshold }
    }

    fn check_score<G: Game>(
        game: &G,
        position: &G::Position,
        depth: usize,
        value: f64,
    ) -> Result<f64, SearchError> {
        if !value.is_finite() || value.abs() > 1.0 {
            return Err(SearchError::InvariantViolation {
                hash: game.position_hash(position),
                depth,
                detail: format!("evaluator returned out-of-scale playout score {value}"),
            });
        }
        Ok(value)
    }

    /// Utilities crediting `value` to `mover` and its negation to the rest.
    fn spread<G: Game>(game: &G, position: &G::Position, value: f64) -> Vec<f64> {
        let mover = game.mover(position);
        (0..game.num_agents())
            .map(|a| if a == mover.index() { value } else { -value })
            .collect()
    }
}

impl<G: Game> PlayoutStrategy<G> for EpsilonGreedyPlayout {
    fn playout(
        &self,
        game: &G,
        position: &G::Position,
        start_depth: usize,
        evaluator: &dyn Evaluator<G>,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<f64>, SearchError> {
        let mut position = position.clone();
        for ply in 0..self.turn_limit {
            if game.is_terminal(&position) {
                return Ok(game.utilities(&position));
            }
            let mover = game.mover(&position);
            let depth = start_depth + ply;
            let value = Self::check_score(
                game,
                &position,
                depth,
                evaluator.evaluate(&position, mover)?,
            )?;
            if value.abs() >= self.decisive_threshold {
                return Ok(Self::spread(game, &position, value));
            }

            let moves = game.legal_moves(&position);
            let choice = if rng.gen::<f64>() < self.epsilon {
                rng.gen_range(0..moves.len())
            } else {
                let scores = evaluator.evaluate_moves(game, &position, &moves, mover)?;
                let mut best = 0;
                for (i, &s) in scores.iter().enumerate() {
                    Self::check_score(game, &position, depth, s)?;
                    if s > scores[best] {
                        best = i;
                    }
                }
                best
            };
            position = game.apply(&position, &moves[choice])?;
        }

        if game.is_terminal(&position) {
            return Ok(game.utilities(&position));
        }
        let mover = game.mover(&position);
        let value = Self::check_score(
            game,
            &position,
            start_depth + self.turn_limit,
            evaluator.evaluate(&position, mover)?,
        )?;
        Ok(Self::spread(game, &position, value))
    }
}
