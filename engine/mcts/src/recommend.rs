//! Final move selection.
//!
//! After the budget is spent the root's children are ranked one last time.
//! These strategies see the finished tree, so they read plain statistics;
//! virtual visits are back to zero by then.

use engine_core::Game;
use rand::{Rng, RngCore};

use crate::node::Node;

/// Policy choosing the root child slot to actually play.
pub trait FinalMoveStrategy<G: Game>: Send + Sync {
    /// Returns the chosen slot, or `None` when the root has no moves.
    fn choose(&self, root: &Node<G>, rng: &mut dyn RngCore) -> Option<usize>;
}

/// Most-visited child, with proven wins short-circuiting everything.
///
/// Ties on visits fall back to the higher expected score, then to the
/// higher frozen construction-time estimate, then to a uniform draw.
pub struct RobustChild;

impl<G: Game> FinalMoveStrategy<G> for RobustChild {
    fn choose(&self, root: &Node<G>, rng: &mut dyn RngCore) -> Option<usize> {
        if root.num_moves() == 0 {
            return None;
        }
        let mover = root.mover();
        for slot in 0..root.num_moves() {
            if root.child(slot).is_some_and(|c| c.proven_win(mover)) {
                return Some(slot);
            }
        }

        let key = |slot: usize| -> (u64, f64, f64) {
            let prior = root.initial_estimate(slot).unwrap_or(0.0);
            match root.child(slot) {
                Some(child) => (u64::from(child.visits()), child.expected_score(mover), prior),
                None => (0, f64::NEG_INFINITY, prior),
            }
        };
        let better = |a: &(u64, f64, f64), b: &(u64, f64, f64)| {
            a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)).then(a.2.total_cmp(&b.2))
        };

        let mut best = vec![0];
        let mut best_key = key(0);
        for slot in 1..root.num_moves() {
            let k = key(slot);
            match better(&k, &best_key) {
                std::cmp::Ordering::Greater => {
                    best_key = k;
                    best = vec![slot];
                }
                std::cmp::Ordering::Equal => best.push(slot),
                std::cmp::Ordering::Less => {}
            }
        }
        Some(best[rng.gen_range(0..best.len())])
    }
}

/// Highest `expected_score + 1 / sqrt(visits)`.
///
/// The bonus rewards both quality and play-count. Children never visited
/// score a configurable placeholder, normally pessimistic enough that an
/// unexplored move is played only when nothing else was explored either.
pub struct SecureChild {
    unvisited_value: f64,
}

impl SecureChild {
    pub fn new(unvisited_value: f64) -> Self {
        Self { unvisited_value }
    }
}

impl<G: Game> FinalMoveStrategy<G> for SecureChild {
    fn choose(&self, root: &Node<G>, rng: &mut dyn RngCore) -> Option<usize> {
        if root.num_moves() == 0 {
            return None;
        }
        let mover = root.mover();
        let score = |slot: usize| -> f64 {
            match root.child(slot) {
                Some(child) if child.visits() > 0 => {
                    child.expected_score(mover) + 1.0 / f64::from(child.visits()).sqrt()
                }
                _ => self.unvisited_value,
            }
        };

        let mut best = vec![0];
        let mut best_score = score(0);
        for slot in 1..root.num_moves() {
            let s = score(slot);
            match s.total_cmp(&best_score) {
                std::cmp::Ordering::Greater => {
                    best_score = s;
                    best = vec![slot];
                }
                std::cmp::Ordering::Equal => best.push(slot),
                std::cmp::Ordering::Less => {}
            }
        }
        Some(best[rng.gen_range(0..best.len())])
    }
}
