//! Tree-descent selection strategies.

use engine_core::Game;
use rand::{Rng, RngCore};

use crate::node::{Node, Proof};

/// Outcome of one selection step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descent {
    /// Descend into this child slot.
    Child(usize),
    /// Every child is a proven loss for the node's mover. A slot is still
    /// returned so the iteration can finish; at the root this means the
    /// game is lost and searching further is pointless.
    AllLost(usize),
}

impl Descent {
    pub fn slot(self) -> usize {
        match self {
            Descent::Child(slot) | Descent::AllLost(slot) => slot,
        }
    }
}

/// Policy picking which child to descend into at a non-terminal node.
pub trait SelectionStrategy<G: Game>: Send + Sync {
    fn select(&self, node: &Node<G>, rng: &mut dyn RngCore) -> Descent;
}

/// UCB1 selection over expected scores.
///
/// Unexpanded slots are tried first, in uniformly random order. Once every
/// slot is expanded the child maximizing `exploit + C * sqrt(ln(N) / n)` is
/// chosen, where the exploitation term is the virtual-visit-discounted
/// expected score, optionally blended with the child's implicit-minimax
/// value. Proven children dominate through their sentinel scores: a proven
/// win is always preferred and a proven loss practically never.
pub struct Ucb1 {
    exploration: f64,
    minimax_blend: f64,
}

impl Ucb1 {
    pub fn new(exploration: f64, minimax_blend: f64) -> Self {
        Self { exploration, minimax_blend }
    }
}

impl<G: Game> SelectionStrategy<G> for Ucb1 {
    fn select(&self, node: &Node<G>, rng: &mut dyn RngCore) -> Descent {
        let open = node.unexpanded_slots();
        if !open.is_empty() {
            return Descent::Child(open[rng.gen_range(0..open.len())]);
        }

        let mover = node.mover();
        let ln_parent = f64::from(node.visits().max(1)).ln();
        let mut best_slot = 0;
        let mut best_score = f64::NEG_INFINITY;
        for slot in 0..node.num_moves() {
            let Some(child) = node.child(slot) else { continue };
            let mut exploit = child.expected_score(mover);
            if self.minimax_blend > 0.0 {
                if let Some(v) = child.minimax_value_for(mover) {
                    exploit = (1.0 - self.minimax_blend) * exploit + self.minimax_blend * v;
                }
            }
            let visits = child.visits();
            let explore = if visits == 0 {
                f64::INFINITY
            } else {
                self.exploration * (ln_parent / f64::from(visits)).sqrt()
            };
            let score = exploit + explore;
            if score > best_score {
                best_score = score;
                best_slot = slot;
            }
        }
        Descent::Child(best_slot)
    }
}

/// Epsilon-greedy selection with a preference for proven wins.
///
/// With probability epsilon the step ignores statistics: it descends into a
/// uniformly random proven-win child if any exists, otherwise into a random
/// slot that is not a proven loss. When every child is a proven loss there
/// is nothing left to learn and the step reports [`Descent::AllLost`]. The
/// remaining probability mass delegates to the wrapped strategy.
pub struct ProofBiasedEpsilonGreedy<G: Game> {
    epsilon: f64,
    inner: Box<dyn SelectionStrategy<G>>,
}

impl<G: Game> ProofBiasedEpsilonGreedy<G> {
    pub fn new(epsilon: f64, inner: Box<dyn SelectionStrategy<G>>) -> Self {
        Self { epsilon, inner }
    }
}

impl<G: Game> SelectionStrategy<G> for ProofBiasedEpsilonGreedy<G> {
    fn select(&self, node: &Node<G>, rng: &mut dyn RngCore) -> Descent {
        if rng.gen::<f64>() >= self.epsilon {
            return self.inner.select(node, rng);
        }

        let mover = node.mover();
        let mut wins = Vec::new();
        let mut undecided = Vec::new();
        let mut losses = Vec::new();
        for slot in 0..node.num_moves() {
            match node.child(slot) {
                None => undecided.push(slot),
                Some(child) => match child.proof(mover) {
                    Proof::Win => wins.push(slot),
                    Proof::Loss => losses.push(slot),
                    Proof::Unproven => undecided.push(slot),
                },
            }
        }
        if !wins.is_empty() {
            Descent::Child(wins[rng.gen_range(0..wins.len())])
        } else if !undecided.is_empty() {
            Descent::Child(undecided[rng.gen_range(0..undecided.len())])
        } else {
            Descent::AllLost(losses[rng.gen_range(0..losses.len())])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::UniformEvaluator;
    use crate::node::{TreeContext, PROVEN_SCORE};
    use engine_core::Agent;
    use games_tictactoe::{Position, TicTacToe};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::sync::Arc;

    fn ctx() -> TreeContext<TicTacToe> {
        TreeContext {
            game: Arc::new(TicTacToe::new()),
            num_agents: 2,
            proof_aware: true,
            implicit_minimax: false,
        }
    }

    fn expanded_root(ctx: &TreeContext<TicTacToe>) -> Arc<Node<TicTacToe>> {
        let eval = UniformEvaluator::new();
        let root = Node::build_root(ctx, Position::new(), &eval).unwrap();
        for slot in 0..root.num_moves() {
            root.child_or_build(ctx, slot, &eval).unwrap();
        }
        root
    }

    /// Deposit `n` iterations of `utilities` into a node.
    fn visit(node: &Node<TicTacToe>, n: usize, utilities: [f64; 2]) {
        for _ in 0..n {
            node.add_virtual_visit();
            node.update(&utilities).unwrap();
        }
    }

    #[test]
    fn test_ucb1_tries_unexpanded_slots_first() {
        let ctx = ctx();
        let eval = UniformEvaluator::new();
        let root = Node::build_root(&ctx, Position::new(), &eval).unwrap();
        for slot in 0..root.num_moves() {
            if slot != 6 {
                root.child_or_build(&ctx, slot, &eval).unwrap();
            }
        }
        let strategy = Ucb1::new(std::f64::consts::SQRT_2, 0.0);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        assert_eq!(strategy.select(&root, &mut rng), Descent::Child(6));
    }

    #[test]
    fn test_ucb1_balances_exploitation_and_exploration() {
        let ctx = ctx();
        let root = expanded_root(&ctx);
        visit(&root, 40, [0.0, 0.0]);
        // Slot 0 looks strong but is well explored; slot 1 is barely tried.
        visit(&root.child(0).unwrap(), 30, [0.6, -0.6]);
        visit(&root.child(1).unwrap(), 1, [0.1, -0.1]);
        for slot in 2..root.num_moves() {
            visit(&root.child(slot).unwrap(), 30, [-0.5, 0.5]);
        }
        let mut rng = ChaCha20Rng::seed_from_u64(2);

        let greedy = Ucb1::new(0.0, 0.0);
        assert_eq!(greedy.select(&root, &mut rng), Descent::Child(0));

        let curious = Ucb1::new(4.0, 0.0);
        assert_eq!(curious.select(&root, &mut rng), Descent::Child(1));
    }

    #[test]
    fn test_ucb1_proven_win_dominates_any_mean() {
        let ctx = ctx();
        let root = expanded_root(&ctx);
        visit(&root, 200, [0.0, 0.0]);
        for slot in 0..root.num_moves() {
            visit(&root.child(slot).unwrap(), 25, [0.9, -0.9]);
        }
        // Slot 5 is proven won for the root mover.
        let child = root.child(5).unwrap();
        child.add_virtual_visit();
        child.update(&[PROVEN_SCORE, -PROVEN_SCORE]).unwrap();

        let strategy = Ucb1::new(std::f64::consts::SQRT_2, 0.0);
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        assert_eq!(strategy.select(&root, &mut rng), Descent::Child(5));
    }

    #[test]
    fn test_ucb1_blends_minimax_value() {
        let ctx = TreeContext {
            game: Arc::new(TicTacToe::new()),
            num_agents: 2,
            proof_aware: false,
            implicit_minimax: true,
        };
        let eval = crate::evaluator::HeuristicEvaluator(|p: &Position, a: Agent| {
            TicTacToe::heuristic(p, a)
        });
        let root = Node::build_root(&ctx, Position::new(), &eval).unwrap();
        for slot in 0..root.num_moves() {
            root.child_or_build(&ctx, slot, &eval).unwrap();
        }
        visit(&root, 18, [0.0, 0.0]);
        // Identical sampled scores everywhere; only the minimax values differ.
        for slot in 0..root.num_moves() {
            visit(&root.child(slot).unwrap(), 2, [0.0, 0.0]);
        }
        let center = root.moves().iter().position(|m| m.square() == 4).unwrap();

        let unblended = Ucb1::new(0.0, 0.0);
        let blended = Ucb1::new(0.0, 0.4);
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        // Without the blend every child ties and the first slot wins.
        assert_eq!(unblended.select(&root, &mut rng), Descent::Child(0));
        assert_eq!(blended.select(&root, &mut rng), Descent::Child(center));
    }

    #[test]
    fn test_epsilon_branch_prefers_proven_wins() {
        let ctx = ctx();
        let root = expanded_root(&ctx);
        let child = root.child(3).unwrap();
        child.add_virtual_visit();
        child.update(&[PROVEN_SCORE, -PROVEN_SCORE]).unwrap();

        let strategy =
            ProofBiasedEpsilonGreedy::new(1.0, Box::new(Ucb1::new(std::f64::consts::SQRT_2, 0.0)));
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        for _ in 0..20 {
            assert_eq!(strategy.select(&root, &mut rng), Descent::Child(3));
        }
    }

    #[test]
    fn test_epsilon_branch_avoids_proven_losses() {
        let ctx = ctx();
        let root = expanded_root(&ctx);
        // All slots but 7 are proven losses for the root mover.
        for slot in 0..root.num_moves() {
            if slot != 7 {
                let child = root.child(slot).unwrap();
                child.add_virtual_visit();
                child.update(&[-PROVEN_SCORE, PROVEN_SCORE]).unwrap();
            }
        }
        let strategy =
            ProofBiasedEpsilonGreedy::new(1.0, Box::new(Ucb1::new(std::f64::consts::SQRT_2, 0.0)));
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        for _ in 0..20 {
            assert_eq!(strategy.select(&root, &mut rng), Descent::Child(7));
        }
    }

    #[test]
    fn test_epsilon_branch_reports_position_lost() {
        let ctx = ctx();
        let root = expanded_root(&ctx);
        for slot in 0..root.num_moves() {
            let child = root.child(slot).unwrap();
            child.add_virtual_visit();
            child.update(&[-PROVEN_SCORE, PROVEN_SCORE]).unwrap();
        }
        let strategy =
            ProofBiasedEpsilonGreedy::new(1.0, Box::new(Ucb1::new(std::f64::consts::SQRT_2, 0.0)));
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        assert!(matches!(strategy.select(&root, &mut rng), Descent::AllLost(_)));
    }

    #[test]
    fn test_zero_epsilon_always_delegates() {
        let ctx = ctx();
        let root = expanded_root(&ctx);
        visit(&root, 9, [0.0, 0.0]);
        for slot in 0..root.num_moves() {
            visit(&root.child(slot).unwrap(), 1, [0.0, 0.0]);
        }
        visit(&root.child(2).unwrap(), 3, [1.0, -1.0]);

        let strategy = ProofBiasedEpsilonGreedy::new(0.0, Box::new(Ucb1::new(0.0, 0.0)));
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        // Greedy inner strategy must see slot 2's higher mean every time.
        for _ in 0..10 {
            assert_eq!(strategy.select(&root, &mut rng), Descent::Child(2));
        }
    }
}
