//! Implicit minimax backups.
//!
//! Every node carries a shallow minimax value alongside its sampled
//! statistics: the best of its children's values from the node's own mover
//! perspective, where an unexpanded child contributes the heuristic
//! estimate frozen at construction time and an expanded child contributes
//! its live minimax value. Selection blends this value with the sampled
//! expected score, which gives tactically sharp lines weight long before
//! visit counts can.

use std::sync::Arc;

use engine_core::Game;

use crate::node::Node;

/// Minimax bookkeeping for one node.
///
/// `initial_estimates` never changes after construction; the champion
/// fields track the current best child slot and its value from the owning
/// node's mover perspective.
pub(crate) struct MinimaxState {
    initial_estimates: Box<[f64]>,
    best_index: usize,
    best_value: f64,
}

impl MinimaxState {
    /// Record for a terminal node: no children, exact value for the mover.
    pub(crate) fn terminal(utility: f64) -> Self {
        Self { initial_estimates: Box::new([]), best_index: 0, best_value: utility }
    }

    /// Record seeded from per-child heuristic estimates in slot order.
    pub(crate) fn from_estimates(estimates: Vec<f64>) -> Self {
        debug_assert!(!estimates.is_empty());
        let initial_estimates = estimates.into_boxed_slice();
        let mut best_index = 0;
        let mut best_value = f64::NEG_INFINITY;
        for (i, &v) in initial_estimates.iter().enumerate() {
            if v > best_value {
                best_index = i;
                best_value = v;
            }
        }
        Self { initial_estimates, best_index, best_value }
    }

    pub(crate) fn initial_estimates(&self) -> &[f64] {
        &self.initial_estimates
    }

    pub(crate) fn best_index(&self) -> usize {
        self.best_index
    }

    pub(crate) fn best_value(&self) -> f64 {
        self.best_value
    }

    fn set_champion(&mut self, index: usize, value: f64) {
        self.best_index = index;
        self.best_value = value;
    }
}

/// Pushes a freshly created node's minimax value toward the root.
///
/// At each ancestor the arriving child value is compared with the current
/// champion. A non-champion child that exceeds the champion is adopted and
/// the walk continues. The champion child forces a recomputation over all
/// slots, live values for expanded children and frozen estimates for the
/// rest, and the walk continues whether or not the value moved. Any other
/// arrival cannot change the ancestor and the walk stops.
///
/// Statistics locks nest strictly from parent to child: the child's value
/// is read before the parent's lock is taken, and a recomputation under the
/// parent's lock only takes child locks.
pub(crate) fn propagate_expansion<G: Game>(new_node: &Arc<Node<G>>) {
    let mut node = Arc::clone(new_node);
    loop {
        let Some(parent) = node.parent() else { break };
        let slot = node.slot();
        let Some(child_value) = node.minimax_value_for(parent.mover()) else { break };
        let advanced = parent.with_minimax(|m| {
            if slot == m.best_index() {
                recompute(&parent, m);
                true
            } else if child_value > m.best_value() {
                m.set_champion(slot, child_value);
                true
            } else {
                false
            }
        });
        if advanced != Some(true) {
            break;
        }
        node = parent;
    }
}

fn recompute<G: Game>(parent: &Node<G>, m: &mut MinimaxState) {
    let mut best_index = 0;
    let mut best_value = f64::NEG_INFINITY;
    for slot in 0..parent.num_moves() {
        let value = parent
            .child(slot)
            .and_then(|child| child.minimax_value_for(parent.mover()))
            .unwrap_or_else(|| m.initial_estimates()[slot]);
        if value > best_value {
            best_index = slot;
            best_value = value;
        }
    }
    m.set_champion(best_index, best_value);
}
