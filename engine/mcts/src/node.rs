//! Search tree node.
//!
//! Nodes are shared between worker threads through `Arc`. Child slots are
//! `OnceCell`s indexed by legal-move order, so the first worker to expand a
//! slot publishes the child and every later worker reuses it. Mutable
//! statistics live behind one short-lived mutex per node; the visit and
//! virtual-visit counters are lock-free atomics because selection reads them
//! far more often than backpropagation writes them.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};

use engine_core::{Agent, Game};
use once_cell::sync::OnceCell;

use crate::evaluator::Evaluator;
use crate::minimax::MinimaxState;
use crate::search::SearchError;

/// Sentinel magnitude for proven results. Overwhelms any heuristic score,
/// which evaluators keep in [-1.0, 1.0].
pub const PROVEN_SCORE: f64 = 1.0e6;

/// Proof status of a node's value for one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proof {
    Unproven,
    /// The agent wins with optimal play from this position.
    Win,
    /// The agent loses with optimal play from this position.
    Loss,
}

/// Immutable per-search settings shared by every node.
pub(crate) struct TreeContext<G: Game> {
    pub game: Arc<G>,
    pub num_agents: usize,
    pub proof_aware: bool,
    pub implicit_minimax: bool,
}

/// Statistics guarded by the node's mutex.
struct NodeState {
    /// Accumulated utility per agent.
    totals: Box<[f64]>,
    /// Accumulated squared utility per agent, for variance-based policies.
    sum_squares: Box<[f64]>,
    proof: Box<[Proof]>,
    minimax: Option<MinimaxState>,
}

/// A position in the shared search tree.
pub struct Node<G: Game> {
    parent: Option<Weak<Node<G>>>,
    /// Index of this node's move in the parent's legal-move list.
    slot: usize,
    mv: Option<G::Move>,
    position: G::Position,
    hash: u64,
    depth: usize,
    mover: Agent,
    terminal: bool,
    /// Legal moves in the order the game reported them; slot `i` of
    /// `children` holds the node reached by `moves[i]`.
    moves: Box<[G::Move]>,
    children: Box<[OnceCell<Arc<Node<G>>>]>,
    visits: AtomicU32,
    virtual_visits: AtomicU32,
    state: Mutex<NodeState>,
}

impl<G: Game> Node<G> {
    pub(crate) fn build_root(
        ctx: &TreeContext<G>,
        position: G::Position,
        evaluator: &dyn Evaluator<G>,
    ) -> Result<Arc<Self>, SearchError> {
        Self::build(ctx, None, 0, None, position, evaluator)
    }

    /// Creates a node for `position`, published as an `Arc` so child slots
    /// can hold a back reference.
    ///
    /// In solver mode a terminal position is assigned its proof immediately,
    /// and a non-terminal position with a move that wins on the spot is
    /// proven won for the mover before the evaluator is ever consulted; the
    /// winning child is created eagerly in its slot. With implicit minimax
    /// enabled, every remaining node freezes one heuristic estimate per
    /// child at construction time.
    pub(crate) fn build(
        ctx: &TreeContext<G>,
        parent: Option<&Arc<Node<G>>>,
        slot: usize,
        mv: Option<G::Move>,
        position: G::Position,
        evaluator: &dyn Evaluator<G>,
    ) -> Result<Arc<Self>, SearchError> {
        let game = ctx.game.as_ref();
        let mover = game.mover(&position);
        let terminal = game.is_terminal(&position);
        let hash = game.position_hash(&position);
        let depth = parent.map_or(0, |p| p.depth + 1);
        let moves = if terminal {
            Vec::new()
        } else {
            game.legal_moves(&position)
        };

        let mut totals = vec![0.0; ctx.num_agents].into_boxed_slice();
        let mut sum_squares = vec![0.0; ctx.num_agents].into_boxed_slice();
        let mut proof = vec![Proof::Unproven; ctx.num_agents].into_boxed_slice();
        let mut minimax = None;

        if terminal {
            let utilities = game.utilities(&position);
            if ctx.proof_aware {
                for (a, &u) in utilities.iter().enumerate() {
                    if u > 0.0 {
                        proof[a] = Proof::Win;
                        totals[a] = PROVEN_SCORE;
                        sum_squares[a] = PROVEN_SCORE * PROVEN_SCORE;
                    } else if u < 0.0 {
                        proof[a] = Proof::Loss;
                        totals[a] = -PROVEN_SCORE;
                        sum_squares[a] = PROVEN_SCORE * PROVEN_SCORE;
                    }
                }
            }
            if ctx.implicit_minimax {
                minimax = Some(MinimaxState::terminal(utilities[mover.index()]));
            }
        }

        let children = (0..moves.len())
            .map(|_| OnceCell::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let node = Arc::new(Node {
            parent: parent.map(Arc::downgrade),
            slot,
            mv,
            position,
            hash,
            depth,
            mover,
            terminal,
            moves: moves.into_boxed_slice(),
            children,
            visits: AtomicU32::new(0),
            virtual_visits: AtomicU32::new(0),
            state: Mutex::new(NodeState { totals, sum_squares, proof, minimax }),
        });

        if node.terminal {
            return Ok(node);
        }

        if ctx.proof_aware {
            if let Some((win_slot, winning_pos)) = node.find_winning_move(ctx)? {
                let child = Self::build(
                    ctx,
                    Some(&node),
                    win_slot,
                    Some(node.moves[win_slot].clone()),
                    winning_pos,
                    evaluator,
                )?;
                let _ = node.children[win_slot].set(child);
                node.mark_proven_win();
                return Ok(node);
            }
        }

        if ctx.implicit_minimax {
            let estimates =
                evaluator.evaluate_moves(game, &node.position, &node.moves, node.mover)?;
            node.install_estimates(estimates)?;
        }

        Ok(node)
    }

    /// Scans the legal moves for one that ends the game in the mover's
    /// favor. Returns the slot and resulting position of the first hit.
    fn find_winning_move(
        &self,
        ctx: &TreeContext<G>,
    ) -> Result<Option<(usize, G::Position)>, SearchError> {
        let game = ctx.game.as_ref();
        for (i, mv) in self.moves.iter().enumerate() {
            let next = game.apply(&self.position, mv)?;
            if game.is_terminal(&next) && game.utilities(&next)[self.mover.index()] > 0.0 {
                return Ok(Some((i, next)));
            }
        }
        Ok(None)
    }

    fn mark_proven_win(&self) {
        let mut st = self.state.lock().unwrap();
        for a in 0..st.totals.len() {
            let won = a == self.mover.index();
            st.proof[a] = if won { Proof::Win } else { Proof::Loss };
            st.totals[a] = if won { PROVEN_SCORE } else { -PROVEN_SCORE };
            st.sum_squares[a] = PROVEN_SCORE * PROVEN_SCORE;
        }
    }

    /// Validates and freezes per-child heuristic estimates, picking the
    /// initial minimax champion.
    fn install_estimates(&self, estimates: Vec<f64>) -> Result<(), SearchError> {
        for (i, &v) in estimates.iter().enumerate() {
            if !v.is_finite() || v.abs() > 1.0 {
                return Err(self.invariant(format!(
                    "evaluator returned out-of-scale estimate {v} for child {i}"
                )));
            }
        }
        let state = MinimaxState::from_estimates(estimates);
        self.state.lock().unwrap().minimax = Some(state);
        Ok(())
    }

    fn invariant(&self, detail: String) -> SearchError {
        SearchError::InvariantViolation { hash: self.hash, depth: self.depth, detail }
    }

    /// Returns the child in `slot`, creating it if this call wins the race
    /// to claim the slot. The flag is true when this call created the node.
    pub(crate) fn child_or_build(
        self: &Arc<Self>,
        ctx: &TreeContext<G>,
        slot: usize,
        evaluator: &dyn Evaluator<G>,
    ) -> Result<(Arc<Node<G>>, bool), SearchError> {
        let mut created = false;
        let child = self.children[slot]
            .get_or_try_init(|| {
                created = true;
                let mv = self.moves[slot].clone();
                let position = ctx.game.apply(&self.position, &mv)?;
                Node::build(ctx, Some(self), slot, Some(mv), position, evaluator)
            })?
            .clone();
        Ok((child, created))
    }

    /// Expected score for `agent`, discounted for in-flight iterations.
    ///
    /// Virtual visits pull the estimate toward zero as if each in-flight
    /// iteration had already returned a zero utility, steering concurrent
    /// workers apart. Proven nodes report the signed sentinel regardless of
    /// the counters, so a proof never loses to a heuristic estimate.
    pub fn expected_score(&self, agent: Agent) -> f64 {
        let st = self.state.lock().unwrap();
        match st.proof[agent.index()] {
            Proof::Win => PROVEN_SCORE,
            Proof::Loss => -PROVEN_SCORE,
            Proof::Unproven => {
                let visits = f64::from(self.visits.load(Ordering::Relaxed));
                if visits == 0.0 {
                    return 0.0;
                }
                let virtual_visits = f64::from(self.virtual_visits.load(Ordering::Relaxed));
                let total = st.totals[agent.index()];
                (total - virtual_visits * total / visits) / (visits + virtual_visits)
            }
        }
    }

    /// Folds one iteration's utilities into this node and releases the
    /// iteration's virtual visit.
    ///
    /// A proven node only counts the visit; its scores are already exact. A
    /// utility vector carrying a sentinel marks a fresh proof and replaces
    /// the accumulated scores outright. Utilities beyond the sentinel
    /// magnitude mean the tree is corrupt and abort the search.
    pub(crate) fn update(&self, utilities: &[f64]) -> Result<(), SearchError> {
        for &u in utilities {
            if !u.is_finite() || u.abs() > PROVEN_SCORE {
                return Err(self.invariant(format!("backpropagated utility {u} out of range")));
            }
        }
        {
            let mut st = self.state.lock().unwrap();
            debug_assert_eq!(utilities.len(), st.totals.len());
            let already_proven = st.proof.iter().any(|p| *p != Proof::Unproven);
            if !already_proven {
                if utilities.iter().any(|u| u.abs() == PROVEN_SCORE) {
                    for (a, &u) in utilities.iter().enumerate() {
                        st.totals[a] = u;
                        st.sum_squares[a] = u * u;
                        st.proof[a] = if u == PROVEN_SCORE {
                            Proof::Win
                        } else if u == -PROVEN_SCORE {
                            Proof::Loss
                        } else {
                            Proof::Unproven
                        };
                    }
                } else {
                    for (a, &u) in utilities.iter().enumerate() {
                        st.totals[a] += u;
                        st.sum_squares[a] += u * u;
                    }
                }
            }
        }
        self.visits.fetch_add(1, Ordering::Relaxed);
        let prev = self.virtual_visits.fetch_sub(1, Ordering::Relaxed);
        if prev == 0 {
            // undo the wrap before reporting
            self.virtual_visits.fetch_add(1, Ordering::Relaxed);
            return Err(self.invariant("virtual visit released without a matching claim".into()));
        }
        Ok(())
    }

    pub(crate) fn add_virtual_visit(&self) {
        self.virtual_visits.fetch_add(1, Ordering::Relaxed);
    }

    /// Releases a virtual visit for an abandoned iteration.
    pub(crate) fn cancel_virtual_visit(&self) {
        let prev = self.virtual_visits.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(prev > 0, "virtual visit released without a matching claim");
    }

    /// Utilities to backpropagate from a terminal or proven node: signed
    /// sentinels once proven, the game's exact utilities otherwise.
    pub(crate) fn resolved_utilities(&self, ctx: &TreeContext<G>) -> Vec<f64> {
        if ctx.proof_aware {
            let st = self.state.lock().unwrap();
            if st.proof.iter().any(|p| *p != Proof::Unproven) {
                return st
                    .proof
                    .iter()
                    .map(|p| match p {
                        Proof::Win => PROVEN_SCORE,
                        Proof::Loss => -PROVEN_SCORE,
                        Proof::Unproven => 0.0,
                    })
                    .collect();
            }
        }
        ctx.game.utilities(&self.position)
    }

    /// True when every child slot is filled and every child is a proven
    /// loss for `agent`. Terminal nodes have no slots and qualify trivially.
    pub(crate) fn all_children_proven_loss(&self, agent: Agent) -> bool {
        self.children.iter().all(|cell| match cell.get() {
            Some(child) => child.proven_loss(agent),
            None => false,
        })
    }

    pub fn proof(&self, agent: Agent) -> Proof {
        self.state.lock().unwrap().proof[agent.index()]
    }

    pub fn proven_win(&self, agent: Agent) -> bool {
        self.proof(agent) == Proof::Win
    }

    pub fn proven_loss(&self, agent: Agent) -> bool {
        self.proof(agent) == Proof::Loss
    }

    /// Whether any agent's value is proven.
    pub fn is_resolved(&self) -> bool {
        self.state.lock().unwrap().proof.iter().any(|p| *p != Proof::Unproven)
    }

    /// Frozen construction-time estimate for the child in `slot`, if
    /// implicit minimax is enabled.
    pub fn initial_estimate(&self, slot: usize) -> Option<f64> {
        let st = self.state.lock().unwrap();
        st.minimax.as_ref().and_then(|m| m.initial_estimates().get(slot).copied())
    }

    /// This node's minimax value seen from `perspective`. Internally the
    /// value is kept from the mover's side; the other side sees it negated.
    pub(crate) fn minimax_value_for(&self, perspective: Agent) -> Option<f64> {
        let st = self.state.lock().unwrap();
        st.minimax.as_ref().map(|m| {
            if self.mover == perspective {
                m.best_value()
            } else {
                -m.best_value()
            }
        })
    }

    /// Runs `f` with the node's minimax record while the statistics lock is
    /// held. Child statistics may be read inside `f`; parent locks must not
    /// be taken there.
    pub(crate) fn with_minimax<R>(&self, f: impl FnOnce(&mut MinimaxState) -> R) -> Option<R> {
        let mut st = self.state.lock().unwrap();
        st.minimax.as_mut().map(f)
    }

    pub(crate) fn parent(&self) -> Option<Arc<Node<G>>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn slot(&self) -> usize {
        self.slot
    }

    /// The move that led here from the parent. `None` at the root.
    pub fn last_move(&self) -> Option<&G::Move> {
        self.mv.as_ref()
    }

    pub fn position(&self) -> &G::Position {
        &self.position
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn mover(&self) -> Agent {
        self.mover
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn moves(&self) -> &[G::Move] {
        &self.moves
    }

    pub fn num_moves(&self) -> usize {
        self.moves.len()
    }

    pub fn child(&self, slot: usize) -> Option<Arc<Node<G>>> {
        self.children[slot].get().cloned()
    }

    pub(crate) fn unexpanded_slots(&self) -> Vec<usize> {
        self.children
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.get().is_none())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn is_fully_expanded(&self) -> bool {
        self.children.iter().all(|cell| cell.get().is_some())
    }

    pub fn visits(&self) -> u32 {
        self.visits.load(Ordering::Relaxed)
    }

    pub fn virtual_visits(&self) -> u32 {
        self.virtual_visits.load(Ordering::Relaxed)
    }
}

impl<G: Game> fmt::Debug for Node<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("hash", &format_args!("{:#018x}", self.hash))
            .field("depth", &self.depth)
            .field("mover", &self.mover)
            .field("terminal", &self.terminal)
            .field("moves", &self.moves.len())
            .field("visits", &self.visits())
            .field("virtual_visits", &self.virtual_visits())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{EvaluatorError, UniformEvaluator};
    use games_tictactoe::{Move, Position, TicTacToe};
    use std::sync::atomic::AtomicUsize;

    fn ctx(proof_aware: bool, implicit_minimax: bool) -> TreeContext<TicTacToe> {
        TreeContext {
            game: Arc::new(TicTacToe::new()),
            num_agents: 2,
            proof_aware,
            implicit_minimax,
        }
    }

    fn plain_root(ctx: &TreeContext<TicTacToe>) -> Arc<Node<TicTacToe>> {
        Node::build_root(ctx, Position::new(), &UniformEvaluator::new()).unwrap()
    }

    struct CountingEvaluator {
        calls: AtomicUsize,
    }

    impl Evaluator<TicTacToe> for CountingEvaluator {
        fn evaluate(&self, position: &Position, perspective: Agent) -> Result<f64, EvaluatorError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(TicTacToe::heuristic(position, perspective))
        }
    }

    #[test]
    fn test_unvisited_node_scores_zero() {
        let ctx = ctx(true, false);
        let root = plain_root(&ctx);
        assert_eq!(root.expected_score(Agent(0)), 0.0);
        assert_eq!(root.expected_score(Agent(1)), 0.0);
        assert_eq!(root.visits(), 0);
    }

    #[test]
    fn test_update_accumulates_per_agent() {
        let ctx = ctx(true, false);
        let root = plain_root(&ctx);
        for _ in 0..4 {
            root.add_virtual_visit();
            root.update(&[0.5, -0.5]).unwrap();
        }
        assert_eq!(root.visits(), 4);
        assert!((root.expected_score(Agent(0)) - 0.5).abs() < 1e-12);
        assert!((root.expected_score(Agent(1)) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_virtual_visits_discount_toward_zero() {
        let ctx = ctx(true, false);
        let root = plain_root(&ctx);
        for _ in 0..4 {
            root.add_virtual_visit();
            root.update(&[1.0, -1.0]).unwrap();
        }
        let plain = root.expected_score(Agent(0));
        assert!((plain - 1.0).abs() < 1e-12);

        root.add_virtual_visit();
        let discounted_once = root.expected_score(Agent(0));
        root.add_virtual_visit();
        let discounted_twice = root.expected_score(Agent(0));
        assert!(discounted_once < plain);
        assert!(discounted_twice < discounted_once, "each in-flight visit discounts further");
        // total=4, visits=4, virtual=2: (4 - 2*1) / 6
        assert!((discounted_twice - 2.0 / 6.0).abs() < 1e-12);
        root.cancel_virtual_visit();
        root.cancel_virtual_visit();
        assert_eq!(root.expected_score(Agent(0)), plain);
    }

    #[test]
    fn test_update_on_proven_node_counts_visit_only() {
        let ctx = ctx(true, false);
        // X completes the top row next move from either open square.
        let pos = Position::from_cells([1, 1, 0, 2, 2, 0, 0, 0, 0], 0);
        let root = Node::build_root(&ctx, pos, &UniformEvaluator::new()).unwrap();
        assert!(root.proven_win(Agent(0)));
        let before = root.expected_score(Agent(0));

        root.add_virtual_visit();
        root.update(&[0.3, -0.3]).unwrap();
        assert_eq!(root.visits(), 1);
        assert_eq!(root.expected_score(Agent(0)), before, "proven score is already exact");
    }

    #[test]
    fn test_fresh_proof_overwrites_running_scores() {
        let ctx = ctx(true, false);
        let root = plain_root(&ctx);
        for _ in 0..10 {
            root.add_virtual_visit();
            root.update(&[0.2, -0.2]).unwrap();
        }
        root.add_virtual_visit();
        root.update(&[PROVEN_SCORE, -PROVEN_SCORE]).unwrap();
        assert!(root.proven_win(Agent(0)));
        assert!(root.proven_loss(Agent(1)));
        assert_eq!(root.expected_score(Agent(0)), PROVEN_SCORE);
        assert_eq!(root.expected_score(Agent(1)), -PROVEN_SCORE);
    }

    #[test]
    fn test_oversized_utility_is_fatal() {
        let ctx = ctx(true, false);
        let root = plain_root(&ctx);
        root.add_virtual_visit();
        let err = root.update(&[PROVEN_SCORE * 2.0, 0.0]).unwrap_err();
        match err {
            SearchError::InvariantViolation { hash, depth, .. } => {
                assert_eq!(hash, root.hash());
                assert_eq!(depth, 0);
            }
            other => panic!("expected invariant violation, got {other:?}"),
        }
    }

    #[test]
    fn test_unmatched_virtual_release_is_fatal() {
        let ctx = ctx(true, false);
        let root = plain_root(&ctx);
        let err = root.update(&[0.0, 0.0]).unwrap_err();
        assert!(matches!(err, SearchError::InvariantViolation { .. }));
    }

    #[test]
    fn test_terminal_win_is_proven_at_construction() {
        let ctx = ctx(true, false);
        let pos = Position::from_cells([1, 1, 1, 2, 2, 0, 0, 0, 0], 1);
        assert!(pos.is_done());
        let node = Node::build_root(&ctx, pos, &UniformEvaluator::new()).unwrap();
        assert!(node.is_terminal());
        assert!(node.proven_win(Agent(0)));
        assert!(node.proven_loss(Agent(1)));
        assert_eq!(node.num_moves(), 0);
    }

    #[test]
    fn test_terminal_draw_carries_no_proof() {
        let ctx = ctx(true, false);
        let pos = Position::from_cells([1, 2, 1, 1, 2, 2, 2, 1, 1], 1);
        assert!(pos.is_done());
        let node = Node::build_root(&ctx, pos, &UniformEvaluator::new()).unwrap();
        assert!(node.is_terminal());
        assert!(!node.is_resolved());
        assert_eq!(node.resolved_utilities(&ctx), vec![0.0, 0.0]);
    }

    #[test]
    fn test_solver_disabled_skips_proofs() {
        let ctx = ctx(false, false);
        let pos = Position::from_cells([1, 1, 1, 2, 2, 0, 0, 0, 0], 1);
        let node = Node::build_root(&ctx, pos, &UniformEvaluator::new()).unwrap();
        assert!(!node.is_resolved());
        assert_eq!(node.resolved_utilities(&ctx), vec![1.0, -1.0]);
    }

    #[test]
    fn test_win_in_one_proves_without_evaluating() {
        // Minimax is on, so a normal expansion would evaluate every child.
        let ctx = ctx(true, true);
        let evaluator = CountingEvaluator { calls: AtomicUsize::new(0) };
        // X threatens the top row at square 2.
        let pos = Position::from_cells([1, 1, 0, 2, 2, 0, 0, 0, 0], 0);
        let node = Node::build_root(&ctx, pos, &evaluator).unwrap();

        assert!(node.proven_win(Agent(0)));
        assert_eq!(evaluator.calls.load(Ordering::Relaxed), 0, "shortcut must skip evaluation");

        // The winning child sits in its slot, itself terminal and proven.
        let win_slot = node.moves().iter().position(|m| *m == Move(2)).unwrap();
        let child = node.child(win_slot).expect("winning child created eagerly");
        assert!(child.is_terminal());
        assert!(child.proven_win(Agent(0)));
        // No sibling was touched.
        for slot in 0..node.num_moves() {
            if slot != win_slot {
                assert!(node.child(slot).is_none());
            }
        }
    }

    #[test]
    fn test_child_or_build_claims_slot_once() {
        let ctx = ctx(true, false);
        let root = plain_root(&ctx);
        let eval = UniformEvaluator::new();
        let (first, created) = root.child_or_build(&ctx, 4, &eval).unwrap();
        assert!(created);
        let (second, created_again) = root.child_or_build(&ctx, 4, &eval).unwrap();
        assert!(!created_again);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.depth(), 1);
        assert_eq!(first.last_move(), Some(&Move(4)));
        assert_eq!(first.mover(), Agent(1));
    }

    #[test]
    fn test_all_children_proven_loss_requires_full_expansion() {
        let ctx = ctx(true, false);
        // O to move against a double threat; every O reply loses, but the
        // check must not fire while slots are still empty.
        let pos = Position::from_cells([1, 1, 0, 1, 2, 2, 0, 0, 0], 1);
        let root = Node::build_root(&ctx, pos, &UniformEvaluator::new()).unwrap();
        assert!(!root.is_resolved());
        assert!(!root.all_children_proven_loss(Agent(1)));
    }

    #[test]
    fn test_minimax_estimates_frozen_at_construction() {
        let ctx = ctx(false, true);
        let evaluator = CountingEvaluator { calls: AtomicUsize::new(0) };
        let root = Node::build_root(&ctx, Position::new(), &evaluator).unwrap();
        assert_eq!(evaluator.calls.load(Ordering::Relaxed), 9);
        for slot in 0..root.num_moves() {
            assert!(root.initial_estimate(slot).is_some());
        }
        // Opening estimates come from the mover's perspective; the center is best.
        let center = root.moves().iter().position(|m| *m == Move(4)).unwrap();
        let best = (0..root.num_moves())
            .max_by(|&a, &b| {
                root.initial_estimate(a).unwrap().total_cmp(&root.initial_estimate(b).unwrap())
            })
            .unwrap();
        assert_eq!(best, center);
    }
}
