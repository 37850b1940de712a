//! Solver-aware Monte Carlo Tree Search over a shared concurrent tree.
//!
//! This crate provides a game-agnostic MCTS implementation that works with
//! any game implementing the `engine-core` Game trait.
//!
//! # Overview
//!
//! Worker threads grow one shared tree together. Each iteration runs four
//! phases:
//!
//! 1. **Selection**: Descend the tree by UCB1 (optionally blended with a
//!    heuristic minimax value), claiming a virtual visit per node so
//!    concurrent workers spread out
//! 2. **Expansion**: Claim one unexpanded child slot; the claim race has
//!    exactly one winner and losers reuse its node
//! 3. **Playout**: Score the new leaf with a playout policy and the
//!    configured evaluator, or read the exact result off a terminal node
//! 4. **Backpropagation**: Fold the per-agent utility vector into every
//!    node on the path, carrying proven wins and losses upward as far as
//!    their proofs hold
//!
//! A node whose outcome is proven stops being searched, and a proven root
//! stops the whole search regardless of remaining budget.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use mcts::{Evaluator, EvaluatorFactory, SearchBudget, SearchConfig, Searcher,
//!            UniformEvaluator};
//!
//! let game = Arc::new(games_tictactoe::TicTacToe::new());
//! let factory: EvaluatorFactory<_> =
//!     Arc::new(|_| -> Box<dyn Evaluator<_>> { Box::new(UniformEvaluator::new()) });
//!
//! let searcher = Searcher::new(game, SearchConfig::default().with_threads(4), factory).unwrap();
//! let outcome = searcher
//!     .select_move(
//!         &games_tictactoe::Position::new(),
//!         SearchBudget::by_time(Duration::from_millis(100)),
//!     )
//!     .unwrap();
//!
//! println!("play {:?} (value {:+.3})", outcome.mv, outcome.value);
//! ```
//!
//! # Configuration
//!
//! The [`SearchConfig`] struct controls search behavior:
//!
//! - `num_threads`: Worker threads sharing the tree (default: 1)
//! - `exploration_constant`: UCB1 exploration weight (default: √2)
//! - `proof_aware`: Solve forced lines exactly during backpropagation
//!   (default: on)
//! - `implicit_minimax`: Maintain heuristic minimax values alongside visit
//!   statistics and blend them into selection (default: off)
//! - `use_transposition_table`: Cache evaluations across searches in a
//!   stamped table (default: off)
//!
//! # Evaluators
//!
//! Leaf estimates come from an [`Evaluator`]:
//!
//! - [`UniformEvaluator`]: Scores every position 0.0 (for testing)
//! - [`HeuristicEvaluator`]: Wraps a plain scoring function
//! - [`CachingEvaluator`]: Memoizes another evaluator through the stamped
//!   transposition table
//! - [`BatchingEvaluator`]: Gathers concurrent requests into batches for
//!   backends that prefer them
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Searcher                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │ shared tree │  │    Game     │  │      Evaluator      │  │
//! │  │ (Arc nodes) │  │ (positions) │  │  (leaf estimates)   │  │
//! │  └──────┬──────┘  └──────┬──────┘  └──────────┬──────────┘  │
//! │         │                │                    │             │
//! │         ▼                ▼                    ▼             │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │            select → expand → playout →                │  │
//! │  │          backpropagate   (worker threads)             │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod evaluator;
mod minimax;
pub mod node;
pub mod playout;
pub mod recommend;
pub mod scored;
pub mod search;
pub mod select;
pub mod tt;

// Re-export main types
pub use config::{ConfigError, FinalMoveKind, PlayoutKind, SearchConfig, SelectionKind};
pub use evaluator::{
    BatchBackend, BatchingEvaluator, CachingEvaluator, Evaluator, EvaluatorError,
    HeuristicEvaluator, UniformEvaluator,
};
pub use node::{Node, Proof, PROVEN_SCORE};
pub use playout::{EpsilonGreedyPlayout, PlayoutStrategy, RandomPlayout};
pub use recommend::{FinalMoveStrategy, RobustChild, SecureChild};
pub use scored::{ScoredMove, ScoredMoveList};
pub use search::{EvaluatorFactory, SearchBudget, SearchError, SearchOutcome, Searcher};
pub use select::{Descent, ProofBiasedEpsilonGreedy, SelectionStrategy, Ucb1};
pub use tt::{LearnedEntry, TranspositionTable, DEFAULT_NUM_BITS, DEFAULT_RETENTION_OFFSET};
