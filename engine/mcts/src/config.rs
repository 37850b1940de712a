//! Search configuration.
//!
//! All knobs live in one serde-friendly struct. Configuration can come from
//! code, a TOML file found on the search path (or named by `MCTS_CONFIG`),
//! and per-field environment overrides, in that order. Every path ends in
//! [`SearchConfig::validate`]; a bad strategy name or out-of-range bound is
//! rejected before a search ever starts.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::node::PROVEN_SCORE;
use crate::tt::{DEFAULT_NUM_BITS, DEFAULT_RETENTION_OFFSET};

/// Relative locations probed by [`SearchConfig::load`], in order.
pub const CONFIG_SEARCH_PATHS: &[&str] = &["mcts.toml", "config/mcts.toml"];

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "MCTS_CONFIG";

/// Errors raised while building or validating a configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("unknown {kind} strategy '{name}'")]
    UnknownStrategy { kind: &'static str, name: String },

    #[error("{field} out of range: {detail}")]
    OutOfRange { field: &'static str, detail: String },

    #[error("batched evaluation enabled but the evaluator reports no batch support")]
    BatchingUnsupported,

    #[error("solver and implicit minimax require a two-agent game, got {0}")]
    UnsupportedAgentCount(usize),

    #[error("search budget must bound time or iterations")]
    UnboundedBudget,

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("failed to read config file {path}: {detail}")]
    Io { path: String, detail: String },
}

/// Selection strategy for the descent phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionKind {
    Ucb1,
    EpsilonGreedy,
}

impl SelectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionKind::Ucb1 => "ucb1",
            SelectionKind::EpsilonGreedy => "epsilon-greedy",
        }
    }
}

impl FromStr for SelectionKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s {
            "ucb1" => Ok(SelectionKind::Ucb1),
            "epsilon-greedy" => Ok(SelectionKind::EpsilonGreedy),
            _ => Err(ConfigError::UnknownStrategy { kind: "selection", name: s.to_string() }),
        }
    }
}

/// Playout strategy finishing an iteration below the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayoutKind {
    Random,
    EpsilonGreedy,
}

impl PlayoutKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayoutKind::Random => "random",
            PlayoutKind::EpsilonGreedy => "epsilon-greedy",
        }
    }
}

impl FromStr for PlayoutKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s {
            "random" => Ok(PlayoutKind::Random),
            "epsilon-greedy" => Ok(PlayoutKind::EpsilonGreedy),
            _ => Err(ConfigError::UnknownStrategy { kind: "playout", name: s.to_string() }),
        }
    }
}

/// Strategy picking the move to play once the budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinalMoveKind {
    RobustChild,
    SecureChild,
}

impl FinalMoveKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FinalMoveKind::RobustChild => "robust-child",
            FinalMoveKind::SecureChild => "secure-child",
        }
    }
}

impl FromStr for FinalMoveKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s {
            "robust-child" => Ok(FinalMoveKind::RobustChild),
            "secure-child" => Ok(FinalMoveKind::SecureChild),
            _ => Err(ConfigError::UnknownStrategy { kind: "final-move", name: s.to_string() }),
        }
    }
}

/// Configuration for one searcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Worker threads sharing the tree.
    pub num_threads: usize,

    /// Exploration constant in the UCB formula.
    /// Higher values favor exploration; sqrt(2) is the classic choice.
    pub exploration_constant: f64,

    /// Probability of the statistics-free branch in epsilon-greedy
    /// selection, and of a random move in the epsilon-greedy playout.
    pub epsilon: f64,

    /// Track game-theoretic proofs during backpropagation.
    pub proof_aware: bool,

    /// Maintain shallow minimax values alongside sampled statistics.
    pub implicit_minimax: bool,

    /// Weight of the minimax value when blended into selection, in [0, 1].
    /// 0.0 selects on sampled scores alone.
    pub minimax_blend_weight: f64,

    /// Ply cap for a single playout.
    pub playout_turn_limit: usize,

    /// Absolute evaluation at which the epsilon-greedy playout treats a
    /// position as decided, in (0, 1].
    pub decisive_threshold: f64,

    /// Bucket-index width of the transposition table: 2^bits buckets.
    pub num_bits_primary_code: u32,

    /// Searches an untouched transposition entry survives before sweeping.
    pub retention_offset: u32,

    /// Memoize evaluator scores in a transposition table shared across
    /// consecutive searches.
    pub use_transposition_table: bool,

    /// Require an evaluator that assembles cross-worker batches.
    pub batched_evaluation: bool,

    /// Flush threshold for batched evaluation.
    pub eval_batch_size: usize,

    /// Upper bound on the wait for a batch to fill, in milliseconds.
    pub eval_batch_wait_ms: u64,

    /// Placeholder score for unvisited children in secure-child selection.
    /// Pessimistic by default so unexplored moves are not played blind.
    pub unvisited_move_value: f64,

    /// Base seed for the per-worker random streams. `None` seeds from
    /// entropy, making searches non-reproducible.
    pub seed: Option<u64>,

    pub selection: SelectionKind,
    pub playout: PlayoutKind,
    pub final_move: FinalMoveKind,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            num_threads: 1,
            exploration_constant: std::f64::consts::SQRT_2,
            epsilon: 0.1,
            proof_aware: true,
            implicit_minimax: false,
            minimax_blend_weight: 0.4,
            playout_turn_limit: 200,
            decisive_threshold: 0.8,
            num_bits_primary_code: DEFAULT_NUM_BITS,
            retention_offset: DEFAULT_RETENTION_OFFSET,
            use_transposition_table: false,
            batched_evaluation: false,
            eval_batch_size: 32,
            eval_batch_wait_ms: 2,
            unvisited_move_value: -PROVEN_SCORE,
            seed: None,
            selection: SelectionKind::Ucb1,
            playout: PlayoutKind::Random,
            final_move: FinalMoveKind::RobustChild,
        }
    }
}

macro_rules! env_override {
    ($config:expr, $field:ident, $env:literal) => {
        if let Ok(raw) = std::env::var($env) {
            match raw.parse() {
                Ok(value) => {
                    debug!(field = stringify!($field), %raw, "environment override");
                    $config.$field = value;
                }
                Err(_) => warn!("ignoring unparseable {} value '{}'", $env, raw),
            }
        }
    };
}

impl SearchConfig {
    /// Small, single-threaded, reproducible configuration for tests.
    pub fn for_testing() -> Self {
        Self {
            num_threads: 1,
            num_bits_primary_code: 8,
            eval_batch_size: 4,
            seed: Some(42),
            ..Self::default()
        }
    }

    pub fn with_threads(mut self, n: usize) -> Self {
        self.num_threads = n;
        self
    }

    pub fn with_exploration_constant(mut self, c: f64) -> Self {
        self.exploration_constant = c;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_proof_aware(mut self, on: bool) -> Self {
        self.proof_aware = on;
        self
    }

    pub fn with_implicit_minimax(mut self, on: bool) -> Self {
        self.implicit_minimax = on;
        self
    }

    pub fn with_transposition_table(mut self, on: bool) -> Self {
        self.use_transposition_table = on;
        self
    }

    pub fn with_selection(mut self, kind: SelectionKind) -> Self {
        self.selection = kind;
        self
    }

    pub fn with_playout(mut self, kind: PlayoutKind) -> Self {
        self.playout = kind;
        self
    }

    pub fn with_final_move(mut self, kind: FinalMoveKind) -> Self {
        self.final_move = kind;
        self
    }

    /// Parses a TOML document. Unknown strategy names and type mismatches
    /// are reported, not defaulted.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SearchConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates the file at `path`.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        let config = Self::from_toml_str(&text)?;
        info!(path = %path.display(), "loaded search config");
        Ok(config)
    }

    /// Resolves the effective configuration.
    ///
    /// An explicit `MCTS_CONFIG` path must load; a missing file there is an
    /// error. Otherwise the search paths are probed and absence falls back
    /// to defaults. Field-level environment overrides apply last, followed
    /// by validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = if let Ok(path) = std::env::var(CONFIG_ENV) {
            Self::load_from_path(Path::new(&path))?
        } else {
            let mut found = None;
            for candidate in CONFIG_SEARCH_PATHS {
                let path = Path::new(candidate);
                if path.exists() {
                    found = Some(Self::load_from_path(path)?);
                    break;
                }
            }
            found.unwrap_or_else(|| {
                debug!("no config file found, using defaults");
                Self::default()
            })
        };

        env_override!(config, num_threads, "MCTS_NUM_THREADS");
        env_override!(config, exploration_constant, "MCTS_EXPLORATION_CONSTANT");
        env_override!(config, epsilon, "MCTS_EPSILON");
        env_override!(config, proof_aware, "MCTS_PROOF_AWARE");
        env_override!(config, implicit_minimax, "MCTS_IMPLICIT_MINIMAX");
        if let Ok(raw) = std::env::var("MCTS_SEED") {
            match raw.parse() {
                Ok(seed) => config.seed = Some(seed),
                Err(_) => warn!("ignoring unparseable MCTS_SEED value '{raw}'"),
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks every numeric bound. Called by all loading paths and again by
    /// the searcher, so a hand-built configuration cannot slip through.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn out_of_range(field: &'static str, detail: String) -> ConfigError {
            ConfigError::OutOfRange { field, detail }
        }

        if self.num_threads == 0 {
            return Err(out_of_range("num_threads", "must be at least 1".into()));
        }
        if !self.exploration_constant.is_finite() || self.exploration_constant < 0.0 {
            return Err(out_of_range(
                "exploration_constant",
                format!("must be finite and non-negative, got {}", self.exploration_constant),
            ));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(out_of_range("epsilon", format!("must be in [0, 1], got {}", self.epsilon)));
        }
        if !(0.0..=1.0).contains(&self.minimax_blend_weight) {
            return Err(out_of_range(
                "minimax_blend_weight",
                format!("must be in [0, 1], got {}", self.minimax_blend_weight),
            ));
        }
        if self.playout_turn_limit == 0 {
            return Err(out_of_range("playout_turn_limit", "must be at least 1".into()));
        }
        if !(self.decisive_threshold > 0.0 && self.decisive_threshold <= 1.0) {
            return Err(out_of_range(
                "decisive_threshold",
                format!("must be in (0, 1], got {}", self.decisive_threshold),
            ));
        }
        if !(1..=30).contains(&self.num_bits_primary_code) {
            return Err(out_of_range(
                "num_bits_primary_code",
                format!("must be in 1..=30, got {}", self.num_bits_primary_code),
            ));
        }
        if self.retention_offset == 0 {
            return Err(out_of_range("retention_offset", "must be at least 1".into()));
        }
        if self.eval_batch_size == 0 {
            return Err(out_of_range("eval_batch_size", "must be at least 1".into()));
        }
        if self.eval_batch_wait_ms == 0 {
            return Err(out_of_range("eval_batch_wait_ms", "must be at least 1".into()));
        }
        if !self.unvisited_move_value.is_finite()
            || self.unvisited_move_value.abs() > PROVEN_SCORE
        {
            return Err(out_of_range(
                "unvisited_move_value",
                format!(
                    "must be finite within the proof sentinel, got {}",
                    self.unvisited_move_value
                ),
            ));
        }
        Ok(())
    }
}
