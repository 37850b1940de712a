//! Typed game trait.
//!
//! A `Game` value is a stateless rules object; all game state lives in the
//! associated `Position` type. Positions are cheap-to-clone values so the
//! search can fork them freely during simulation.

use crate::error::GameError;

/// Identity of a player.
///
/// Utility vectors and per-agent search statistics are indexed by
/// `Agent::index()`. For two-player games agents are `Agent(0)` and
/// `Agent(1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Agent(pub u8);

impl Agent {
    /// Index into per-agent vectors.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The opposing agent of a two-player game.
    #[inline]
    pub fn other(self) -> Agent {
        Agent(1 - self.0)
    }
}

/// Rules capability consumed by the search core.
///
/// Contract:
/// - `legal_moves` returns an ordered sequence; the order is fixed for a given
///   position and indexes child slots in the search tree.
/// - `apply` is copy-on-write: it never mutates the input position.
/// - `utilities` is meaningful at terminal positions and returns one entry per
///   agent in `[-1.0, 1.0]` (win `1.0`, loss `-1.0`, draw `0.0` for zero-sum
///   games).
/// - `position_hash` is a Zobrist-style 64-bit fingerprint. It is not required
///   to be collision-free; the transposition table treats hash equality as
///   position equality.
pub trait Game: Send + Sync + 'static {
    /// Complete game state. Cloned on every simulated move.
    type Position: Clone + Send + Sync;

    /// A move. `Debug` is required so diagnostics can name moves.
    type Move: Clone + PartialEq + Send + Sync + std::fmt::Debug;

    /// Stable identifier used in logs and diagnostics.
    fn id(&self) -> &str;

    /// Number of agents. The solver and implicit-minimax paths require
    /// exactly two.
    fn num_agents(&self) -> usize;

    /// The agent to move in `position`.
    fn mover(&self, position: &Self::Position) -> Agent;

    /// Ordered legal moves. Empty exactly when `is_terminal` is true.
    fn legal_moves(&self, position: &Self::Position) -> Vec<Self::Move>;

    /// Apply `mv` to `position`, returning the successor position.
    fn apply(&self, position: &Self::Position, mv: &Self::Move)
        -> Result<Self::Position, GameError>;

    /// Whether the position is terminal.
    fn is_terminal(&self, position: &Self::Position) -> bool;

    /// Per-agent outcome scores for `position`.
    fn utilities(&self, position: &Self::Position) -> Vec<f64>;

    /// 64-bit fingerprint of `position`.
    fn position_hash(&self, position: &Self::Position) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_index_and_other() {
        assert_eq!(Agent(0).index(), 0);
        assert_eq!(Agent(1).index(), 1);
        assert_eq!(Agent(0).other(), Agent(1));
        assert_eq!(Agent(1).other(), Agent(0));
    }
}
