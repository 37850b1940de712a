//! Error types for game implementations.

use thiserror::Error;

/// Errors surfaced by game rule operations.
///
/// `apply` is the only fallible operation the search calls on the hot path;
/// a failure there is local to one exploratory copy of a position and never
/// damages shared search state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GameError {
    /// The move is not legal in the given position.
    #[error("illegal move: {0}")]
    IllegalMove(String),

    /// The position violates an internal consistency rule of the game.
    #[error("corrupt position: {0}")]
    CorruptPosition(String),
}
