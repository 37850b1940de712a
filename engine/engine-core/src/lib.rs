//! Game abstraction for the search engine.
//!
//! This crate provides the fundamental abstraction the search core runs
//! against:
//! - `Game`: typed trait owning the rules (move generation, move application,
//!   terminal detection and scoring, position hashing)
//! - `Agent`: identity of a player in utility vectors and proof bookkeeping
//! - `GameError`: rule-level failures surfaced by fallible operations
//!
//! The search never mutates a shared position in place; `apply` returns a
//! fresh position, so exploratory simulation cannot corrupt tree state.

pub mod error;
pub mod game;

// Re-export main types for convenience
pub use error::GameError;
pub use game::{Agent, Game};
