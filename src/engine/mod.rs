//! Queue/assignment engine: moves people between the waiting queue and courts.

/// Fill, clear and single-player moves.
pub mod allocation;
/// Batched per-position edits with optimistic checks.
pub mod game;
