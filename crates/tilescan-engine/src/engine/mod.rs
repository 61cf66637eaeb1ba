//! Move semantics on top of the [`core`](crate::core) data structures.
//!
//! - [`SlideOutcome`] - result of [`Board::shift`](crate::Board::shift): the
//!   new board plus every merge that happened
//! - [`Merge`] - a single merge event (where, and the value it produced)
//! - [`TileSpawner`] - seeded placement of the random tile that follows
//!   every effective move
//!
//! # Move Semantics
//!
//! Each line parallel to the move direction is processed independently:
//!
//! 1. Non-empty tiles are packed towards the target edge
//! 2. Adjacent equal tiles merge pairwise, nearest the edge first
//! 3. A tile produced by a merge does not merge again in the same move
//!
//! A move that leaves the board unchanged is not a legal move, and no
//! tile spawns after it.

pub use self::{slide::*, spawner::*};

mod slide;
mod spawner;
