//! Git-compatible staging area (index) engine and n-way tree walker
//!
//! [`areas::index::Index`] reads, edits and atomically rewrites the version 2
//! index file. [`artifacts::walk::tree_walk::TreeWalk`] walks any mix of
//! stored trees, the index and the working directory in lockstep.

pub mod areas;
pub mod artifacts;
pub mod errors;

pub use errors::{IndexError, IndexResult};
