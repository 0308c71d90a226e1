//! Tree cursors and tree walks
//!
//! A cursor iterates one level of one hierarchical source: a stored tree,
//! the index, or the working directory. A walk runs several cursors side by
//! side and reports one row per distinct path.

pub mod canonical_tree_cursor;
pub mod cursor;
pub mod filter;
pub mod index_cursor;
mod name_conflict;
pub mod tree_walk;
pub mod workspace_cursor;
