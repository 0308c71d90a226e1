//! Row filters for tree walks
//!
//! A filter is asked about every row the walk elects. Rejected rows are
//! skipped as a whole, so rejecting a directory skips everything below it.

use crate::artifacts::walk::tree_walk::{PathMatch, TreeWalk};
use crate::errors::IndexResult;
use bytes::Bytes;
use std::fmt::Debug;

pub trait TreeFilter: Debug {
    /// Whether the walk's current row is reported
    fn include(&self, walk: &TreeWalk<'_>) -> IndexResult<bool>;

    /// True when the filter can only match below the top level
    fn should_be_recursive(&self) -> bool {
        false
    }
}

/// Includes every row
#[derive(Debug, Clone, Copy, Default)]
pub struct AllFilter;

impl TreeFilter for AllFilter {
    fn include(&self, _walk: &TreeWalk<'_>) -> IndexResult<bool> {
        Ok(true)
    }
}

/// Includes a path, everything beneath it, and the directories leading to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFilter {
    path: Bytes,
}

impl PathFilter {
    /// A trailing `/` is ignored
    pub fn new(path: impl Into<Bytes>) -> Self {
        let mut path = path.into();
        while path.last() == Some(&b'/') {
            path.truncate(path.len() - 1);
        }
        PathFilter { path }
    }

    pub fn path(&self) -> &[u8] {
        &self.path
    }
}

impl TreeFilter for PathFilter {
    fn include(&self, walk: &TreeWalk<'_>) -> IndexResult<bool> {
        Ok(walk.is_path_match(&self.path) != PathMatch::Miss)
    }

    fn should_be_recursive(&self) -> bool {
        self.path.contains(&b'/')
    }
}

/// Includes rows where at least two trees differ in mode or id
///
/// A walk over a single tree includes everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyDiffFilter;

impl TreeFilter for AnyDiffFilter {
    fn include(&self, walk: &TreeWalk<'_>) -> IndexResult<bool> {
        let count = walk.tree_count();
        if count == 1 {
            return Ok(true);
        }

        let mode = walk.raw_mode(0);
        if (1..count).any(|nth| walk.raw_mode(nth) != mode) {
            return Ok(true);
        }
        for nth in 1..count {
            if !walk.id_equal(nth, 0)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
