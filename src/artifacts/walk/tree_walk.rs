//! N-way tree walk
//!
//! A [`TreeWalk`] advances any number of [`TreeCursor`]s in lockstep. Each
//! step elects the smallest current path (in canonical order) as the row;
//! every cursor positioned on that same path is *matched* to the row, the
//! others contribute a missing value for it.
//!
//! ```text
//! tree 0: a  a.b  a0b          rows: a      [0]
//! tree 1:           a/b              a.b    [0]
//!                                    a/     [1]   (a/b once entered)
//!                                    a0b    [0]
//! ```
//!
//! In recursive mode directory rows are entered instead of reported; with
//! post-order enabled they are reported once more after their children.
//! [`TreeWalk::with_name_conflicts`] builds the conflict-aware variant,
//! which reports a file and a directory of the same name as one row.

use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::paths;
use crate::artifacts::walk::cursor::{CursorKind, TreeCursor};
use crate::artifacts::walk::filter::{AllFilter, TreeFilter};
use crate::areas::workspace::WorkspaceEntry;
use crate::errors::{IndexError, IndexResult};
use std::cmp::Ordering;

/// How the current row's path relates to a path being looked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMatch {
    /// The row is the path or lies beneath it
    Match,
    /// The row is a directory on the way to the path
    Parent,
    Miss,
}

/// Cursors of an enclosing directory, parked while a subtree is walked
#[derive(Debug)]
struct Level<'a> {
    cursors: Vec<TreeCursor<'a>>,
    matches: Vec<Option<usize>>,
    match_shift: Vec<usize>,
    head: Option<usize>,
}

#[derive(Debug)]
pub struct TreeWalk<'a> {
    pub(super) trees: Vec<TreeCursor<'a>>,
    /// For each cursor, the cursor heading the row it was matched to
    pub(super) matches: Vec<Option<usize>>,
    /// How far a cursor was moved ahead to line up a directory with a file
    pub(super) match_shift: Vec<usize>,
    pub(super) head: Option<usize>,
    /// Row (depth, head) that merged a file with a directory
    pub(super) df_conflict: Option<(usize, usize)>,
    levels: Vec<Level<'a>>,
    filter: Box<dyn TreeFilter>,
    recursive: bool,
    post_order: bool,
    post_children: bool,
    advance: bool,
    name_conflicts: bool,
}

impl Default for TreeWalk<'_> {
    fn default() -> Self {
        TreeWalk {
            trees: Vec::new(),
            matches: Vec::new(),
            match_shift: Vec::new(),
            head: None,
            df_conflict: None,
            levels: Vec::new(),
            filter: Box::new(AllFilter),
            recursive: false,
            post_order: false,
            post_children: false,
            advance: false,
            name_conflicts: false,
        }
    }
}

impl<'a> TreeWalk<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A walk that lines up `name` files with `name/` directories
    pub fn with_name_conflicts() -> Self {
        TreeWalk {
            name_conflicts: true,
            ..Self::default()
        }
    }

    /// Add a cursor and return its position in the walk
    ///
    /// Adding while inside a subtree resets the walk first.
    pub fn add_tree(&mut self, cursor: TreeCursor<'a>) -> usize {
        if !self.levels.is_empty() {
            self.reset();
        }
        self.trees.push(cursor);
        self.matches.push(None);
        self.match_shift.push(0);
        self.trees.len() - 1
    }

    pub fn set_recursive(&mut self, recursive: bool) {
        self.recursive = recursive;
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub fn set_post_order(&mut self, post_order: bool) {
        self.post_order = post_order;
    }

    pub fn is_post_order(&self) -> bool {
        self.post_order
    }

    /// A filter that can only match below the top level also turns recursion on
    pub fn set_filter(&mut self, filter: impl TreeFilter + 'static) {
        if filter.should_be_recursive() {
            self.recursive = true;
        }
        self.filter = Box::new(filter);
    }

    pub fn filter(&self) -> &dyn TreeFilter {
        self.filter.as_ref()
    }

    pub fn has_name_conflicts(&self) -> bool {
        self.name_conflicts
    }

    /// Rewind every cursor to its first entry at the top level
    pub fn reset(&mut self) {
        while !self.levels.is_empty() {
            self.exit_subtree();
        }
        for tree in self.trees.iter_mut() {
            tree.reset();
        }
        self.matches.fill(None);
        self.match_shift.fill(0);
        self.head = None;
        self.df_conflict = None;
        self.advance = false;
        self.post_children = false;
    }

    /// Move to the next row; `false` once every cursor is exhausted
    pub fn next(&mut self) -> IndexResult<bool> {
        if self.advance {
            self.advance = false;
            self.post_children = false;
            self.pop_entries_equal();
        }

        loop {
            let Some(head) = self.min() else {
                if self.levels.is_empty() {
                    self.head = None;
                    return Ok(false);
                }

                self.exit_subtree();
                if self.post_order {
                    self.advance = true;
                    self.post_children = true;
                    return Ok(true);
                }
                self.pop_entries_equal();
                continue;
            };

            self.head = Some(head);
            if !self.filter.include(self)? {
                self.skip_entries_equal();
                continue;
            }

            if self.recursive && self.trees[head].is_tree() {
                self.enter_subtree()?;
                continue;
            }

            self.advance = true;
            return Ok(true);
        }
    }

    fn min(&mut self) -> Option<usize> {
        if self.name_conflicts {
            self.conflict_min()
        } else {
            self.plain_min()
        }
    }

    fn plain_min(&mut self) -> Option<usize> {
        self.matches.fill(None);

        let mut head: Option<usize> = None;
        for (nth, tree) in self.trees.iter().enumerate() {
            if tree.eof() {
                continue;
            }
            match head {
                Some(current) if tree.path_compare(&self.trees[current]) != Ordering::Less => {}
                _ => head = Some(nth),
            }
        }

        let head = head?;
        for (nth, tree) in self.trees.iter().enumerate() {
            if !tree.eof() && tree.path_compare(&self.trees[head]) == Ordering::Equal {
                self.matches[nth] = Some(head);
            }
        }
        Some(head)
    }

    /// Descend every matched cursor into the current directory row
    ///
    /// Cursors not taking part in the row get an empty subtree so all
    /// cursors stay at the same depth.
    pub fn enter_subtree(&mut self) -> IndexResult<()> {
        let head = match self.head {
            Some(head) if self.trees[head].is_tree() => head,
            _ => return Err(IndexError::NotATree(self.path_string())),
        };

        let mut kinds = Vec::with_capacity(self.trees.len());
        for (nth, tree) in self.trees.iter().enumerate() {
            if self.matches[nth] == Some(head) && tree.is_tree() {
                kinds.push(tree.subtree_kind()?);
            } else {
                kinds.push(CursorKind::Empty);
            }
        }

        tracing::trace!(path = %self.path_string(), depth = self.depth() + 1, "entering subtree");
        let children: Vec<TreeCursor<'a>> = self
            .trees
            .iter_mut()
            .zip(kinds)
            .map(|(tree, kind)| tree.descend(kind))
            .collect();

        let count = children.len();
        let level = Level {
            cursors: std::mem::replace(&mut self.trees, children),
            matches: std::mem::replace(&mut self.matches, vec![None; count]),
            match_shift: std::mem::replace(&mut self.match_shift, vec![0; count]),
            head: self.head.take(),
        };
        self.levels.push(level);
        self.advance = false;
        Ok(())
    }

    fn exit_subtree(&mut self) {
        let Some(level) = self.levels.pop() else {
            return;
        };

        let children = std::mem::replace(&mut self.trees, level.cursors);
        for (parent, child) in self.trees.iter_mut().zip(children) {
            parent.ascend(child);
        }
        self.matches = level.matches;
        self.match_shift = level.match_shift;
        self.head = level.head;
        tracing::trace!(path = %self.path_string(), depth = self.depth(), "left subtree");
    }

    /// Advance every cursor that took part in the current row
    fn pop_entries_equal(&mut self) {
        let Some(head) = self.head else {
            return;
        };

        for nth in 0..self.trees.len() {
            if self.matches[nth] != Some(head) {
                continue;
            }
            match std::mem::take(&mut self.match_shift[nth]) {
                0 => self.trees[nth].next(1),
                shift => self.trees[nth].back(shift),
            }
            self.matches[nth] = None;
        }

        if self.df_conflict == Some((self.depth(), head)) {
            self.df_conflict = None;
        }
    }

    /// Like [`Self::pop_entries_equal`], skipping whole directories
    fn skip_entries_equal(&mut self) {
        let Some(head) = self.head else {
            return;
        };

        for nth in 0..self.trees.len() {
            if self.matches[nth] != Some(head) {
                continue;
            }
            match std::mem::take(&mut self.match_shift[nth]) {
                0 => self.trees[nth].skip(),
                shift => self.trees[nth].back(shift),
            }
            self.matches[nth] = None;
        }

        if self.df_conflict == Some((self.depth(), head)) {
            self.df_conflict = None;
        }
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Number of subtrees entered below the top level
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn cursor(&self, nth: usize) -> Option<&TreeCursor<'a>> {
        self.trees.get(nth)
    }

    /// Path of the current row
    pub fn path(&self) -> &[u8] {
        match self.head {
            Some(head) => self.trees[head].path(),
            None => &[],
        }
    }

    pub fn path_string(&self) -> String {
        String::from_utf8_lossy(self.path()).into_owned()
    }

    /// Last component of the current row's path
    pub fn name(&self) -> &[u8] {
        match self.head {
            Some(head) => self.trees[head].name(),
            None => &[],
        }
    }

    pub fn is_matched(&self, nth: usize) -> bool {
        self.head
            .is_some_and(|head| self.matches.get(nth) == Some(&Some(head)))
    }

    /// Mode of the row in tree `nth`, `0` where that tree lacks it
    pub fn raw_mode(&self, nth: usize) -> u32 {
        if self.is_matched(nth) {
            self.trees[nth].raw_mode()
        } else {
            0
        }
    }

    pub fn file_mode(&self, nth: usize) -> EntryMode {
        EntryMode::from_bits(self.raw_mode(nth))
    }

    /// Id of the row in tree `nth`, the zero id where that tree lacks it
    pub fn object_id(&self, nth: usize) -> IndexResult<ObjectId> {
        if self.is_matched(nth) {
            self.trees[nth].object_id()
        } else {
            Ok(ObjectId::zero())
        }
    }

    /// Whether trees `a` and `b` hold the same object for the current row
    ///
    /// Two trees that both lack the row are equal.
    pub fn id_equal(&self, a: usize, b: usize) -> IndexResult<bool> {
        match (self.is_matched(a), self.is_matched(b)) {
            (true, true) => self.trees[a].id_equal(&self.trees[b]),
            (false, false) => Ok(true),
            _ => Ok(false),
        }
    }

    pub fn index_entry(&self, nth: usize) -> Option<&'a IndexEntry> {
        if self.is_matched(nth) {
            self.trees[nth].index_entry()
        } else {
            None
        }
    }

    pub fn workspace_entry(&self, nth: usize) -> Option<&WorkspaceEntry> {
        if self.is_matched(nth) {
            self.trees[nth].workspace_entry()
        } else {
            None
        }
    }

    pub fn is_subtree(&self) -> bool {
        self.head.is_some_and(|head| self.trees[head].is_tree())
    }

    /// True while a directory row is reported after its children
    pub fn is_post_children(&self) -> bool {
        self.post_children && self.is_subtree()
    }

    /// True while the walk is inside a row that merged a file and a directory
    pub fn is_directory_file_conflict(&self) -> bool {
        self.df_conflict.is_some()
    }

    /// Where the current row lies relative to `path`
    ///
    /// `Equal` when either path contains the other, otherwise the canonical
    /// order of the row against `path` taken as a directory.
    pub fn is_path_prefix(&self, path: &[u8]) -> Ordering {
        let current = self.path();
        let common = current.len().min(path.len());
        match current[..common].cmp(&path[..common]) {
            Ordering::Equal => {}
            unequal => return unequal,
        }

        if current.len() > common {
            return current[common].cmp(&b'/');
        }
        if path.len() > common {
            if path[common] == b'/' && self.is_subtree() {
                return Ordering::Equal;
            }
            let mode = self.head.map(|head| self.trees[head].entry_mode()).unwrap_or_default();
            return paths::last_path_char(mode).cmp(&path[common]);
        }
        Ordering::Equal
    }

    pub fn is_path_match(&self, path: &[u8]) -> PathMatch {
        let current = self.path();
        let common = current.len().min(path.len());
        if current[..common] != path[..common] {
            return PathMatch::Miss;
        }

        if current.len() > common {
            return if current[common] == b'/' {
                PathMatch::Match
            } else {
                PathMatch::Miss
            };
        }
        if path.len() > common {
            return if path[common] == b'/' && self.is_subtree() {
                PathMatch::Parent
            } else {
                PathMatch::Miss
            };
        }
        PathMatch::Match
    }
}
