//! Directory/file conflict handling for [`TreeWalk::with_name_conflicts`]
//!
//! With plain canonical ordering a file `foo` in one tree and a directory
//! `foo/` in another never meet: `foo.c` or `foo0` may sort between them.
//! The conflict-aware election merges them into one directory row:
//!
//! - `fast_min` unifies them when they happen to be adjacent;
//! - `combine_df` looks ahead in the other trees for a `foo/` that sorts
//!   later, shifting those cursors forward and remembering how far;
//! - `skip_entry` looks behind before a directory row is reported, so a
//!   directory already merged into an earlier file row is not reported twice.
//!
//! The look-ahead and look-behind are bounded by how many names sort
//! between `foo` and `foo/`.

use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::walk::cursor::TreeCursor;
use crate::artifacts::walk::tree_walk::TreeWalk;
use std::cmp::Ordering;

const TREE_MODE: u32 = 0o040000;

/// Same name, ignoring whether either side is a directory
fn name_equal(a: &TreeCursor<'_>, b: &TreeCursor<'_>) -> bool {
    a.path_compare_as(b, TREE_MODE) == Ordering::Equal
}

impl<'a> TreeWalk<'a> {
    pub(super) fn conflict_min(&mut self) -> Option<usize> {
        loop {
            let (head, has_match) = self.fast_min()?;

            if self.trees[head].is_tree() {
                if self.skip_entry(head) {
                    tracing::trace!(
                        path = %String::from_utf8_lossy(self.trees[head].path()),
                        "directory already reported with a file of the same name"
                    );
                    for nth in 0..self.trees.len() {
                        if self.matches[nth] == Some(head) {
                            self.trees[nth].next(1);
                            self.matches[nth] = None;
                        }
                    }
                    if self.df_conflict == Some((self.depth(), head)) {
                        self.df_conflict = None;
                    }
                    continue;
                }
                return Some(head);
            }

            if has_match {
                return Some(head);
            }
            return Some(self.combine_df(head));
        }
    }

    /// Ordinary minimum election that also merges adjacent file/directory pairs
    ///
    /// The flag is false when some live cursor sorted after the minimum for
    /// a reason other than the adjacent pair.
    fn fast_min(&mut self) -> Option<(usize, bool)> {
        self.matches.fill(None);

        let count = self.trees.len();
        let first = (0..count).find(|&nth| !self.trees[nth].eof())?;

        let mut head = first;
        let mut has_match = true;
        let mut has_conflict = false;
        self.matches[head] = Some(head);

        for nth in first + 1..count {
            let tree = &self.trees[nth];
            if tree.eof() {
                continue;
            }

            let min_ref = &self.trees[head];
            match tree.path_compare(min_ref) {
                Ordering::Less => {
                    if has_match
                        && min_ref.is_tree()
                        && !tree.is_tree()
                        && name_equal(min_ref, tree)
                    {
                        // a file sorting right before the directory of the same name
                        self.matches[nth] = Some(head);
                        has_conflict = true;
                    } else {
                        has_match = false;
                        self.matches[nth] = Some(nth);
                        head = nth;
                    }
                }
                Ordering::Equal => self.matches[nth] = Some(head),
                Ordering::Greater => {
                    if has_match
                        && tree.is_tree()
                        && !min_ref.is_tree()
                        && !min_ref.is_gitlink()
                        && name_equal(tree, min_ref)
                    {
                        // the directory follows the file directly; it heads the row
                        for earlier in 0..nth {
                            if self.matches[earlier] == Some(head) {
                                self.matches[earlier] = Some(nth);
                            }
                        }
                        self.matches[nth] = Some(nth);
                        head = nth;
                        has_conflict = true;
                    } else {
                        has_match = false;
                    }
                }
            }
        }

        if has_conflict && has_match && self.df_conflict.is_none() {
            self.mark_conflict(head);
        }
        Some((head, has_match))
    }

    /// Look ahead in the other trees for a directory named like the file `head`
    ///
    /// Returns the cursor that heads the row, the directory if one was found.
    fn combine_df(&mut self, head: usize) -> usize {
        let mut tree_match = None;

        for nth in 0..self.trees.len() {
            if self.matches[nth] == Some(head) || self.trees[nth].eof() {
                continue;
            }

            loop {
                match self.trees[nth].path_compare_as(&self.trees[head], TREE_MODE) {
                    Ordering::Less => {
                        // "$path/" may still appear later
                        self.match_shift[nth] += 1;
                        self.trees[nth].next(1);
                        if self.trees[nth].eof() {
                            let shift = std::mem::take(&mut self.match_shift[nth]);
                            self.trees[nth].back(shift);
                            break;
                        }
                    }
                    Ordering::Equal => {
                        self.matches[nth] = Some(head);
                        tree_match = Some(nth);
                        break;
                    }
                    Ordering::Greater => {
                        let shift = std::mem::take(&mut self.match_shift[nth]);
                        if shift != 0 {
                            self.trees[nth].back(shift);
                        }
                        break;
                    }
                }
            }
        }

        let Some(tree_match) = tree_match else {
            return head;
        };

        for nth in 0..self.trees.len() {
            if self.matches[nth] == Some(head) {
                self.matches[nth] = Some(tree_match);
            }
        }
        if self.df_conflict.is_none() && !self.trees[head].is_gitlink() {
            self.mark_conflict(tree_match);
        }
        tree_match
    }

    /// True when the directory `head` was already reported through an earlier file row
    fn skip_entry(&mut self, head: usize) -> bool {
        for nth in 0..self.trees.len() {
            if self.matches[nth] == Some(head) || self.trees[nth].first() {
                continue;
            }

            let mut steps_back = 0;
            loop {
                steps_back += 1;
                self.trees[nth].back(1);

                let order = self.trees[nth].path_compare_as(&self.trees[head], 0);
                if order == Ordering::Equal {
                    self.trees[nth].next(steps_back);
                    return true;
                }
                if order == Ordering::Less || self.trees[nth].first() {
                    self.trees[nth].next(steps_back);
                    break;
                }
            }
        }

        false
    }

    fn mark_conflict(&mut self, head: usize) {
        tracing::debug!(
            path = %String::from_utf8_lossy(self.trees[head].path()),
            mode = %EntryMode::from_bits(self.trees[head].raw_mode()).as_str(),
            depth = self.depth(),
            "directory/file conflict"
        );
        self.df_conflict = Some((self.depth(), head));
    }
}
