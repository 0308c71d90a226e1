//! Full-rebuild mutation of an index
//!
//! A builder starts from an empty table. Callers [`add`](Builder::add) new
//! entries and [`keep`](Builder::keep) ranges of the current table, in any
//! order; [`finish`](Builder::finish) sorts if needed, checks the stage rules
//! and swaps the new table in. The cache tree does not survive a rebuild.

use crate::areas::index::Index;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object::ObjectSource;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::walk::cursor::TreeCursor;
use crate::artifacts::walk::tree_walk::TreeWalk;
use crate::errors::{IndexError, IndexResult};
use std::cmp::Ordering;

#[derive(Debug)]
pub struct Builder<'i> {
    index: &'i mut Index,
    entries: Vec<IndexEntry>,
    sorted: bool,
}

impl<'i> Builder<'i> {
    pub(crate) fn new(index: &'i mut Index) -> Self {
        let capacity = index.entry_count();
        Builder {
            index,
            entries: Vec::with_capacity(capacity),
            sorted: true,
        }
    }

    /// Append an entry; its mode must already be set to a file-like mode
    pub fn add(&mut self, entry: IndexEntry) -> IndexResult<()> {
        if !entry.mode().is_storable() {
            return Err(IndexError::InvalidMode {
                mode: entry.raw_mode(),
                path: entry.path_string(),
            });
        }

        self.before_add(&entry)?;
        self.entries.push(entry);
        Ok(())
    }

    /// Copy `count` entries of the current table starting at `start`
    pub fn keep(&mut self, start: usize, count: usize) -> IndexResult<()> {
        let end = start.saturating_add(count).min(self.index.entry_count());
        if start >= end {
            return Ok(());
        }

        let kept = self.index.entries()[start..end].to_vec();
        self.before_add(&kept[0])?;
        self.entries.extend(kept);
        Ok(())
    }

    /// Expand a stored tree into entries under `prefix`, all at one stage
    ///
    /// Paths added this way must not also be added explicitly.
    pub fn add_tree(
        &mut self,
        prefix: &[u8],
        stage: i32,
        source: &dyn ObjectSource,
        tree_id: &ObjectId,
    ) -> IndexResult<()> {
        let mut walk = TreeWalk::new();
        walk.add_tree(TreeCursor::from_tree(source, tree_id)?);
        walk.set_recursive(true);

        let mut added = 0usize;
        while walk.next()? {
            let mut path = Vec::with_capacity(prefix.len() + 1 + walk.path().len());
            if !prefix.is_empty() {
                path.extend_from_slice(prefix);
                path.push(b'/');
            }
            path.extend_from_slice(walk.path());

            let mut entry = IndexEntry::new(path, stage)?;
            entry.set_mode(walk.file_mode(0))?;
            entry.set_object_id(&walk.object_id(0)?);
            self.add(entry)?;
            added += 1;
        }

        tracing::debug!(
            prefix = %String::from_utf8_lossy(prefix),
            tree = %tree_id,
            stage,
            added,
            "expanded tree into index builder"
        );
        Ok(())
    }

    /// In-order stage checks; out-of-order additions only defer checking
    fn before_add(&mut self, entry: &IndexEntry) -> IndexResult<()> {
        if !self.sorted {
            return Ok(());
        }
        let Some(last) = self.entries.last() else {
            return Ok(());
        };

        match last.path().cmp(entry.path()) {
            Ordering::Greater => self.sorted = false,
            Ordering::Equal => {
                check_stages(last, entry)?;
                if last.stage() > entry.stage() {
                    self.sorted = false;
                }
            }
            Ordering::Less => {}
        }
        Ok(())
    }

    /// Sort if needed, validate stages and replace the index's table
    pub fn finish(mut self) -> IndexResult<()> {
        self.check()?;
        self.install();
        Ok(())
    }

    /// Finish, write the locked index and commit it
    ///
    /// A rejected table releases the lock and leaves the index as it was.
    pub fn commit(mut self) -> IndexResult<()> {
        if let Err(err) = self.check() {
            self.index.unlock();
            return Err(err);
        }
        let index = self.install();
        index.write()?;
        index.commit()
    }

    fn check(&mut self) -> IndexResult<()> {
        if !self.sorted {
            self.entries.sort_by(IndexEntry::cmp_index_order);
        }
        for pair in self.entries.windows(2) {
            if pair[0].path() == pair[1].path() {
                check_stages(&pair[0], &pair[1])?;
            }
        }
        Ok(())
    }

    fn install(self) -> &'i mut Index {
        tracing::debug!(
            entries = self.entries.len(),
            resorted = !self.sorted,
            "index builder finished"
        );
        self.index.replace(self.entries, None);
        self.index
    }
}

fn check_stages(previous: &IndexEntry, next: &IndexEntry) -> IndexResult<()> {
    if previous.stage() == next.stage() {
        return Err(IndexError::DuplicateStage {
            path: next.path_string(),
            stage: next.stage().as_u8(),
        });
    }
    if previous.is_merged() || next.is_merged() {
        return Err(IndexError::MixedStages(next.path_string()));
    }
    Ok(())
}
