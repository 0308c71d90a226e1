//! Sparse mutation of an index
//!
//! An editor collects path edits and applies them in one merge pass over the
//! current table: untouched runs are copied through, only edited paths are
//! looked at. Cache-tree nodes along edited paths are invalidated, every
//! other subtree keeps its id.

use crate::areas::index::Index;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::errors::{IndexError, IndexResult};
use bytes::Bytes;
use std::fmt;

type ApplyFn = Box<dyn FnMut(&mut IndexEntry)>;

/// One queued change to the index
pub enum PathEdit {
    /// Mutate every stage of `path`, creating a stage 0 entry if it is absent
    Update { path: Bytes, apply: ApplyFn },
    /// Remove every stage of exactly `path`
    DeletePath(Bytes),
    /// Remove everything beneath the directory `path`
    DeleteTree(Bytes),
}

impl PathEdit {
    pub fn update(path: impl Into<Bytes>, apply: impl FnMut(&mut IndexEntry) + 'static) -> Self {
        PathEdit::Update {
            path: path.into(),
            apply: Box::new(apply),
        }
    }

    pub fn delete_path(path: impl Into<Bytes>) -> Self {
        PathEdit::DeletePath(path.into())
    }

    /// An empty `path` deletes every entry
    pub fn delete_tree(path: impl Into<Bytes>) -> Self {
        PathEdit::DeleteTree(path.into())
    }

    pub fn path(&self) -> &[u8] {
        match self {
            PathEdit::Update { path, .. }
            | PathEdit::DeletePath(path)
            | PathEdit::DeleteTree(path) => path,
        }
    }

    /// Key the edits are ordered by; directory deletions sort as `path/`
    fn sort_key(&self) -> Vec<u8> {
        let mut key = self.path().to_vec();
        if matches!(self, PathEdit::DeleteTree(_)) && !key.is_empty() {
            key.push(b'/');
        }
        key
    }
}

impl fmt::Debug for PathEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            PathEdit::Update { .. } => "Update",
            PathEdit::DeletePath(_) => "DeletePath",
            PathEdit::DeleteTree(_) => "DeleteTree",
        };
        f.debug_tuple(kind)
            .field(&String::from_utf8_lossy(self.path()))
            .finish()
    }
}

#[derive(Debug)]
pub struct Editor<'i> {
    index: &'i mut Index,
    edits: Vec<PathEdit>,
}

impl<'i> Editor<'i> {
    pub(crate) fn new(index: &'i mut Index) -> Self {
        Editor {
            index,
            edits: Vec::new(),
        }
    }

    pub fn add(&mut self, edit: PathEdit) {
        self.edits.push(edit);
    }

    pub fn edit_count(&self) -> usize {
        self.edits.len()
    }

    /// Apply the queued edits to the index's table
    pub fn finish(mut self) -> IndexResult<()> {
        let entries = self.merge()?;
        self.install(entries);
        Ok(())
    }

    /// Apply, write and commit; with nothing queued the lock is just released
    ///
    /// A rejected edit releases the lock and leaves the table as it was.
    pub fn commit(mut self) -> IndexResult<()> {
        if self.edits.is_empty() {
            tracing::debug!("no index edits queued, releasing lock");
            self.index.unlock();
            return Ok(());
        }

        let entries = match self.merge() {
            Ok(entries) => entries,
            Err(err) => {
                self.index.unlock();
                return Err(err);
            }
        };
        let index = self.install(entries);
        index.write()?;
        index.commit()
    }

    /// The new table with every queued edit applied
    fn merge(&mut self) -> IndexResult<Vec<IndexEntry>> {
        self.edits.sort_by_cached_key(PathEdit::sort_key);

        let current = self.index.entries();
        let mut entries: Vec<IndexEntry> = Vec::with_capacity(current.len() + self.edits.len());
        let mut last = 0;

        for edit in self.edits.iter_mut() {
            let key = edit.sort_key();
            let (position, missing) = match find_from(current, last, &key) {
                Ok(position) => (position, false),
                Err(position) => (position, true),
            };
            entries.extend_from_slice(&current[last..position]);

            match edit {
                PathEdit::DeletePath(_) => {
                    last = if missing {
                        position
                    } else {
                        next_path(current, position)
                    };
                }
                PathEdit::DeleteTree(_) => {
                    let inside = current[position..]
                        .partition_point(|entry| entry.path().starts_with(&key));
                    last = position + inside;
                }
                PathEdit::Update { path, apply } if missing => {
                    last = position;
                    let repeated = entries
                        .iter()
                        .rev()
                        .take_while(|entry| entry.path() == &path[..])
                        .count();
                    if repeated > 0 {
                        // an earlier edit in this pass already produced the path
                        let start = entries.len() - repeated;
                        for entry in &mut entries[start..] {
                            apply(&mut *entry);
                            check_storable(entry)?;
                        }
                        continue;
                    }

                    let mut entry = IndexEntry::new(path.clone(), 0)?;
                    apply(&mut entry);
                    check_storable(&entry)?;
                    entries.push(entry);
                }
                PathEdit::Update { apply, .. } => {
                    last = next_path(current, position);
                    for existing in &current[position..last] {
                        let mut entry = existing.clone();
                        apply(&mut entry);
                        check_storable(&entry)?;
                        entries.push(entry);
                    }
                }
            }
        }
        entries.extend_from_slice(&current[last..]);
        Ok(entries)
    }

    fn install(self, entries: Vec<IndexEntry>) -> &'i mut Index {
        let mut cache_tree = self.index.take_cache_tree();
        if let Some(tree) = cache_tree.as_mut() {
            for edit in &self.edits {
                tree.invalidate(edit.path());
            }
        }

        tracing::debug!(
            edits = self.edits.len(),
            entries = entries.len(),
            "index editor finished"
        );
        self.index.replace(entries, cache_tree);
        self.index
    }
}

fn check_storable(entry: &IndexEntry) -> IndexResult<()> {
    if entry.mode().is_storable() {
        Ok(())
    } else {
        Err(IndexError::InvalidMode {
            mode: entry.raw_mode(),
            path: entry.path_string(),
        })
    }
}

/// Binary search `entries[from..]` for the lowest stage of `path`
fn find_from(entries: &[IndexEntry], from: usize, path: &[u8]) -> Result<usize, usize> {
    let tail = &entries[from..];
    let position = from + tail.partition_point(|entry| entry.path() < path);
    match entries.get(position) {
        Some(entry) if entry.path() == path => Ok(position),
        _ => Err(position),
    }
}

fn next_path(entries: &[IndexEntry], position: usize) -> usize {
    let path = entries[position].path();
    position + entries[position..].partition_point(|entry| entry.path() == path)
}
