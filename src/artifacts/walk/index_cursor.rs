//! Cursor over the index table
//!
//! The index only stores leaves. Directory rows are synthesized per level:
//! a run of entries sharing `<name>/` collapses into one row whose size and
//! id come from the matching cache-tree node.

use crate::artifacts::index::cache_tree::CacheTree;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object_id::ObjectId;

#[derive(Debug, Clone, Copy)]
enum IndexRow<'a> {
    Entry(usize),
    Tree {
        start: usize,
        span: usize,
        name_end: usize,
        node: Option<&'a CacheTree>,
    },
}

#[derive(Debug)]
pub struct IndexCursor<'a> {
    entries: &'a [IndexEntry],
    rows: Vec<IndexRow<'a>>,
    position: usize,
    path_offset: usize,
}

impl<'a> IndexCursor<'a> {
    /// Cursor over the top level; `tree` should have been validated against `entries`
    pub fn new(entries: &'a [IndexEntry], tree: &'a CacheTree) -> Self {
        Self::level(entries, 0, entries.len(), 0, Some(tree))
    }

    fn level(
        entries: &'a [IndexEntry],
        start: usize,
        end: usize,
        path_offset: usize,
        node: Option<&'a CacheTree>,
    ) -> Self {
        let children = node.map(CacheTree::children).unwrap_or(&[]);
        let mut next_child = 0;
        let mut rows = Vec::new();

        let mut ptr = start;
        while ptr < end {
            let path = entries[ptr].path();
            let Some(slash) = path[path_offset..].iter().position(|&b| b == b'/') else {
                rows.push(IndexRow::Entry(ptr));
                ptr += 1;
                continue;
            };

            let name_end = path_offset + slash;
            let name = &path[path_offset..name_end];
            let found = children[next_child..]
                .iter()
                .position(|child| child.name() == name && child.entry_span() > 0);
            let child = match found {
                Some(offset) => {
                    next_child += offset + 1;
                    Some(&children[next_child - 1])
                }
                None => None,
            };

            let span = match child {
                Some(child) if ptr + child.span() <= end => child.span(),
                _ => entries[ptr..end]
                    .iter()
                    .take_while(|entry| {
                        let other = entry.path();
                        other.len() > name_end
                            && other[..name_end] == path[..name_end]
                            && other[name_end] == b'/'
                    })
                    .count(),
            };

            rows.push(IndexRow::Tree {
                start: ptr,
                span,
                name_end,
                node: child,
            });
            ptr += span;
        }

        IndexCursor {
            entries,
            rows,
            position: 0,
            path_offset,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn seek(&mut self, position: usize) {
        self.position = position.min(self.rows.len());
    }

    pub(crate) fn current(&self) -> Option<(&'a [u8], u32)> {
        let entries = self.entries;
        match self.rows.get(self.position)? {
            IndexRow::Entry(ptr) => {
                let entry = &entries[*ptr];
                Some((&entry.path()[self.path_offset..], entry.raw_mode()))
            }
            IndexRow::Tree {
                start, name_end, ..
            } => Some((
                &entries[*start].path()[self.path_offset..*name_end],
                EntryMode::Directory.as_u32(),
            )),
        }
    }

    pub(crate) fn object_id(&self) -> ObjectId {
        match self.rows.get(self.position) {
            Some(IndexRow::Entry(ptr)) => self.entries[*ptr].object_id(),
            Some(IndexRow::Tree { node, .. }) => node
                .and_then(CacheTree::id)
                .copied()
                .unwrap_or_else(ObjectId::zero),
            None => ObjectId::zero(),
        }
    }

    /// Directory rows only carry an id while their cache-tree node is clean
    pub(crate) fn has_id(&self) -> bool {
        match self.rows.get(self.position) {
            Some(IndexRow::Entry(_)) => true,
            Some(IndexRow::Tree { node, .. }) => node.is_some_and(|node| node.id().is_some()),
            None => false,
        }
    }

    pub(crate) fn index_entry(&self) -> Option<&'a IndexEntry> {
        match self.rows.get(self.position)? {
            IndexRow::Entry(ptr) => self.entries.get(*ptr),
            IndexRow::Tree { .. } => None,
        }
    }

    pub(crate) fn subtree(&self) -> Option<Self> {
        match self.rows.get(self.position)? {
            IndexRow::Entry(_) => None,
            IndexRow::Tree {
                start,
                span,
                name_end,
                node,
            } => Some(Self::level(
                self.entries,
                *start,
                start + span,
                name_end + 1,
                *node,
            )),
        }
    }
}
