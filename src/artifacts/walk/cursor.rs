//! Positionable cursor over one hierarchical source
//!
//! A [`TreeCursor`] sits on one level of a tree and exposes the current
//! entry's path, mode and id. The three concrete sources are dispatched
//! through [`CursorKind`]; an `Empty` cursor stands in for a tree that has
//! nothing at a directory the walk entered.
//!
//! ## Path buffer
//!
//! A cursor keeps the full path of its current entry in one buffer: the
//! parent directory's path plus `/` up to `path_offset`, the entry name
//! after it. Entering a subtree moves the buffer into the child cursor,
//! which only ever writes past its own offset; leaving it moves the buffer
//! back. A parent is therefore never read while one of its subtrees is
//! active.

use crate::areas::workspace::{Workspace, WorkspaceEntry};
use crate::artifacts::index::cache_tree::CacheTree;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object::ObjectSource;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::paths;
use crate::artifacts::walk::canonical_tree_cursor::CanonicalTreeCursor;
use crate::artifacts::walk::index_cursor::IndexCursor;
use crate::artifacts::walk::workspace_cursor::WorkspaceCursor;
use crate::errors::{IndexError, IndexResult};
use bytes::Bytes;
use std::cmp::Ordering;

#[derive(Debug)]
pub enum CursorKind<'a> {
    Canonical(CanonicalTreeCursor<'a>),
    Index(IndexCursor<'a>),
    Workspace(WorkspaceCursor<'a>),
    Empty,
}

impl<'a> CursorKind<'a> {
    fn len(&self) -> usize {
        match self {
            CursorKind::Canonical(cursor) => cursor.len(),
            CursorKind::Index(cursor) => cursor.len(),
            CursorKind::Workspace(cursor) => cursor.len(),
            CursorKind::Empty => 0,
        }
    }

    fn position(&self) -> usize {
        match self {
            CursorKind::Canonical(cursor) => cursor.position(),
            CursorKind::Index(cursor) => cursor.position(),
            CursorKind::Workspace(cursor) => cursor.position(),
            CursorKind::Empty => 0,
        }
    }

    fn seek(&mut self, position: usize) {
        match self {
            CursorKind::Canonical(cursor) => cursor.seek(position),
            CursorKind::Index(cursor) => cursor.seek(position),
            CursorKind::Workspace(cursor) => cursor.seek(position),
            CursorKind::Empty => {}
        }
    }

    fn current(&self) -> Option<(&[u8], u32)> {
        match self {
            CursorKind::Canonical(cursor) => cursor.current(),
            CursorKind::Index(cursor) => cursor.current(),
            CursorKind::Workspace(cursor) => cursor.current(),
            CursorKind::Empty => None,
        }
    }
}

#[derive(Debug)]
pub struct TreeCursor<'a> {
    kind: CursorKind<'a>,
    path: Vec<u8>,
    path_offset: usize,
    path_len: usize,
    mode: u32,
}

impl<'a> TreeCursor<'a> {
    fn root(kind: CursorKind<'a>) -> Self {
        let mut cursor = TreeCursor {
            kind,
            path: Vec::new(),
            path_offset: 0,
            path_len: 0,
            mode: 0,
        };
        cursor.load();
        cursor
    }

    /// Cursor over the stored tree `id`
    pub fn from_tree(source: &'a dyn ObjectSource, id: &ObjectId) -> IndexResult<Self> {
        Ok(Self::root(CursorKind::Canonical(CanonicalTreeCursor::open(
            source, id,
        )?)))
    }

    /// Cursor over an already loaded tree body
    pub fn canonical(source: &'a dyn ObjectSource, raw: Bytes) -> IndexResult<Self> {
        Ok(Self::root(CursorKind::Canonical(CanonicalTreeCursor::new(
            source, raw,
        )?)))
    }

    /// Cursor over an index table; see [`crate::areas::index::Index::cursor`]
    pub fn index(entries: &'a [IndexEntry], tree: &'a CacheTree) -> Self {
        Self::root(CursorKind::Index(IndexCursor::new(entries, tree)))
    }

    pub fn workspace(workspace: &'a Workspace) -> IndexResult<Self> {
        Ok(Self::root(CursorKind::Workspace(WorkspaceCursor::new(
            workspace,
        )?)))
    }

    pub fn empty() -> Self {
        Self::root(CursorKind::Empty)
    }

    pub fn kind(&self) -> &CursorKind<'a> {
        &self.kind
    }

    /// Copy the current entry's name into the path buffer
    fn load(&mut self) {
        self.path.truncate(self.path_offset);
        match self.kind.current() {
            Some((name, mode)) => {
                self.path.extend_from_slice(name);
                self.mode = mode;
            }
            None => self.mode = 0,
        }
        self.path_len = self.path.len();
    }

    pub fn first(&self) -> bool {
        self.kind.position() == 0
    }

    pub fn eof(&self) -> bool {
        self.kind.position() >= self.kind.len()
    }

    /// Move forward `n` entries, stopping at the end
    pub fn next(&mut self, n: usize) {
        let position = self.kind.position().saturating_add(n);
        self.kind.seek(position);
        self.load();
    }

    /// Move back `n` entries, stopping at the first
    pub fn back(&mut self, n: usize) {
        let position = self.kind.position().saturating_sub(n);
        self.kind.seek(position);
        self.load();
    }

    /// Skip the current entry, including everything beneath it
    pub fn skip(&mut self) {
        self.next(1);
    }

    pub fn reset(&mut self) {
        self.kind.seek(0);
        self.load();
    }

    /// Full path of the current entry
    pub fn path(&self) -> &[u8] {
        self.path.get(..self.path_len).unwrap_or_default()
    }

    pub fn name(&self) -> &[u8] {
        self.path
            .get(self.path_offset..self.path_len)
            .unwrap_or_default()
    }

    /// Mode bits of the current entry, `0` at the end
    pub fn raw_mode(&self) -> u32 {
        self.mode
    }

    pub fn entry_mode(&self) -> EntryMode {
        EntryMode::from_bits(self.mode)
    }

    pub fn is_tree(&self) -> bool {
        self.entry_mode().is_tree()
    }

    pub fn is_gitlink(&self) -> bool {
        self.entry_mode().is_gitlink()
    }

    /// Whether an id can be produced for the current entry
    pub fn has_id(&self) -> bool {
        if self.eof() {
            return false;
        }
        match &self.kind {
            CursorKind::Canonical(_) => true,
            CursorKind::Index(cursor) => cursor.has_id(),
            CursorKind::Workspace(cursor) => cursor.has_id(),
            CursorKind::Empty => false,
        }
    }

    /// Id of the current entry; the zero id when none is known
    pub fn object_id(&self) -> IndexResult<ObjectId> {
        match &self.kind {
            CursorKind::Canonical(cursor) => cursor.object_id(),
            CursorKind::Index(cursor) => Ok(cursor.object_id()),
            CursorKind::Workspace(cursor) => cursor.object_id(),
            CursorKind::Empty => Ok(ObjectId::zero()),
        }
    }

    pub fn id_equal(&self, other: &TreeCursor<'_>) -> IndexResult<bool> {
        Ok(self.has_id() && other.has_id() && self.object_id()? == other.object_id()?)
    }

    /// The index row under an index cursor, if it is a file row
    pub fn index_entry(&self) -> Option<&'a IndexEntry> {
        match &self.kind {
            CursorKind::Index(cursor) => cursor.index_entry(),
            _ => None,
        }
    }

    pub fn workspace_entry(&self) -> Option<&WorkspaceEntry> {
        match &self.kind {
            CursorKind::Workspace(cursor) => cursor.entry(),
            _ => None,
        }
    }

    /// Canonical comparison of the current paths of two cursors
    pub fn path_compare(&self, other: &TreeCursor<'_>) -> Ordering {
        self.path_compare_as(other, other.mode)
    }

    /// Compare against `other`'s path as if it had `other_mode`
    pub fn path_compare_as(&self, other: &TreeCursor<'_>, other_mode: u32) -> Ordering {
        paths::compare_with_terminators(
            self.path(),
            last_path_char(self.mode),
            other.path(),
            last_path_char(other_mode),
        )
    }

    /// Source for a cursor over the current directory entry
    pub(crate) fn subtree_kind(&self) -> IndexResult<CursorKind<'a>> {
        let not_a_tree = || IndexError::NotATree(String::from_utf8_lossy(self.path()).into_owned());
        if !self.is_tree() {
            return Err(not_a_tree());
        }

        match &self.kind {
            CursorKind::Canonical(cursor) => Ok(CursorKind::Canonical(cursor.subtree()?)),
            CursorKind::Index(cursor) => cursor
                .subtree()
                .map(CursorKind::Index)
                .ok_or_else(not_a_tree),
            CursorKind::Workspace(cursor) => cursor
                .subtree()?
                .map(CursorKind::Workspace)
                .ok_or_else(not_a_tree),
            CursorKind::Empty => Err(not_a_tree()),
        }
    }

    /// Hand the path buffer to a child cursor over `kind`
    pub(crate) fn descend(&mut self, kind: CursorKind<'a>) -> TreeCursor<'a> {
        let mut path = std::mem::take(&mut self.path);
        path.truncate(self.path_len);
        path.push(b'/');

        let mut child = TreeCursor {
            kind,
            path,
            path_offset: self.path_len + 1,
            path_len: 0,
            mode: 0,
        };
        child.load();
        child
    }

    /// Take the path buffer back from a child created by [`Self::descend`]
    pub fn ascend(&mut self, child: TreeCursor<'a>) {
        self.path = child.path;
        self.path.truncate(self.path_len);
    }

    /// Cursor over the current directory entry, sharing this cursor's path buffer
    ///
    /// This cursor must not be used again until the child is handed back
    /// through [`Self::ascend`].
    pub fn create_subtree(&mut self) -> IndexResult<TreeCursor<'a>> {
        let kind = self.subtree_kind()?;
        Ok(self.descend(kind))
    }
}

fn last_path_char(mode: u32) -> u8 {
    paths::last_path_char(EntryMode::from_bits(mode))
}
