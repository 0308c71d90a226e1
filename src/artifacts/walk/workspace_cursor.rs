//! Cursor over a working directory

use crate::areas::workspace::{Workspace, WorkspaceEntry};
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::paths;
use crate::errors::IndexResult;
use std::cell::Cell;
use std::path::{Path, PathBuf};

/// Lists one directory, sorted canonically
///
/// Content ids are computed only when asked for, and the last one is kept
/// until the cursor moves.
#[derive(Debug)]
pub struct WorkspaceCursor<'a> {
    workspace: &'a Workspace,
    directory: PathBuf,
    entries: Vec<WorkspaceEntry>,
    position: usize,
    content_id: Cell<Option<(usize, ObjectId)>>,
}

impl<'a> WorkspaceCursor<'a> {
    pub fn new(workspace: &'a Workspace) -> IndexResult<Self> {
        Self::at(workspace, PathBuf::new())
    }

    fn at(workspace: &'a Workspace, directory: PathBuf) -> IndexResult<Self> {
        let mut entries = workspace.list_entries(&directory)?;
        entries.sort_by(|a, b| paths::compare(a.name(), a.mode(), b.name(), b.mode()));

        Ok(WorkspaceCursor {
            workspace,
            directory,
            entries,
            position: 0,
            content_id: Cell::new(None),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn seek(&mut self, position: usize) {
        self.position = position.min(self.entries.len());
    }

    pub(crate) fn current(&self) -> Option<(&[u8], u32)> {
        self.entries
            .get(self.position)
            .map(|entry| (entry.name(), entry.mode().as_u32()))
    }

    pub(crate) fn entry(&self) -> Option<&WorkspaceEntry> {
        self.entries.get(self.position)
    }

    pub(crate) fn has_id(&self) -> bool {
        self.entry().is_some_and(|entry| {
            matches!(entry.mode(), EntryMode::File(_) | EntryMode::Symlink)
        })
    }

    pub(crate) fn object_id(&self) -> IndexResult<ObjectId> {
        if let Some((position, id)) = self.content_id.get()
            && position == self.position
        {
            return Ok(id);
        }

        let id = match self.entry() {
            Some(entry) => entry.content_id()?,
            None => ObjectId::zero(),
        };
        self.content_id.set(Some((self.position, id)));
        Ok(id)
    }

    pub(crate) fn subtree(&self) -> IndexResult<Option<Self>> {
        let Some(entry) = self.entry().filter(|entry| entry.mode().is_tree()) else {
            return Ok(None);
        };
        let Some(name) = entry.path().file_name() else {
            return Ok(None);
        };
        Self::at(self.workspace, self.directory.join(name)).map(Some)
    }
}
