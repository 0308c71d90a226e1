//! Working directory access
//!
//! The workspace lists directory contents for the working-directory cursor
//! and hashes file content on demand. `.git` is never listed.

use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::index::index_entry::EntryTime;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::IndexResult;
use anyhow::Context;
use bytes::Bytes;
use std::ffi::OsStr;
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const GIT_DIR: &str = ".git";

/// One directory member as seen by the working-directory cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceEntry {
    name: Bytes,
    mode: EntryMode,
    size: u64,
    mtime: EntryTime,
    path: PathBuf,
}

impl WorkspaceEntry {
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn mode(&self) -> EntryMode {
        self.mode
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mtime(&self) -> EntryTime {
        self.mtime
    }

    /// Absolute path of the entry
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open(&self) -> std::io::Result<File> {
        File::open(&self.path)
    }

    /// Id the entry's content would get as a blob; zero for directories
    pub fn content_id(&self) -> IndexResult<ObjectId> {
        match self.mode {
            EntryMode::File(_) => {
                let file = self
                    .open()
                    .with_context(|| format!("Unable to open {}", self.path.display()))?;
                Blob::hash_stream(self.size, file)
            }
            EntryMode::Symlink => {
                let target = std::fs::read_link(&self.path)?;
                Ok(Blob::new(Bytes::from(os_bytes(target.as_os_str()))).object_id())
            }
            _ => Ok(ObjectId::zero()),
        }
    }
}

#[derive(Debug)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Workspace {
            path: path.into().into_boxed_path(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Members of `dir` (relative to the workspace root), in no particular order
    pub fn list_entries(&self, dir: &Path) -> IndexResult<Vec<WorkspaceEntry>> {
        let dir_path = self.path.join(dir);

        let mut entries = Vec::new();
        for entry in WalkDir::new(&dir_path).min_depth(1).max_depth(1) {
            let entry = entry.with_context(|| format!("Unable to list {}", dir_path.display()))?;
            if entry.file_name() == OsStr::new(GIT_DIR) {
                continue;
            }

            let metadata = entry
                .metadata()
                .with_context(|| format!("Unable to stat {}", entry.path().display()))?;
            let file_type = entry.file_type();
            let mode = if file_type.is_symlink() {
                EntryMode::Symlink
            } else if file_type.is_dir() {
                if entry.path().join(GIT_DIR).exists() {
                    EntryMode::Gitlink
                } else {
                    EntryMode::Directory
                }
            } else if is_executable::is_executable(entry.path()) {
                EntryMode::File(FileMode::Executable)
            } else {
                EntryMode::File(FileMode::Regular)
            };

            let size = if file_type.is_dir() { 0 } else { metadata.len() };
            let mtime = metadata
                .modified()
                .map(EntryTime::from)
                .unwrap_or_default();

            entries.push(WorkspaceEntry {
                name: Bytes::from(os_bytes(entry.file_name())),
                mode,
                size,
                mtime,
                path: entry.path().to_path_buf(),
            });
        }

        tracing::trace!(dir = %dir_path.display(), entries = entries.len(), "listed directory");
        Ok(entries)
    }
}

#[cfg(unix)]
fn os_bytes(name: &OsStr) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    name.as_bytes().to_vec()
}

#[cfg(not(unix))]
fn os_bytes(name: &OsStr) -> Vec<u8> {
    name.to_string_lossy().replace('\\', "/").into_bytes()
}
