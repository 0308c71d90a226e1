//! Exclusive `<file>.lock` guard
//!
//! Acquiring creates `<target>.lock` with `O_EXCL`; the new content is
//! written there and renamed over the target on commit. Dropping an
//! uncommitted guard deletes the lock file and leaves the target alone.

use crate::errors::{IndexError, IndexResult};
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct LockFile {
    target: PathBuf,
    lock_path: PathBuf,
    file: Option<File>,
}

impl LockFile {
    /// Take the lock for `target`, failing fast if someone else holds it
    pub fn acquire(target: &Path) -> IndexResult<Self> {
        let mut lock_name = target.as_os_str().to_owned();
        lock_name.push(".lock");
        let lock_path = PathBuf::from(lock_name);

        let file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(IndexError::LockHeld(lock_path));
            }
            Err(err) => return Err(err.into()),
        };

        tracing::debug!(lock = %lock_path.display(), "acquired lock");
        Ok(LockFile {
            target: target.to_path_buf(),
            lock_path,
            file: Some(file),
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Truncate the lock file and hand out a writer for the new content
    pub fn rewrite(&mut self) -> IndexResult<&mut File> {
        let file = self.file.as_mut().ok_or(IndexError::NotLocked)?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        Ok(file)
    }

    /// Flush and rename the lock file over the target
    pub fn commit(mut self) -> IndexResult<()> {
        let mut file = self.file.take().ok_or(IndexError::NotLocked)?;
        file.flush()?;
        file.sync_all()?;
        drop(file);

        if let Err(err) = std::fs::rename(&self.lock_path, &self.target) {
            self.remove();
            return Err(err.into());
        }

        tracing::debug!(path = %self.target.display(), "committed lock");
        Ok(())
    }

    fn remove(&mut self) {
        self.file = None;
        match std::fs::remove_file(&self.lock_path) {
            Ok(()) => tracing::debug!(lock = %self.lock_path.display(), "released lock"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => tracing::warn!(
                lock = %self.lock_path.display(),
                error = %err,
                "unable to remove lock file"
            ),
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if self.file.is_some() {
            self.remove();
        }
    }
}
