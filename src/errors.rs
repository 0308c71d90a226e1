//! Error types shared by the index engine and the tree walkers
//!
//! Errors fall into four families:
//!
//! - format/corruption: the bytes on disk are not a valid index
//! - invariant violations: a caller tried to store something the index can never hold
//! - resource: the lock protocol was misused or lost a race
//! - object resolution: the object store could not hand back what a cursor needed
//!
//! All of them are fatal for the operation that raised them; nothing in this
//! crate retries.

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("invalid index signature {0:?}")]
    InvalidSignature([u8; 4]),

    #[error("unsupported index version {0}")]
    UnsupportedVersion(u32),

    #[error("index checksum does not match value stored on disk")]
    ChecksumMismatch,

    #[error("index uses unsupported extension {0:?}")]
    UnsupportedExtension(String),

    #[error("unexpected end-of-file while reading {0}")]
    UnexpectedEof(&'static str),

    #[error("corrupt index: {0}")]
    Corrupt(String),

    #[error("corrupt object: {0}")]
    CorruptObject(String),

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("invalid stage {0}, expected 0..=3")]
    InvalidStage(i32),

    #[error("invalid mode {mode:o} for path {path:?}")]
    InvalidMode { mode: u32, path: String },

    #[error("duplicate stages not allowed for path {path:?} (stage {stage})")]
    DuplicateStage { path: String, stage: u8 },

    #[error("mixed stages not allowed for path {0:?}")]
    MixedStages(String),

    #[error("path {0:?} is unmerged")]
    UnmergedPath(String),

    #[error("unable to lock {0}: lock file already exists")]
    LockHeld(PathBuf),

    #[error("index is not locked")]
    NotLocked,

    #[error("missing object {0}")]
    MissingObject(ObjectId),

    #[error("object {id} is a {actual}, expected a {expected}")]
    IncorrectObjectType {
        id: ObjectId,
        expected: ObjectType,
        actual: ObjectType,
    },

    #[error("{0:?} is not a tree")]
    NotATree(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IndexError {
    pub(crate) fn invalid_path(path: &[u8], reason: &'static str) -> Self {
        IndexError::InvalidPath {
            path: String::from_utf8_lossy(path).into_owned(),
            reason,
        }
    }

    /// True for errors caused by bytes on disk rather than by the caller.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            IndexError::InvalidSignature(_)
                | IndexError::UnsupportedVersion(_)
                | IndexError::ChecksumMismatch
                | IndexError::UnsupportedExtension(_)
                | IndexError::UnexpectedEof(_)
                | IndexError::Corrupt(_)
                | IndexError::CorruptObject(_)
        )
    }
}

pub type IndexResult<T> = Result<T, IndexError>;
