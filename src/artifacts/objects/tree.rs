//! Git tree object codec
//!
//! Trees represent directory snapshots in Git. They contain entries for files (blobs)
//! and subdirectories (other trees), along with their names and modes.
//!
//! ## Format
//!
//! Body: repeated `<octal mode> <name>\0<20-byte-sha1>`, in canonical
//! (tree) order where a directory name sorts as if it ended with `/`.

use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{IndexError, IndexResult};
use bytes::Bytes;
use std::ops::Range;

/// Assembles the body of a tree object one entry at a time
///
/// Callers must append entries in canonical order; the formatter only encodes.
#[derive(Debug, Default)]
pub struct TreeFormatter {
    buffer: Vec<u8>,
}

impl TreeFormatter {
    pub fn with_capacity(capacity: usize) -> Self {
        TreeFormatter {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, name: &[u8], mode: EntryMode, id: &ObjectId) {
        self.buffer
            .extend_from_slice(format!("{:o} ", mode.as_u32()).as_bytes());
        self.buffer.extend_from_slice(name);
        self.buffer.push(0);
        self.buffer.extend_from_slice(id.as_bytes());
    }

    /// Bytes one entry occupies in a tree body
    pub fn entry_size(name: &[u8], mode: EntryMode) -> usize {
        format!("{:o}", mode.as_u32()).len() + 1 + name.len() + 1 + OBJECT_ID_LENGTH
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buffer)
    }
}

/// One decoded tree record, with ranges pointing back into the raw body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRecord {
    pub mode: EntryMode,
    pub name: Range<usize>,
    pub id: Range<usize>,
}

/// Split a tree body into records, validating the whole body up front
pub fn parse_records(raw: &[u8]) -> IndexResult<Vec<TreeRecord>> {
    let mut records = Vec::new();
    let mut ptr = 0;

    while ptr < raw.len() {
        let space = raw[ptr..]
            .iter()
            .position(|&b| b == b' ')
            .map(|offset| ptr + offset)
            .ok_or(IndexError::UnexpectedEof("tree entry mode"))?;
        let mode = std::str::from_utf8(&raw[ptr..space])
            .map_err(|_| IndexError::Corrupt("non-ASCII tree entry mode".to_string()))
            .and_then(|mode| {
                EntryMode::from_octal_str(mode).map_err(|err| IndexError::Corrupt(err.to_string()))
            })?;

        let name_start = space + 1;
        let nul = raw[name_start..]
            .iter()
            .position(|&b| b == 0)
            .map(|offset| name_start + offset)
            .ok_or(IndexError::UnexpectedEof("tree entry name"))?;
        if nul == name_start {
            return Err(IndexError::Corrupt("empty tree entry name".to_string()));
        }

        let id_start = nul + 1;
        let id_end = id_start + OBJECT_ID_LENGTH;
        if id_end > raw.len() {
            return Err(IndexError::UnexpectedEof("tree entry object id"));
        }

        records.push(TreeRecord {
            mode,
            name: name_start..nul,
            id: id_start..id_end,
        });
        ptr = id_end;
    }

    Ok(records)
}
