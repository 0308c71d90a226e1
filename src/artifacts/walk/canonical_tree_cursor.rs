//! Cursor over a stored tree object

use crate::artifacts::objects::object::ObjectSource;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{self, TreeRecord};
use crate::errors::IndexResult;
use bytes::Bytes;
use std::fmt;

/// Walks the records of one canonical tree body
///
/// The body is decoded once up front; names and ids stay slices of it.
pub struct CanonicalTreeCursor<'a> {
    source: &'a dyn ObjectSource,
    raw: Bytes,
    records: Vec<TreeRecord>,
    position: usize,
}

impl<'a> CanonicalTreeCursor<'a> {
    pub fn new(source: &'a dyn ObjectSource, raw: Bytes) -> IndexResult<Self> {
        let records = tree::parse_records(&raw)?;
        Ok(CanonicalTreeCursor {
            source,
            raw,
            records,
            position: 0,
        })
    }

    /// Load the tree `id` from `source`
    pub fn open(source: &'a dyn ObjectSource, id: &ObjectId) -> IndexResult<Self> {
        let raw = source.open_tree(id)?;
        tracing::trace!(tree = %id, bytes = raw.len(), "opened tree");
        Self::new(source, raw)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn seek(&mut self, position: usize) {
        self.position = position.min(self.records.len());
    }

    pub(crate) fn current(&self) -> Option<(&[u8], u32)> {
        self.records
            .get(self.position)
            .map(|record| (&self.raw[record.name.clone()], record.mode.as_u32()))
    }

    pub(crate) fn object_id(&self) -> IndexResult<ObjectId> {
        match self.records.get(self.position) {
            Some(record) => Ok(ObjectId::from_slice(&self.raw[record.id.clone()])?),
            None => Ok(ObjectId::zero()),
        }
    }

    pub(crate) fn subtree(&self) -> IndexResult<Self> {
        Self::open(self.source, &self.object_id()?)
    }
}

impl fmt::Debug for CanonicalTreeCursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanonicalTreeCursor")
            .field("records", &self.records.len())
            .field("position", &self.position)
            .finish()
    }
}
