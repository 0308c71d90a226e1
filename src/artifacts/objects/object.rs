//! Object-store collaborator contract
//!
//! The index engine never reads or writes pack/loose storage itself. It asks an
//! [`ObjectSource`] for the bytes of a tree it has to expand and hands
//! assembled tree bodies to an [`ObjectWriter`] to obtain their ids.

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{IndexError, IndexResult};
use bytes::Bytes;
use derive_new::new;

pub trait Packable {
    fn serialize(&self) -> IndexResult<Bytes>;
}

pub trait Unpackable {
    fn deserialize(bytes: Bytes) -> IndexResult<Self>
    where
        Self: Sized;
}

/// An object body (header stripped) together with its type
#[derive(Debug, Clone, new)]
pub struct RawObject {
    pub kind: ObjectType,
    pub data: Bytes,
}

pub trait ObjectSource {
    /// Load an object, failing with [`IndexError::MissingObject`] when absent
    fn open_object(&self, id: &ObjectId) -> IndexResult<RawObject>;

    /// Load an object that must be a tree
    fn open_tree(&self, id: &ObjectId) -> IndexResult<Bytes> {
        let object = self.open_object(id)?;
        match object.kind {
            ObjectType::Tree => Ok(object.data),
            actual => Err(IndexError::IncorrectObjectType {
                id: *id,
                expected: ObjectType::Tree,
                actual,
            }),
        }
    }
}

pub trait ObjectWriter {
    /// Store a canonical tree body and return its id
    fn write_tree(&self, content: &[u8]) -> IndexResult<ObjectId>;

    /// Store file content and return its id
    fn write_blob(&self, content: &[u8]) -> IndexResult<ObjectId>;
}

impl<T: ObjectSource + ?Sized> ObjectSource for &T {
    fn open_object(&self, id: &ObjectId) -> IndexResult<RawObject> {
        (**self).open_object(id)
    }
}

impl<T: ObjectWriter + ?Sized> ObjectWriter for &T {
    fn write_tree(&self, content: &[u8]) -> IndexResult<ObjectId> {
        (**self).write_tree(content)
    }

    fn write_blob(&self, content: &[u8]) -> IndexResult<ObjectId> {
        (**self).write_blob(content)
    }
}
