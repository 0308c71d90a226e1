//! Git blob object
//!
//! Blobs store file content in Git. They contain only the raw file data,
//! without any metadata like filename or permissions (those are stored in trees).
//!
//! ## Format
//!
//! Hashed and stored as: `blob <size>\0<content>`

use crate::artifacts::objects::object::Packable;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{IndexError, IndexResult};
use bytes::Bytes;
use derive_new::new;
use sha1::{Digest, Sha1};
use std::io::Read;

const HASH_BUFFER_SIZE: usize = 8 * 1024;

/// Git blob object representing file content
#[derive(Debug, Clone, new)]
pub struct Blob {
    content: Bytes,
}

impl Blob {
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn object_id(&self) -> ObjectId {
        let mut hasher = Sha1::new();
        hasher.update(ObjectType::Blob.header(self.content.len() as u64));
        hasher.update(&self.content);
        ObjectId::from_raw(hasher.finalize().into())
    }

    /// Hash `length` bytes of content read from `reader` the way stored blobs are hashed
    ///
    /// Fails if the stream holds fewer or more bytes than announced, which
    /// happens when a file changes while it is being hashed.
    pub fn hash_stream(length: u64, mut reader: impl Read) -> IndexResult<ObjectId> {
        let mut hasher = Sha1::new();
        hasher.update(ObjectType::Blob.header(length));

        let mut buffer = [0u8; HASH_BUFFER_SIZE];
        let mut remaining = length;
        loop {
            let read = reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            if read as u64 > remaining {
                return Err(IndexError::Corrupt(format!(
                    "content grew past its announced length of {length} bytes"
                )));
            }
            hasher.update(&buffer[..read]);
            remaining -= read as u64;
        }

        if remaining != 0 {
            return Err(IndexError::UnexpectedEof("blob content"));
        }

        Ok(ObjectId::from_raw(hasher.finalize().into()))
    }
}

impl Packable for Blob {
    fn serialize(&self) -> IndexResult<Bytes> {
        let mut blob_bytes = Vec::with_capacity(self.content.len() + 16);
        ObjectType::Blob.write_header(self.content.len() as u64, &mut blob_bytes);
        blob_bytes.extend_from_slice(&self.content);

        Ok(Bytes::from(blob_bytes))
    }
}
