//! Loose object database
//!
//! Objects are stored zlib-compressed under `<objects>/<2 hex>/<38 hex>`,
//! each prefixed with its `<type> <size>\0` header. This is the object store
//! the index writes trees into and the canonical tree cursor reads back from.

use crate::artifacts::objects::object::{ObjectSource, ObjectWriter, RawObject};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::{ObjectHeader, ObjectType};
use crate::errors::{IndexError, IndexResult};
use anyhow::Context;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

static TEMP_COUNTER: AtomicU32 = AtomicU32::new(0);

#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Database {
            path: path.into().into_boxed_path(),
        }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, object_id: &ObjectId) -> bool {
        self.path.join(object_id.to_path()).exists()
    }

    /// Hash `content` as an object of `kind` and store it unless already present
    pub fn store(&self, kind: ObjectType, content: &[u8]) -> IndexResult<ObjectId> {
        let mut data = Vec::with_capacity(content.len() + 32);
        kind.write_header(content.len() as u64, &mut data);
        data.extend_from_slice(content);
        let object_id = ObjectId::from_raw(Sha1::digest(&data).into());

        let object_path = self.path.join(object_id.to_path());
        if !object_path.exists() {
            self.write_object(&object_path, &data)?;
            tracing::trace!(id = %object_id, kind = %kind, "stored object");
        }

        Ok(object_id)
    }

    fn read_object(&self, object_id: &ObjectId) -> IndexResult<Bytes> {
        let object_path = self.path.join(object_id.to_path());
        let compressed = match std::fs::read(&object_path) {
            Ok(compressed) => compressed,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(IndexError::MissingObject(*object_id));
            }
            Err(err) => return Err(err.into()),
        };

        Self::decompress(&compressed)
    }

    fn write_object(&self, object_path: &Path, data: &[u8]) -> IndexResult<()> {
        let object_dir = object_path
            .parent()
            .with_context(|| format!("Invalid object path {}", object_path.display()))?;
        std::fs::create_dir_all(object_dir).with_context(|| {
            format!("Unable to create object directory {}", object_dir.display())
        })?;

        let temp_object_path = object_dir.join(Self::generate_temp_name());
        let compressed = Self::compress(data)?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_object_path)
            .with_context(|| format!("Unable to open object file {}", temp_object_path.display()))?;
        file.write_all(&compressed).with_context(|| {
            format!("Unable to write object file {}", temp_object_path.display())
        })?;
        drop(file);

        // rename the temp file to the object file to make it atomic
        if let Err(err) = std::fs::rename(&temp_object_path, object_path) {
            let _ = std::fs::remove_file(&temp_object_path);
            return Err(err.into());
        }

        Ok(())
    }

    fn compress(data: &[u8]) -> IndexResult<Vec<u8>> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(data)
            .context("Unable to compress object content")?;

        Ok(encoder
            .finish()
            .context("Unable to finish compressing object content")?)
    }

    fn decompress(data: &[u8]) -> IndexResult<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .context("Unable to decompress object content")?;

        Ok(decompressed.into())
    }

    fn generate_temp_name() -> String {
        format!(
            "tmp-obj-{}-{}",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        )
    }
}

impl ObjectSource for Database {
    fn open_object(&self, id: &ObjectId) -> IndexResult<RawObject> {
        let data = self.read_object(id)?;

        let header = ObjectHeader::parse(&data).inspect_err(|err| {
            tracing::warn!(%id, error = %err, "unreadable object header");
        })?;

        Ok(RawObject::new(header.kind, data.slice(header.body_start..)))
    }
}

impl ObjectWriter for Database {
    fn write_tree(&self, content: &[u8]) -> IndexResult<ObjectId> {
        self.store(ObjectType::Tree, content)
    }

    fn write_blob(&self, content: &[u8]) -> IndexResult<ObjectId> {
        self.store(ObjectType::Blob, content)
    }
}
