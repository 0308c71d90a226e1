//! Git object identifier (SHA-1 hash)
//!
//! Object IDs are 20-byte SHA-1 digests. They are stored raw inside index
//! entries and tree objects and shown as 40 hexadecimal characters.
//!
//! ## Storage
//!
//! Loose objects live in `.git/objects/<first-2-hex>/<remaining-38-hex>`

use crate::artifacts::objects::{OBJECT_ID_HEX_LENGTH, OBJECT_ID_LENGTH};
use anyhow::anyhow;
use std::io;
use std::path::PathBuf;

/// Git object identifier (SHA-1 hash)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId([u8; OBJECT_ID_LENGTH]);

impl ObjectId {
    /// The all-zero id, used for "no object" (missing rows, dirty trees)
    pub const fn zero() -> Self {
        ObjectId([0; OBJECT_ID_LENGTH])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; OBJECT_ID_LENGTH]
    }

    pub const fn from_raw(raw: [u8; OBJECT_ID_LENGTH]) -> Self {
        ObjectId(raw)
    }

    /// Copy an id out of a raw buffer; `raw` must hold at least 20 bytes
    pub fn from_slice(raw: &[u8]) -> anyhow::Result<Self> {
        let bytes: [u8; OBJECT_ID_LENGTH] = raw
            .get(..OBJECT_ID_LENGTH)
            .and_then(|slice| slice.try_into().ok())
            .ok_or_else(|| anyhow!("Invalid object ID length: {}", raw.len()))?;
        Ok(ObjectId(bytes))
    }

    /// Parse and validate an object ID from its 40-character hex form
    pub fn try_parse(id: impl AsRef<str>) -> anyhow::Result<Self> {
        let id = id.as_ref();
        if id.len() != OBJECT_ID_HEX_LENGTH {
            return Err(anyhow!("Invalid object ID length: {}", id.len()));
        }
        if !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(anyhow!("Invalid object ID characters: {}", id));
        }

        let mut raw = [0u8; OBJECT_ID_LENGTH];
        for (i, byte) in raw.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&id[i * 2..i * 2 + 2], 16)?;
        }
        Ok(ObjectId(raw))
    }

    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_LENGTH] {
        &self.0
    }

    /// Write the object ID in binary format (20 bytes)
    pub fn write_raw_to<W: io::Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.0)
    }

    /// Read an object ID from binary format (20 bytes)
    pub fn read_raw_from<R: io::Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let mut raw = [0u8; OBJECT_ID_LENGTH];
        reader.read_exact(&mut raw)?;
        Ok(ObjectId(raw))
    }

    /// Convert to file system path for loose object storage
    ///
    /// `abc123...` becomes `ab/c123...`
    pub fn to_path(&self) -> PathBuf {
        let hex = self.to_string();
        let (dir, file) = hex.split_at(2);
        PathBuf::from(dir).join(file)
    }

    /// First 7 characters of the hash (standard Git abbreviation)
    pub fn to_short_oid(&self) -> String {
        let mut hex = self.to_string();
        hex.truncate(7);
        hex
    }
}

impl AsRef<[u8]> for ObjectId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({self})")
    }
}
