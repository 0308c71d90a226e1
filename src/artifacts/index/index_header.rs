use crate::artifacts::index::{HEADER_SIZE, SIGNATURE, VERSION};
use crate::artifacts::objects::object::{Packable, Unpackable};
use crate::errors::{IndexError, IndexResult};
use byteorder::{ByteOrder, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use std::io::Write;

#[derive(Debug, Clone, new)]
pub struct IndexHeader {
    pub(crate) marker: [u8; 4],
    pub(crate) version: u32,
    pub(crate) entries_count: u32,
}

impl IndexHeader {
    pub(crate) fn for_entries(entries_count: u32) -> Self {
        IndexHeader {
            marker: *SIGNATURE,
            version: VERSION,
            entries_count,
        }
    }
}

impl Packable for IndexHeader {
    fn serialize(&self) -> IndexResult<Bytes> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        bytes.write_all(&self.marker)?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.version)?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.entries_count)?;

        Ok(Bytes::from(bytes))
    }
}

impl Unpackable for IndexHeader {
    /// Decode and check the header; signature and version are validated here
    fn deserialize(bytes: Bytes) -> IndexResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(IndexError::UnexpectedEof("index header"));
        }

        let mut marker = [0u8; 4];
        marker.copy_from_slice(&bytes[0..4]);
        if &marker != SIGNATURE {
            return Err(IndexError::InvalidSignature(marker));
        }

        let version = byteorder::NetworkEndian::read_u32(&bytes[4..8]);
        if version != VERSION {
            return Err(IndexError::UnsupportedVersion(version));
        }

        let entries_count = byteorder::NetworkEndian::read_u32(&bytes[8..12]);

        Ok(IndexHeader {
            marker,
            version,
            entries_count,
        })
    }
}
