//! Object kinds and the loose-object header
//!
//! Every stored object is hashed and stored as `<kind> <size>\0<content>`.

use crate::errors::{IndexError, IndexResult};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Blob,
    Tree,
    Commit,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Blob => "blob",
            ObjectType::Tree => "tree",
            ObjectType::Commit => "commit",
        }
    }

    /// Append the header that precedes `content_length` bytes of content
    pub fn write_header(&self, content_length: u64, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_str().as_bytes());
        out.push(b' ');
        out.extend_from_slice(content_length.to_string().as_bytes());
        out.push(b'\0');
    }

    pub fn header(&self, content_length: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        self.write_header(content_length, &mut out);
        out
    }
}

impl FromStr for ObjectType {
    type Err = IndexError;

    fn from_str(value: &str) -> IndexResult<Self> {
        match value {
            "blob" => Ok(ObjectType::Blob),
            "tree" => Ok(ObjectType::Tree),
            "commit" => Ok(ObjectType::Commit),
            _ => Err(IndexError::CorruptObject(format!(
                "unknown object type {value:?}"
            ))),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parsed `<kind> <size>\0` prefix of a decompressed object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    pub kind: ObjectType,
    pub size: u64,
    /// Offset of the first content byte
    pub body_start: usize,
}

impl ObjectHeader {
    /// Parse the header at the start of `data`
    ///
    /// The announced size must match the number of bytes that follow it.
    pub fn parse(data: &[u8]) -> IndexResult<Self> {
        let space = data
            .iter()
            .position(|&b| b == b' ')
            .ok_or(IndexError::UnexpectedEof("object type"))?;
        let nul = data[space + 1..]
            .iter()
            .position(|&b| b == b'\0')
            .map(|length| space + 1 + length)
            .ok_or(IndexError::UnexpectedEof("object size"))?;

        let kind = std::str::from_utf8(&data[..space])
            .map_err(|_| IndexError::CorruptObject("object type is not utf-8".to_string()))?
            .parse::<ObjectType>()?;

        let raw_size = &data[space + 1..nul];
        let size = Some(raw_size)
            .filter(|raw| !raw.is_empty() && raw.iter().all(u8::is_ascii_digit))
            .and_then(|raw| std::str::from_utf8(raw).ok())
            .and_then(|text| text.parse::<u64>().ok())
            .ok_or_else(|| {
                IndexError::CorruptObject(format!(
                    "invalid object size {:?}",
                    String::from_utf8_lossy(raw_size)
                ))
            })?;

        let body_start = nul + 1;
        let actual = (data.len() - body_start) as u64;
        if actual != size {
            return Err(IndexError::CorruptObject(format!(
                "{kind} announces {size} bytes but holds {actual}"
            )));
        }

        Ok(ObjectHeader {
            kind,
            size,
            body_start,
        })
    }
}
