//! Running SHA-1 over the index file
//!
//! Every byte read or written before the trailer passes through the digest,
//! so the trailer covers the header, all entries and all extensions.

use crate::artifacts::index::CHECKSUM_SIZE;
use crate::errors::{IndexError, IndexResult};
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::io::Write;

/// Hashing cursor over the complete contents of an index file
///
/// Reads hand out zero-copy slices of the underlying buffer, which is what
/// lets entries share one backing allocation.
#[derive(Debug)]
pub struct ChecksumReader {
    data: Bytes,
    pos: usize,
    digest: Sha1,
}

impl ChecksumReader {
    pub fn new(data: Bytes) -> Self {
        ChecksumReader {
            data,
            pos: 0,
            digest: Sha1::new(),
        }
    }

    /// Bytes left before the trailing checksum
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos + CHECKSUM_SIZE)
    }

    pub fn read(&mut self, size: usize, what: &'static str) -> IndexResult<Bytes> {
        if size > self.remaining() {
            return Err(IndexError::UnexpectedEof(what));
        }

        let chunk = self.data.slice(self.pos..self.pos + size);
        self.digest.update(&chunk);
        self.pos += size;
        Ok(chunk)
    }

    /// Read up to a NUL byte; the NUL is consumed but not returned
    pub fn read_until_nul(&mut self, what: &'static str) -> IndexResult<Bytes> {
        let limit = self.pos + self.remaining();
        let length = self.data[self.pos..limit]
            .iter()
            .position(|&b| b == 0)
            .ok_or(IndexError::UnexpectedEof(what))?;

        let chunk = self.read(length, what)?;
        self.read(1, what)?;
        Ok(chunk)
    }

    pub fn skip(&mut self, size: usize, what: &'static str) -> IndexResult<()> {
        self.read(size, what).map(|_| ())
    }

    /// Compare the trailer with the digest of everything consumed so far
    ///
    /// All bytes before the trailer must have been consumed.
    pub fn verify(self) -> IndexResult<()> {
        if self.remaining() != 0 || self.data.len() < self.pos + CHECKSUM_SIZE {
            return Err(IndexError::UnexpectedEof("index checksum"));
        }

        let expected = &self.data[self.pos..self.pos + CHECKSUM_SIZE];
        let actual = self.digest.finalize();
        if expected != actual.as_slice() {
            return Err(IndexError::ChecksumMismatch);
        }

        Ok(())
    }
}

/// Hashing writer that appends the digest on [`ChecksumWriter::finish`]
#[derive(Debug)]
pub struct ChecksumWriter<W: Write> {
    out: W,
    digest: Sha1,
}

impl<W: Write> ChecksumWriter<W> {
    pub fn new(out: W) -> Self {
        ChecksumWriter {
            out,
            digest: Sha1::new(),
        }
    }

    pub fn write(&mut self, data: &[u8]) -> IndexResult<()> {
        self.out.write_all(data)?;
        self.digest.update(data);
        Ok(())
    }

    pub fn finish(mut self) -> IndexResult<W> {
        let checksum = self.digest.finalize();
        self.out.write_all(checksum.as_slice())?;
        self.out.flush()?;
        Ok(self.out)
    }
}
