//! Git index (staging area)
//!
//! The index is Git's staging area that tracks which files should be included in the next commit.
//! It maintains metadata about files including their mode, timestamps, and SHA-1 hashes.
//!
//! ## Index File Format
//!
//! The index file contains:
//! - Header: Signature, version, and entry count
//! - Entries: Sorted list of tracked files with metadata
//! - Extensions: optional blocks, of which only the cache tree is understood
//! - Checksum: SHA-1 hash of the entire index for integrity verification
//!
//! ## Updates
//!
//! The table is only ever replaced as a whole, by a [`Builder`] or an
//! [`Editor`]. Writing requires holding the `index.lock` file; the new
//! content goes to the lock file and becomes visible on [`Index::commit`].

use crate::areas::lockfile::LockFile;
use crate::artifacts::index::builder::Builder;
use crate::artifacts::index::cache_tree::CacheTree;
use crate::artifacts::index::checksum::{ChecksumReader, ChecksumWriter};
use crate::artifacts::index::editor::Editor;
use crate::artifacts::index::index_entry::{EntryTime, IndexEntry};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::options::IndexOptions;
use crate::artifacts::index::{EXTENSION_HEADER_SIZE, HEADER_SIZE, TREE_EXTENSION};
use crate::artifacts::objects::object::{ObjectWriter, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::walk::cursor::TreeCursor;
use crate::errors::{IndexError, IndexResult};
use byteorder::{ByteOrder, NetworkEndian};
use bytes::Bytes;
use std::cmp::Ordering;
use std::io::{BufWriter, Read, Write};
use std::ops::DerefMut;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Size and modification time of the index file when it was last read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileSnapshot {
    len: u64,
    modified: Option<SystemTime>,
}

impl FileSnapshot {
    fn of(path: &Path) -> Option<Self> {
        let metadata = std::fs::metadata(path).ok()?;
        Some(FileSnapshot {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

/// Git index (staging area)
///
/// Holds the sorted entry table, the optional cache tree and, while an
/// update is in progress, the lock on the backing file.
#[derive(Debug)]
pub struct Index {
    /// Path to the index file (typically `.git/index`)
    path: PathBuf,
    entries: Vec<IndexEntry>,
    cache_tree: Option<CacheTree>,
    lock: Option<LockFile>,
    snapshot: Option<FileSnapshot>,
    options: IndexOptions,
}

impl Index {
    /// Create a new empty index backed by `path`; nothing is read
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Index {
            path: path.into(),
            entries: Vec::new(),
            cache_tree: None,
            lock: None,
            snapshot: None,
            options: IndexOptions::default(),
        }
    }

    pub fn with_options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    /// Read the index at `path`; a missing file reads as an empty index
    pub fn read(path: impl Into<PathBuf>) -> IndexResult<Self> {
        let mut index = Index::new(path);
        index.rehydrate()?;
        Ok(index)
    }

    /// Lock the index at `path` and read it
    ///
    /// The lock is released again if reading fails.
    pub fn lock(path: impl Into<PathBuf>) -> IndexResult<Self> {
        let mut index = Index::new(path);
        index.acquire_lock()?;
        index.rehydrate()?;
        Ok(index)
    }

    /// Get the path to the index file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> IndexOptions {
        self.options
    }

    /// Take the `index.lock` file; holding it already is not an error
    pub fn acquire_lock(&mut self) -> IndexResult<()> {
        if self.lock.is_none() {
            self.lock = Some(LockFile::acquire(&self.path)?);
        }
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    /// Release the lock, discarding anything written but not committed
    pub fn unlock(&mut self) {
        self.lock = None;
    }

    /// Drop every entry and the cache tree
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cache_tree = None;
    }

    /// Load the index from disk
    ///
    /// Reads the index file, parses the header, entries and extensions, and
    /// verifies the checksum. A missing or empty file clears the index. On
    /// failure the in-memory state is left as it was.
    ///
    /// # Locking
    ///
    /// Acquires a shared lock on the index file during reading.
    pub fn rehydrate(&mut self) -> IndexResult<()> {
        let Some((data, snapshot)) = self.load()? else {
            tracing::debug!(path = %self.path.display(), "no index file, starting empty");
            self.clear();
            self.snapshot = None;
            return Ok(());
        };

        let (entries, cache_tree) = if data.is_empty() {
            (Vec::new(), None)
        } else {
            Self::parse(data)?
        };

        tracing::debug!(
            path = %self.path.display(),
            entries = entries.len(),
            cache_tree = cache_tree.is_some(),
            "read index"
        );
        self.entries = entries;
        self.cache_tree = cache_tree;
        self.snapshot = Some(snapshot);
        Ok(())
    }

    /// True if the file on disk changed since it was last read or committed
    pub fn is_outdated(&self) -> bool {
        FileSnapshot::of(&self.path) != self.snapshot
    }

    fn load(&self) -> IndexResult<Option<(Bytes, FileSnapshot)>> {
        let mut index_file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut lock = file_guard::lock(&mut index_file, file_guard::Lock::Shared, 0, 1)?;

        let metadata = lock.deref_mut().metadata()?;
        let snapshot = FileSnapshot {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        };

        let mut data = Vec::with_capacity(metadata.len() as usize);
        lock.deref_mut().read_to_end(&mut data)?;
        Ok(Some((Bytes::from(data), snapshot)))
    }

    fn parse(data: Bytes) -> IndexResult<(Vec<IndexEntry>, Option<CacheTree>)> {
        let mut reader = ChecksumReader::new(data);
        let header = IndexHeader::deserialize(reader.read(HEADER_SIZE, "index header")?)?;

        let entries = Self::parse_entries(header.entries_count, &mut reader)?;
        let cache_tree = Self::parse_extensions(&mut reader)?;

        reader.verify()?;
        Ok((entries, cache_tree))
    }

    /// Parse all entries, each padded to 8-byte alignment
    fn parse_entries(count: u32, reader: &mut ChecksumReader) -> IndexResult<Vec<IndexEntry>> {
        // every entry takes at least one block past its fixed part
        let plausible = reader.remaining() / IndexEntry::padded_len(0);
        let mut entries: Vec<IndexEntry> = Vec::with_capacity((count as usize).min(plausible));

        for _ in 0..count {
            let entry = IndexEntry::read_from(reader)?;
            if let Some(previous) = entries.last() {
                check_order(previous, &entry)?;
            }
            entries.push(entry);
        }

        Ok(entries)
    }

    fn parse_extensions(reader: &mut ChecksumReader) -> IndexResult<Option<CacheTree>> {
        let mut cache_tree = None;

        while reader.remaining() > 0 {
            let header = reader.read(EXTENSION_HEADER_SIZE, "extension header")?;
            let mut tag = [0u8; 4];
            tag.copy_from_slice(&header[..4]);
            let length = NetworkEndian::read_u32(&header[4..8]) as usize;
            let payload = reader.read(length, "extension payload")?;

            if &tag == TREE_EXTENSION {
                cache_tree = Some(CacheTree::read_extension(&payload)?);
            } else if tag[0].is_ascii_uppercase() {
                tracing::debug!(
                    extension = %String::from_utf8_lossy(&tag),
                    length,
                    "skipping optional index extension"
                );
            } else {
                return Err(IndexError::UnsupportedExtension(
                    String::from_utf8_lossy(&tag).into_owned(),
                ));
            }
        }

        Ok(cache_tree)
    }

    /// Write the full current state into the held lock file
    ///
    /// Fails with [`IndexError::NotLocked`] without a lock. Any other
    /// failure releases the lock.
    pub fn write(&mut self) -> IndexResult<()> {
        if self.lock.is_none() {
            return Err(IndexError::NotLocked);
        }

        let result = self.write_locked();
        if let Err(err) = &result {
            tracing::warn!(path = %self.path.display(), error = %err, "index write failed");
            self.unlock();
        }
        result
    }

    fn write_locked(&mut self) -> IndexResult<()> {
        let write_time = self.options.smudge_racily_clean.then(EntryTime::now);
        let lock = self.lock.as_mut().ok_or(IndexError::NotLocked)?;
        let mut writer = ChecksumWriter::new(BufWriter::new(lock.rewrite()?));

        let header = IndexHeader::for_entries(self.entries.len() as u32);
        writer.write(&header.serialize()?)?;
        let smudged = write_entries(&self.entries, &mut writer, write_time)?;

        if self.options.write_cache_tree
            && let Some(tree) = &self.cache_tree
        {
            let mut payload = Vec::new();
            tree.write_extension(&mut payload)?;

            let mut extension_header = [0u8; EXTENSION_HEADER_SIZE];
            extension_header[..4].copy_from_slice(TREE_EXTENSION);
            NetworkEndian::write_u32(&mut extension_header[4..], payload.len() as u32);
            writer.write(&extension_header)?;
            writer.write(&payload)?;
        }

        writer
            .finish()?
            .into_inner()
            .map_err(|err| IndexError::Io(err.into_error()))?;

        // the table only changes once the file holds the same rows
        for &position in &smudged {
            self.entries[position].smudge();
        }
        if !smudged.is_empty() {
            tracing::debug!(smudged = smudged.len(), "smudged racily clean entries");
        }

        tracing::debug!(
            path = %self.path.display(),
            entries = self.entries.len(),
            "wrote index to lock file"
        );
        Ok(())
    }

    /// Publish the written lock file as the new index and release the lock
    pub fn commit(&mut self) -> IndexResult<()> {
        let lock = self.lock.take().ok_or(IndexError::NotLocked)?;
        lock.commit()?;
        self.snapshot = FileSnapshot::of(&self.path);
        Ok(())
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn entry(&self, position: usize) -> Option<&IndexEntry> {
        self.entries.get(position)
    }

    /// Lowest-stage entry of `path`
    pub fn get_entry(&self, path: &[u8]) -> Option<&IndexEntry> {
        self.find_entry(path).ok().map(|position| &self.entries[position])
    }

    /// Locate `path`, ignoring stage
    ///
    /// `Ok` holds the position of the lowest stage present, `Err` the position
    /// where the path would be inserted.
    pub fn find_entry(&self, path: &[u8]) -> Result<usize, usize> {
        let position = self.entries.partition_point(|entry| entry.path() < path);
        match self.entries.get(position) {
            Some(entry) if entry.path() == path => Ok(position),
            _ => Err(position),
        }
    }

    /// Position of the first entry after every stage of the entry at `position`
    pub fn next_entry(&self, position: usize) -> usize {
        let Some(current) = self.entries.get(position) else {
            return self.entries.len();
        };
        let path = current.path();
        position + self.entries[position..].partition_point(|entry| entry.path() == path)
    }

    /// The contiguous run of entries inside `directory` (everything when empty)
    pub fn entries_within(&self, directory: &[u8]) -> &[IndexEntry] {
        if directory.is_empty() {
            return &self.entries;
        }

        let mut prefix = directory.to_vec();
        prefix.push(b'/');
        let start = self.entries.partition_point(|entry| entry.path() < &prefix[..]);
        let length =
            self.entries[start..].partition_point(|entry| entry.path().starts_with(&prefix));
        &self.entries[start..start + length]
    }

    pub fn has_unmerged_path(&self) -> bool {
        self.entries.iter().any(|entry| !entry.is_merged())
    }

    pub fn builder(&mut self) -> Builder<'_> {
        Builder::new(self)
    }

    pub fn editor(&mut self) -> Editor<'_> {
        Editor::new(self)
    }

    /// The cache tree, created and validated first when `build` is set
    pub fn cache_tree(&mut self, build: bool) -> Option<&CacheTree> {
        if build {
            self.validate_cache_tree();
        }
        self.cache_tree.as_ref()
    }

    fn validate_cache_tree(&mut self) {
        let tree = self.cache_tree.get_or_insert_with(CacheTree::new_root);
        tree.validate(&self.entries, 0, 0);
    }

    /// Cursor over the table with directory rows synthesized from the cache tree
    pub fn cursor(&mut self) -> TreeCursor<'_> {
        let tree = self.cache_tree.get_or_insert_with(CacheTree::new_root);
        tree.validate(&self.entries, 0, 0);
        TreeCursor::index(&self.entries, tree)
    }

    /// Write tree objects for every dirty directory and return the root id
    pub fn write_tree(&mut self, writer: &dyn ObjectWriter) -> IndexResult<ObjectId> {
        if let Some(entry) = self.entries.iter().find(|entry| !entry.is_merged()) {
            return Err(IndexError::UnmergedPath(entry.path_string()));
        }

        let tree = self.cache_tree.get_or_insert_with(CacheTree::new_root);
        tree.validate(&self.entries, 0, 0);
        tree.write_tree(&self.entries, 0, 0, writer)
    }

    pub(crate) fn replace(&mut self, entries: Vec<IndexEntry>, cache_tree: Option<CacheTree>) {
        self.entries = entries;
        self.cache_tree = cache_tree;
    }

    pub(crate) fn take_cache_tree(&mut self) -> Option<CacheTree> {
        self.cache_tree.take()
    }
}

/// Encode every row, smudging racily clean ones in the encoded copy only
///
/// Returns the positions of the rows that were smudged.
fn write_entries<W: Write>(
    entries: &[IndexEntry],
    writer: &mut ChecksumWriter<W>,
    write_time: Option<EntryTime>,
) -> IndexResult<Vec<usize>> {
    let mut smudged = Vec::new();
    let mut encoded = Vec::new();
    for (position, entry) in entries.iter().enumerate() {
        encoded.clear();
        match write_time {
            Some(time) if entry.is_racily_clean(time) => {
                let mut copy = entry.clone();
                copy.smudge();
                copy.write_to(&mut encoded)?;
                smudged.push(position);
            }
            _ => entry.write_to(&mut encoded)?,
        }
        writer.write(&encoded)?;
    }
    Ok(smudged)
}

fn check_order(previous: &IndexEntry, next: &IndexEntry) -> IndexResult<()> {
    if previous.cmp_index_order(next) != Ordering::Less {
        return Err(IndexError::Corrupt(format!(
            "entries out of order at {:?}",
            next.path_string()
        )));
    }
    if previous.path() == next.path() && previous.is_merged() {
        return Err(IndexError::Corrupt(format!(
            "merged entry {:?} has further stages",
            next.path_string()
        )));
    }
    Ok(())
}
