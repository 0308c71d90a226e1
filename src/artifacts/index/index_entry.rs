//! Index entry representation
//!
//! Each entry in the index represents a tracked file with:
//! - File path
//! - Content hash (object ID)
//! - File metadata (mode, size, timestamps)
//! - Merge stage and the assume-valid bit
//!
//! ## Entry Format
//!
//! ```text
//!  0  ctime seconds      4  ctime nanoseconds
//!  8  mtime seconds     12  mtime nanoseconds
//! 16  dev               20  ino
//! 24  mode              28  uid
//! 32  gid               36  size
//! 40  object id (20 bytes)
//! 60  flags (16 bits)
//! 62  path, NUL padded to a multiple of 8 bytes
//! ```
//!
//! The fixed block is kept in its on-disk form. Entries read from a file
//! share the file's buffer; setters copy the block before changing it.

use crate::artifacts::index::checksum::ChecksumReader;
use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::paths;
use crate::errors::{IndexError, IndexResult};
use bitflags::bitflags;
use byteorder::{ByteOrder, NetworkEndian};
use bytes::Bytes;
use is_executable::IsExecutable;
use std::cmp::Ordering;
use std::fs::Metadata;
use std::io::Write;
use std::os::unix::prelude::MetadataExt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Size of the fixed part of an entry
pub const INFO_LEN: usize = 62;

/// Block size for entry alignment (8 bytes)
pub const ENTRY_BLOCK: usize = 8;

/// Longest path whose length fits the flags word; longer paths are NUL terminated
pub const MAX_PATH_SIZE: usize = 0xfff;

const P_CTIME: usize = 0;
const P_MTIME: usize = 8;
const P_DEV: usize = 16;
const P_INO: usize = 20;
const P_MODE: usize = 24;
const P_UID: usize = 28;
const P_GID: usize = 32;
const P_SIZE: usize = 36;
const P_OBJECT_ID: usize = 40;
const P_FLAGS: usize = 60;

const STAGE_SHIFT: u16 = 12;

bitflags! {
    /// The 16 bit flags word closing the fixed block
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntryFlags: u16 {
        const ASSUME_VALID = 0x8000;
        const EXTENDED = 0x4000;
        const STAGE = 0x3000;
        const NAME_LENGTH = 0x0fff;
    }
}

/// Merge stage of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Stage {
    #[default]
    Merged = 0,
    Base = 1,
    Ours = 2,
    Theirs = 3,
}

impl Stage {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    fn from_flags(flags: u16) -> Self {
        match (flags & EntryFlags::STAGE.bits()) >> STAGE_SHIFT {
            0 => Stage::Merged,
            1 => Stage::Base,
            2 => Stage::Ours,
            _ => Stage::Theirs,
        }
    }
}

impl TryFrom<i32> for Stage {
    type Error = IndexError;

    fn try_from(value: i32) -> IndexResult<Self> {
        match value {
            0 => Ok(Stage::Merged),
            1 => Ok(Stage::Base),
            2 => Ok(Stage::Ours),
            3 => Ok(Stage::Theirs),
            _ => Err(IndexError::InvalidStage(value)),
        }
    }
}

/// Seconds and nanoseconds as stored in the stat block
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntryTime {
    pub secs: u32,
    pub nsecs: u32,
}

impl EntryTime {
    /// Marker stored in the mtime of racily clean entries
    pub const SMUDGED: EntryTime = EntryTime {
        secs: u32::MAX,
        nsecs: 999_999_999,
    };

    pub fn new(secs: u32, nsecs: u32) -> Self {
        EntryTime { secs, nsecs }
    }

    pub fn now() -> Self {
        SystemTime::now().into()
    }
}

impl From<SystemTime> for EntryTime {
    fn from(time: SystemTime) -> Self {
        // times before the epoch cannot be represented and collapse to zero
        let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        EntryTime {
            secs: since_epoch.as_secs() as u32,
            nsecs: since_epoch.subsec_nanos(),
        }
    }
}

/// One staged file record
///
/// Cloning is cheap: both halves are reference counted slices.
#[derive(Clone)]
pub struct IndexEntry {
    info: Bytes,
    path: Bytes,
}

impl IndexEntry {
    /// Create an empty entry for `path` at the given stage
    ///
    /// The mode starts out unset and must be assigned before the entry can
    /// be added to an index.
    pub fn new(path: impl Into<Bytes>, stage: i32) -> IndexResult<Self> {
        let path = path.into();
        paths::validate(&path)?;
        let stage = Stage::try_from(stage)?;

        let mut info = [0u8; INFO_LEN];
        let name_length = path.len().min(MAX_PATH_SIZE) as u16;
        NetworkEndian::write_u16(
            &mut info[P_FLAGS..],
            ((stage.as_u8() as u16) << STAGE_SHIFT) | name_length,
        );

        Ok(IndexEntry {
            info: Bytes::copy_from_slice(&info),
            path,
        })
    }

    /// Decode one entry, consuming its padding
    pub(crate) fn read_from(reader: &mut ChecksumReader) -> IndexResult<Self> {
        let info = reader.read(INFO_LEN, "index entry")?;
        let flags = NetworkEndian::read_u16(&info[P_FLAGS..]);
        if flags & EntryFlags::EXTENDED.bits() != 0 {
            return Err(IndexError::Corrupt(
                "extended entry flags are not valid in a version 2 index".to_string(),
            ));
        }

        let name_length = (flags & EntryFlags::NAME_LENGTH.bits()) as usize;
        let (path, consumed) = if name_length < MAX_PATH_SIZE {
            (reader.read(name_length, "index entry path")?, name_length)
        } else {
            let path = reader.read_until_nul("index entry path")?;
            let consumed = path.len() + 1;
            (path, consumed)
        };
        if path.len() < MAX_PATH_SIZE && name_length == MAX_PATH_SIZE {
            return Err(IndexError::Corrupt(format!(
                "short path {:?} uses the long path encoding",
                String::from_utf8_lossy(&path)
            )));
        }

        let padding = Self::padded_len(path.len()) - INFO_LEN - consumed;
        reader.skip(padding, "index entry padding")?;

        paths::validate(&path).map_err(|err| IndexError::Corrupt(err.to_string()))?;

        Ok(IndexEntry { info, path })
    }

    pub(crate) fn write_to(&self, out: &mut impl Write) -> IndexResult<()> {
        out.write_all(&self.info)?;
        out.write_all(&self.path)?;

        let padding = Self::padded_len(self.path.len()) - INFO_LEN - self.path.len();
        out.write_all(&[0u8; ENTRY_BLOCK][..padding])?;
        Ok(())
    }

    /// On-disk size of an entry whose path has `path_len` bytes
    pub fn padded_len(path_len: usize) -> usize {
        (INFO_LEN + path_len + ENTRY_BLOCK) & !(ENTRY_BLOCK - 1)
    }

    pub fn path(&self) -> &[u8] {
        &self.path
    }

    pub fn path_bytes(&self) -> &Bytes {
        &self.path
    }

    pub fn path_string(&self) -> String {
        String::from_utf8_lossy(&self.path).into_owned()
    }

    /// Last component of the path
    pub fn name(&self) -> &[u8] {
        paths::basename(&self.path)
    }

    fn flags(&self) -> u16 {
        NetworkEndian::read_u16(&self.info[P_FLAGS..])
    }

    pub fn stage(&self) -> Stage {
        Stage::from_flags(self.flags())
    }

    pub fn is_merged(&self) -> bool {
        self.stage() == Stage::Merged
    }

    pub fn raw_mode(&self) -> u32 {
        self.read_u32(P_MODE)
    }

    pub fn mode(&self) -> EntryMode {
        EntryMode::from_bits(self.raw_mode())
    }

    /// Set the mode; only file-like modes may be stored
    pub fn set_mode(&mut self, mode: EntryMode) -> IndexResult<()> {
        if !mode.is_storable() {
            return Err(IndexError::InvalidMode {
                mode: mode.as_u32(),
                path: self.path_string(),
            });
        }
        self.write_u32(P_MODE, mode.as_u32());
        Ok(())
    }

    pub fn size(&self) -> u32 {
        self.read_u32(P_SIZE)
    }

    /// Set the cached length; only the low 32 bits are kept, as git does
    pub fn set_size(&mut self, size: u64) {
        self.write_u32(P_SIZE, size as u32);
    }

    pub fn ctime(&self) -> EntryTime {
        self.read_time(P_CTIME)
    }

    pub fn set_ctime(&mut self, time: EntryTime) {
        self.write_time(P_CTIME, time);
    }

    pub fn mtime(&self) -> EntryTime {
        self.read_time(P_MTIME)
    }

    pub fn set_mtime(&mut self, time: EntryTime) {
        self.write_time(P_MTIME, time);
    }

    pub fn dev(&self) -> u32 {
        self.read_u32(P_DEV)
    }

    pub fn ino(&self) -> u32 {
        self.read_u32(P_INO)
    }

    pub fn uid(&self) -> u32 {
        self.read_u32(P_UID)
    }

    pub fn gid(&self) -> u32 {
        self.read_u32(P_GID)
    }

    pub fn object_id(&self) -> ObjectId {
        let mut raw = [0u8; OBJECT_ID_LENGTH];
        raw.copy_from_slice(&self.info[P_OBJECT_ID..P_OBJECT_ID + OBJECT_ID_LENGTH]);
        ObjectId::from_raw(raw)
    }

    pub fn set_object_id(&mut self, id: &ObjectId) {
        self.update_info(|info| {
            info[P_OBJECT_ID..P_OBJECT_ID + OBJECT_ID_LENGTH].copy_from_slice(id.as_bytes())
        });
    }

    pub fn is_assume_valid(&self) -> bool {
        self.flags() & EntryFlags::ASSUME_VALID.bits() != 0
    }

    pub fn set_assume_valid(&mut self, assume_valid: bool) {
        let flags = EntryFlags::from_bits_retain(self.flags());
        let flags = if assume_valid {
            flags | EntryFlags::ASSUME_VALID
        } else {
            flags - EntryFlags::ASSUME_VALID
        };
        self.update_info(|info| NetworkEndian::write_u16(&mut info[P_FLAGS..], flags.bits()));
    }

    /// Refresh the stat block and mode from filesystem metadata
    ///
    /// `metadata` should come from `symlink_metadata` so links are recorded
    /// as links rather than as their targets.
    pub fn update_stat(&mut self, file_path: &Path, metadata: &Metadata) -> IndexResult<()> {
        let mode = if metadata.file_type().is_symlink() {
            EntryMode::Symlink
        } else if metadata.is_dir() {
            EntryMode::Directory
        } else if file_path.is_executable() {
            EntryMode::File(FileMode::Executable)
        } else {
            EntryMode::File(FileMode::Regular)
        };
        self.set_mode(mode)?;

        self.set_ctime(EntryTime::new(
            metadata.ctime() as u32,
            metadata.ctime_nsec() as u32,
        ));
        self.set_mtime(EntryTime::new(
            metadata.mtime() as u32,
            metadata.mtime_nsec() as u32,
        ));
        self.update_info(|info| {
            NetworkEndian::write_u32(&mut info[P_DEV..], metadata.dev() as u32);
            NetworkEndian::write_u32(&mut info[P_INO..], metadata.ino() as u32);
            NetworkEndian::write_u32(&mut info[P_UID..], metadata.uid());
            NetworkEndian::write_u32(&mut info[P_GID..], metadata.gid());
        });
        self.set_size(metadata.size());
        Ok(())
    }

    /// Copy stat data, mode and id from another entry, keeping path and stage
    pub fn copy_meta_from(&mut self, other: &IndexEntry) {
        let flags = self.flags();
        let mut info = [0u8; INFO_LEN];
        info.copy_from_slice(&other.info);
        let kept = flags & (EntryFlags::STAGE | EntryFlags::NAME_LENGTH).bits();
        let copied = NetworkEndian::read_u16(&info[P_FLAGS..])
            & !(EntryFlags::STAGE | EntryFlags::NAME_LENGTH).bits();
        NetworkEndian::write_u16(&mut info[P_FLAGS..], kept | copied);
        self.info = Bytes::copy_from_slice(&info);
    }

    /// Whether the file may have changed within the same second the index was written
    pub fn is_racily_clean(&self, index_time: EntryTime) -> bool {
        let mtime = self.mtime();
        !self.is_smudged() && mtime.secs >= index_time.secs
    }

    /// Force consumers to re-check content by making the cached mtime unmatchable
    pub fn smudge(&mut self) {
        self.set_mtime(EntryTime::SMUDGED);
    }

    pub fn is_smudged(&self) -> bool {
        self.mtime() == EntryTime::SMUDGED
    }

    /// Index order: path bytes, then stage
    pub fn cmp_index_order(&self, other: &IndexEntry) -> Ordering {
        self.path
            .cmp(&other.path)
            .then_with(|| self.stage().cmp(&other.stage()))
    }

    fn read_u32(&self, offset: usize) -> u32 {
        NetworkEndian::read_u32(&self.info[offset..])
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.update_info(|info| NetworkEndian::write_u32(&mut info[offset..], value));
    }

    fn read_time(&self, offset: usize) -> EntryTime {
        EntryTime::new(self.read_u32(offset), self.read_u32(offset + 4))
    }

    fn write_time(&mut self, offset: usize, time: EntryTime) {
        self.update_info(|info| {
            NetworkEndian::write_u32(&mut info[offset..], time.secs);
            NetworkEndian::write_u32(&mut info[offset + 4..], time.nsecs);
        });
    }

    fn update_info(&mut self, update: impl FnOnce(&mut [u8])) {
        let mut info = [0u8; INFO_LEN];
        info.copy_from_slice(&self.info);
        update(&mut info);
        self.info = Bytes::copy_from_slice(&info);
    }
}

impl std::fmt::Debug for IndexEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexEntry")
            .field("path", &self.path_string())
            .field("stage", &self.stage())
            .field("mode", &format_args!("{:o}", self.raw_mode()))
            .field("size", &self.size())
            .field("mtime", &self.mtime())
            .field("object_id", &self.object_id())
            .finish()
    }
}

/// Entries compare equal when every stored byte matches
impl PartialEq for IndexEntry {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.info == other.info
    }
}

impl Eq for IndexEntry {}
