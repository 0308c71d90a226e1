//! Git index file format
//!
//! The index (also called staging area or cache) stores information about the working tree.
//! It tracks which files should be included in the next commit.
//!
//! ## File Format (Version 2)
//!
//! ```text
//! Header (12 bytes):
//!   - Signature: "DIRC" (4 bytes)
//!   - Version: 2 (4 bytes)
//!   - Entry count (4 bytes)
//!
//! Entries (variable length):
//!   - 62 byte stat/id/flags block followed by the path
//!   - Each entry padded with NULs to 8-byte alignment
//!
//! Extensions (optional, repeated):
//!   - 4 byte tag, 4 byte payload length, payload
//!
//! Checksum (20 bytes):
//!   - SHA-1 hash of all preceding bytes
//! ```

pub mod builder;
pub mod cache_tree;
pub mod checksum;
pub mod editor;
pub mod entry_mode;
pub mod index_entry;
pub mod index_header;
pub mod options;

/// Size of SHA-1 checksum in bytes
pub const CHECKSUM_SIZE: usize = 20;

/// Size of index header in bytes
pub const HEADER_SIZE: usize = 12; // 4 bytes for marker, 4 for version, 4 for entries_count

/// Magic signature identifying index files
pub const SIGNATURE: &[u8; 4] = b"DIRC";

/// Index file format version
pub const VERSION: u32 = 2;

/// Size of an extension header (tag + payload length)
pub const EXTENSION_HEADER_SIZE: usize = 8;

/// Tag of the cache-tree extension
pub const TREE_EXTENSION: &[u8; 4] = b"TREE";
