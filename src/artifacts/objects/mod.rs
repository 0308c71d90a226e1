//! Git object types and operations
//!
//! Git stores all content as objects identified by SHA-1 hashes. The index
//! engine only ever deals with two of them directly:
//!
//! - **Blob**: File content (raw bytes), hashed to fill index entries
//! - **Tree**: Directory listing (names, modes, and object IDs), produced from
//!   the cache tree and consumed by the canonical tree cursor
//!
//! Every object is hashed over the loose-object form `<type> <size>\0<content>`.

pub mod blob;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod tree;

/// Length of a SHA-1 hash in raw bytes
pub const OBJECT_ID_LENGTH: usize = 20;

/// Length of a SHA-1 hash in hexadecimal format
pub const OBJECT_ID_HEX_LENGTH: usize = 40;
