//! Index and tree data structures and algorithms
//!
//! - `index`: entry codec, cache tree, builder and editor
//! - `objects`: object ids and the blob/tree encodings the index relies on
//! - `paths`: path validation and Git's canonical path ordering
//! - `walk`: tree cursors, the n-way tree walk and its filters

pub mod index;
pub mod objects;
pub mod paths;
pub mod walk;
