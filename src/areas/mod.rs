//! Components that own files on disk
//!
//! - `index`: the staging area file and its lock protocol
//! - `lockfile`: exclusive `<file>.lock` create-then-rename guard
//! - `database`: loose object store used to read and write trees
//! - `workspace`: working directory listing and content hashing

pub mod database;
pub mod index;
pub mod lockfile;
pub mod workspace;
