#![allow(dead_code)]

use assert_fs::TempDir;
use assert_fs::prelude::*;
use bit_index::areas::database::Database;
use bit_index::areas::index::Index;
use bit_index::artifacts::index::entry_mode::{EntryMode, FileMode};
use bit_index::artifacts::index::index_entry::{EntryTime, IndexEntry};
use bit_index::artifacts::objects::object::ObjectWriter;
use bit_index::artifacts::objects::object_id::ObjectId;
use bytes::Bytes;
use fake::Fake;
use fake::faker::lorem::en::{Word, Words};
use std::path::{Path, PathBuf};

pub const FILE: EntryMode = EntryMode::File(FileMode::Regular);
pub const EXECUTABLE: EntryMode = EntryMode::File(FileMode::Executable);

/// A scratch repository: working directory, `.git/index` and a loose object store
pub struct Repo {
    pub dir: TempDir,
    pub database: Database,
}

impl Repo {
    pub fn new() -> Self {
        init_tracing();
        let dir = TempDir::new().expect("Failed to create temp dir");
        dir.child(".git/objects")
            .create_dir_all()
            .expect("Failed to create object directory");
        let database = Database::new(dir.path().join(".git/objects"));
        Repo { dir, database }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.path().join(".git/index")
    }

    /// Lock the index, replace its table with `entries` and commit
    pub fn write_index(&self, entries: Vec<IndexEntry>) -> Index {
        let mut index = Index::lock(self.index_path()).expect("Failed to lock index");
        let mut builder = index.builder();
        for entry in entries {
            builder.add(entry).expect("Failed to add entry");
        }
        builder.commit().expect("Failed to commit index");
        index
    }

    /// Store `content` as a blob and return an entry pointing at it
    pub fn staged(&self, path: &str, content: &str) -> IndexEntry {
        let id = self
            .database
            .write_blob(content.as_bytes())
            .expect("Failed to write blob");
        let mut entry = entry(path, 0, id);
        entry.set_size(content.len() as u64);
        entry
    }

    /// Store every file plus the trees above them and return the root tree id
    pub fn tree(&self, files: &[(&str, &str)]) -> ObjectId {
        let mut scratch = Index::new(self.dir.path().join(".git/scratch-index"));
        let mut builder = scratch.builder();
        for (path, content) in files {
            builder
                .add(self.staged(path, content))
                .expect("Failed to add entry");
        }
        builder.finish().expect("Failed to build index");
        scratch
            .write_tree(&self.database)
            .expect("Failed to write tree")
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn oid(byte: u8) -> ObjectId {
    ObjectId::from_raw([byte; 20])
}

/// A regular-file entry with a fixed timestamp far in the past
pub fn entry(path: &str, stage: i32, id: ObjectId) -> IndexEntry {
    let mut entry = IndexEntry::new(Bytes::copy_from_slice(path.as_bytes()), stage)
        .unwrap_or_else(|e| panic!("Invalid entry {path:?}: {e}"));
    entry.set_mode(FILE).expect("Failed to set mode");
    entry.set_object_id(&id);
    entry.set_mtime(EntryTime::new(1_000_000, 42));
    entry.set_ctime(EntryTime::new(1_000_000, 7));
    entry
}

/// Write `count` files with random names and contents into `dir`
pub fn write_generated_files(dir: &Path, count: usize) -> Vec<(String, String)> {
    let mut files: Vec<(String, String)> = Vec::new();
    while files.len() < count {
        let name = format!("{}.txt", Word().fake::<String>());
        if files.iter().any(|(existing, _)| *existing == name) {
            continue;
        }
        let content = Words(5..10).fake::<Vec<String>>().join(" ");
        std::fs::write(dir.join(&name), &content)
            .unwrap_or_else(|e| panic!("Failed to write file {name:?}: {e}"));
        files.push((name, content));
    }
    files.sort();
    files
}

// Helper function to create hexdump representation
pub fn to_hexdump(data: &[u8]) -> String {
    let mut result = String::new();
    for (i, chunk) in data.chunks(16).enumerate() {
        result.push_str(&format!("{:08x}: ", i * 16));

        for (j, byte) in chunk.iter().enumerate() {
            if j == 8 {
                result.push(' ');
            }
            result.push_str(&format!("{:02x} ", byte));
        }

        for j in chunk.len()..16 {
            if j == 8 {
                result.push(' ');
            }
            result.push_str("   ");
        }

        result.push_str(" |");
        for byte in chunk {
            if byte.is_ascii_graphic() {
                result.push(*byte as char);
            } else {
                result.push('.');
            }
        }
        result.push_str("|\n");
    }
    result
}

// Macro to compare two index files with hexdump output on failure
#[macro_export]
macro_rules! assert_index_eq {
    ($actual:expr, $expected:expr) => {
        if $actual != $expected {
            pretty_assertions::assert_eq!(
                common::to_hexdump($actual),
                common::to_hexdump($expected),
                "\n=== INDEX CONTENTS DIFFER ===\nactual ({} bytes) vs expected ({} bytes)",
                $actual.len(),
                $expected.len()
            );
        }
    };
}
