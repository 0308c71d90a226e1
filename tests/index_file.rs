use assert_fs::prelude::*;
use bit_index::IndexError;
use bit_index::areas::index::Index;
use bit_index::artifacts::index::editor::PathEdit;
use bit_index::artifacts::index::index_entry::{EntryTime, IndexEntry};
use bit_index::artifacts::index::options::IndexOptions;
use bit_index::artifacts::objects::object::ObjectSource;
use common::{FILE, Repo, entry, oid};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use sha1::{Digest, Sha1};

mod common;

fn summary(index: &Index) -> Vec<(String, u8, u32, u32, EntryTime, String)> {
    index
        .entries()
        .iter()
        .map(|entry| {
            (
                entry.path_string(),
                entry.stage().as_u8(),
                entry.raw_mode(),
                entry.size(),
                entry.mtime(),
                entry.object_id().to_string(),
            )
        })
        .collect()
}

/// Replace the trailing checksum after editing raw index bytes
fn reseal(bytes: &mut Vec<u8>) {
    bytes.truncate(bytes.len() - 20);
    let digest = Sha1::digest(&bytes[..]);
    bytes.extend_from_slice(&digest);
}

fn with_extension(repo: &Repo, tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut bytes = std::fs::read(repo.index_path()).unwrap();
    let trailer_start = bytes.len() - 20;
    let mut extension = tag.to_vec();
    extension.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    extension.extend_from_slice(payload);
    bytes.splice(trailer_start..trailer_start, extension);
    reseal(&mut bytes);
    bytes
}

#[test]
fn written_index_reads_back_identically() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    let mut executable = entry("bin/run", 0, oid(3));
    executable.set_mode(common::EXECUTABLE)?;
    let written = repo.write_index(vec![
        entry("README", 0, oid(1)),
        executable,
        entry("conflict", 1, oid(4)),
        entry("conflict", 2, oid(5)),
        entry("conflict", 3, oid(6)),
        entry("src/lib.rs", 0, oid(7)),
    ]);

    let read = Index::read(repo.index_path())?;

    assert_eq!(summary(&read), summary(&written));
    assert_eq!(read.entry_count(), 6);
    assert!(read.has_unmerged_path());
    assert_eq!(read.get_entry(b"conflict").unwrap().stage().as_u8(), 1);
    Ok(())
}

#[test]
fn rewriting_an_unchanged_index_reproduces_the_file() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    repo.write_index(vec![entry("a", 0, oid(1)), entry("b/c", 0, oid(2))]);
    let original = std::fs::read(repo.index_path())?;

    let mut index = Index::lock(repo.index_path())?;
    index.write()?;
    index.commit()?;

    let rewritten = std::fs::read(repo.index_path())?;
    assert_index_eq!(&rewritten, &original);
    Ok(())
}

#[test]
fn missing_index_file_reads_as_empty() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();

    let mut index = Index::read(repo.index_path())?;

    assert_eq!(index.entry_count(), 0);
    assert!(index.cache_tree(false).is_none());
    Ok(())
}

#[test]
fn checksum_mismatch_is_fatal_and_keeps_previous_state() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    repo.write_index(vec![entry("a", 0, oid(1))]);
    let mut index = Index::read(repo.index_path())?;

    let mut bytes = std::fs::read(repo.index_path())?;
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    std::fs::write(repo.index_path(), &bytes)?;

    let err = index.rehydrate().unwrap_err();
    assert!(matches!(err, IndexError::ChecksumMismatch));
    assert!(err.is_corruption());
    assert_eq!(index.entry_count(), 1);
    assert_eq!(index.entry(0).unwrap().path(), b"a");
    Ok(())
}

#[test]
fn wrong_signature_and_version_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    repo.write_index(vec![entry("a", 0, oid(1))]);
    let original = std::fs::read(repo.index_path())?;

    let mut bytes = original.clone();
    bytes[..4].copy_from_slice(b"DIRX");
    reseal(&mut bytes);
    std::fs::write(repo.index_path(), &bytes)?;
    assert!(matches!(
        Index::read(repo.index_path()),
        Err(IndexError::InvalidSignature(signature)) if &signature == b"DIRX"
    ));

    let mut bytes = original;
    bytes[4..8].copy_from_slice(&3u32.to_be_bytes());
    reseal(&mut bytes);
    std::fs::write(repo.index_path(), &bytes)?;
    assert!(matches!(
        Index::read(repo.index_path()),
        Err(IndexError::UnsupportedVersion(3))
    ));
    Ok(())
}

#[test]
fn truncated_index_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    repo.write_index(vec![entry("a", 0, oid(1))]);
    let bytes = std::fs::read(repo.index_path())?;
    std::fs::write(repo.index_path(), &bytes[..30])?;

    assert!(Index::read(repo.index_path()).unwrap_err().is_corruption());
    Ok(())
}

#[test]
fn unknown_optional_extensions_are_dropped() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    repo.write_index(vec![entry("a", 0, oid(1))]);
    let original = std::fs::read(repo.index_path())?;
    std::fs::write(repo.index_path(), with_extension(&repo, b"UNTR", b"ignored"))?;

    let mut index = Index::lock(repo.index_path())?;
    assert_eq!(index.entry_count(), 1);
    index.write()?;
    index.commit()?;

    let rewritten = std::fs::read(repo.index_path())?;
    assert_index_eq!(&rewritten, &original);
    Ok(())
}

#[test]
fn mandatory_unknown_extension_is_fatal() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    repo.write_index(vec![entry("a", 0, oid(1))]);
    std::fs::write(repo.index_path(), with_extension(&repo, b"link", b"xx"))?;

    assert!(matches!(
        Index::read(repo.index_path()),
        Err(IndexError::UnsupportedExtension(tag)) if tag == "link"
    ));
    Ok(())
}

#[test]
fn second_lock_fails_fast() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();

    let held = Index::lock(repo.index_path())?;
    assert!(held.is_locked());
    assert!(matches!(
        Index::lock(repo.index_path()),
        Err(IndexError::LockHeld(_))
    ));

    drop(held);
    assert!(Index::lock(repo.index_path()).is_ok());
    Ok(())
}

#[test]
fn failed_read_under_lock_releases_it() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    repo.dir.child(".git/index").write_binary(b"garbage that is not an index")?;

    assert!(Index::lock(repo.index_path()).is_err());
    assert!(!repo.dir.child(".git/index.lock").path().exists());
    Ok(())
}

#[test]
fn writing_or_committing_without_lock_fails() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    let mut index = Index::read(repo.index_path())?;

    assert!(matches!(index.write(), Err(IndexError::NotLocked)));
    assert!(matches!(index.commit(), Err(IndexError::NotLocked)));
    assert!(!repo.index_path().exists());
    Ok(())
}

#[test]
fn uncommitted_changes_are_discarded_on_unlock() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    repo.write_index(vec![entry("a", 0, oid(1))]);

    let mut index = Index::lock(repo.index_path())?;
    index.builder().finish()?;
    index.write()?;
    index.unlock();

    assert_eq!(Index::read(repo.index_path())?.entry_count(), 1);
    assert!(!repo.dir.child(".git/index.lock").path().exists());
    Ok(())
}

#[test]
fn commit_by_another_writer_makes_index_outdated() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    repo.write_index(vec![entry("a", 0, oid(1))]);
    let mut index = Index::read(repo.index_path())?;
    assert!(!index.is_outdated());

    repo.write_index(vec![entry("a", 0, oid(1)), entry("b", 0, oid(2))]);

    assert!(index.is_outdated());
    index.rehydrate()?;
    assert!(!index.is_outdated());
    assert_eq!(index.entry_count(), 2);
    Ok(())
}

#[test]
fn racily_clean_entries_are_smudged_on_write() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    let mut racy = entry("racy", 0, oid(1));
    racy.set_mtime(EntryTime::now());
    let old = entry("old", 0, oid(2));

    let written = repo.write_index(vec![old, racy]);
    assert!(written.get_entry(b"racy").unwrap().is_smudged());

    let read = Index::read(repo.index_path())?;
    assert!(read.get_entry(b"racy").unwrap().is_smudged());
    assert_eq!(read.get_entry(b"racy").unwrap().mtime(), EntryTime::SMUDGED);
    assert!(!read.get_entry(b"old").unwrap().is_smudged());
    Ok(())
}

#[test]
fn smudging_can_be_disabled() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    let now = EntryTime::now();
    let mut racy = entry("racy", 0, oid(1));
    racy.set_mtime(now);

    let mut index = Index::new(repo.index_path())
        .with_options(IndexOptions::default().with_smudge_racily_clean(false));
    index.acquire_lock()?;
    let mut builder = index.builder();
    builder.add(racy)?;
    builder.commit()?;

    let read = Index::read(repo.index_path())?;
    assert_eq!(read.get_entry(b"racy").unwrap().mtime(), now);
    Ok(())
}

#[test]
fn cache_tree_is_persisted_with_tree_ids() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    let staged = vec![
        repo.staged("a/b.txt", "b"),
        repo.staged("a/c/d.txt", "d"),
        repo.staged("e.txt", "e"),
    ];
    let mut index = repo.write_index(staged);

    index.acquire_lock()?;
    let root = index.write_tree(&repo.database)?;
    index.write()?;
    index.commit()?;

    let mut read = Index::read(repo.index_path())?;
    let tree = read.cache_tree(false).expect("cache tree should be stored");
    assert_eq!(tree.id(), Some(&root));
    assert_eq!(tree.entry_span(), 3);
    assert_eq!(tree.find(b"a/c").unwrap().entry_span(), 1);
    assert!(tree.find(b"a").unwrap().is_valid());
    assert!(repo.database.open_tree(&root).is_ok());

    // the stored tree expands back into the same table
    let mut rebuilt = Index::new(repo.dir.path().join("rebuilt"));
    let mut builder = rebuilt.builder();
    builder.add_tree(b"", 0, &repo.database, &root)?;
    builder.finish()?;
    let paths: Vec<String> = rebuilt.entries().iter().map(IndexEntry::path_string).collect();
    assert_eq!(paths, vec!["a/b.txt", "a/c/d.txt", "e.txt"]);
    assert_eq!(rebuilt.entries()[2].object_id(), read.entries()[2].object_id());
    Ok(())
}

#[test]
fn write_tree_reuses_clean_subtrees() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    let mut index = repo.write_index(vec![repo.staged("x/one", "1"), repo.staged("y/two", "2")]);
    let first = index.write_tree(&repo.database)?;
    let y_id = *index.cache_tree(false).unwrap().find(b"y").unwrap().id().unwrap();

    let replacement = repo.staged("x/one", "changed").object_id();
    let mut editor = index.editor();
    editor.add(bit_index::artifacts::index::editor::PathEdit::update(
        &b"x/one"[..],
        move |entry: &mut IndexEntry| entry.set_object_id(&replacement),
    ));
    editor.finish()?;

    let tree = index.cache_tree(false).unwrap();
    assert!(!tree.find(b"x").unwrap().is_valid());
    assert_eq!(tree.find(b"y").unwrap().id(), Some(&y_id));

    let second = index.write_tree(&repo.database)?;
    assert_ne!(first, second);
    Ok(())
}

#[test]
fn cache_tree_extension_can_be_left_out() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    repo.write_index(vec![repo.staged("d/f", "f")]);

    let mut index = Index::lock(repo.index_path())?
        .with_options(IndexOptions::default().with_write_cache_tree(false));
    index.write_tree(&repo.database)?;
    index.write()?;
    index.commit()?;

    let mut read = Index::read(repo.index_path())?;
    assert!(read.cache_tree(false).is_none());
    Ok(())
}

#[test]
fn write_tree_refuses_unmerged_entries() {
    let repo = Repo::new();
    let mut index = repo.write_index(vec![entry("c", 1, oid(1)), entry("c", 2, oid(2))]);

    assert!(matches!(
        index.write_tree(&repo.database),
        Err(IndexError::UnmergedPath(path)) if path == "c"
    ));
}

#[test]
fn lookups_find_paths_and_directories() {
    let repo = Repo::new();
    let index = repo.write_index(vec![
        entry("a", 0, oid(1)),
        entry("a.b", 0, oid(2)),
        entry("a/x", 0, oid(3)),
        entry("a/y", 0, oid(4)),
        entry("m", 1, oid(5)),
        entry("m", 3, oid(6)),
        entry("z", 0, oid(7)),
    ]);

    assert_eq!(index.find_entry(b"a/x"), Ok(2));
    assert_eq!(index.find_entry(b"a/w"), Err(2));
    assert_eq!(index.find_entry(b"m"), Ok(4));
    assert_eq!(index.next_entry(4), 6);
    assert_eq!(index.next_entry(0), 1);

    let within: Vec<String> = index
        .entries_within(b"a")
        .iter()
        .map(IndexEntry::path_string)
        .collect();
    assert_eq!(within, vec!["a/x", "a/y"]);
    assert_eq!(index.entries_within(b"").len(), 7);
    assert!(index.entries_within(b"q").is_empty());
    assert_eq!(index.entry(6).unwrap().mode(), FILE);
}

#[test]
fn editor_without_edits_only_releases_the_lock() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    let mut index = Index::lock(repo.index_path())?;

    index.editor().commit()?;

    assert!(!index.is_locked());
    assert!(!repo.index_path().exists());
    Ok(())
}

#[test]
fn deleting_every_entry_empties_the_cache_tree() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    let mut written = repo.write_index(vec![repo.staged("a/x", "x"), repo.staged("b/y", "y")]);
    assert_eq!(written.cache_tree(true).map(|tree| tree.child_count()), Some(2));

    let mut index = Index::lock(repo.index_path())?;
    index.write_tree(&repo.database)?;
    let mut editor = index.editor();
    editor.add(PathEdit::delete_tree(&b""[..]));
    editor.finish()?;

    let tree = index.cache_tree(true).unwrap();
    assert_eq!(tree.child_count(), 0);
    assert_eq!(tree.entry_span(), 0);
    index.write()?;
    index.commit()?;

    let mut read = Index::read(repo.index_path())?;
    assert_eq!(read.entry_count(), 0);
    assert_eq!(read.cache_tree(false).map(|tree| tree.child_count()), Some(0));
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn arbitrary_tables_round_trip(
        paths in proptest::collection::btree_set("[a-z]{1,6}(/[a-z]{1,6}){0,2}", 1..24),
        seed in any::<u8>(),
    ) {
        let repo = Repo::new();
        let entries: Vec<IndexEntry> = paths
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let mut entry = entry(path, 0, oid(seed.wrapping_add(i as u8)));
                entry.set_size(i as u64 * 31);
                entry
            })
            .collect();

        let written = repo.write_index(entries);
        let read = Index::read(repo.index_path()).unwrap();

        prop_assert_eq!(summary(&read), summary(&written));
    }
}

#[test]
fn long_paths_round_trip_through_the_file() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    let paths: Vec<String> = [4094usize, 4095, 4096, 16384]
        .iter()
        .enumerate()
        .map(|(i, length)| format!("{i}/{}", "x".repeat(length - 2)))
        .collect();
    let written = repo.write_index(
        paths
            .iter()
            .enumerate()
            .map(|(i, path)| entry(path, 0, oid(i as u8)))
            .collect(),
    );

    let read = Index::read(repo.index_path())?;

    assert_eq!(summary(&read), summary(&written));
    let lengths: Vec<usize> = read.entries().iter().map(|entry| entry.path().len()).collect();
    assert_eq!(lengths, vec![4094, 4095, 4096, 16384]);
    Ok(())
}
