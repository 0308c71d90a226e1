use assert_fs::prelude::*;
use bit_index::areas::index::Index;
use bit_index::areas::workspace::Workspace;
use bit_index::artifacts::index::editor::PathEdit;
use bit_index::artifacts::index::entry_mode::EntryMode;
use bit_index::artifacts::index::index_entry::IndexEntry;
use bit_index::artifacts::walk::cursor::TreeCursor;
use bit_index::artifacts::walk::filter::{AnyDiffFilter, PathFilter};
use bit_index::artifacts::walk::tree_walk::TreeWalk;
use common::{FILE, Repo};
use filetime::FileTime;
use pretty_assertions::assert_eq;
use rstest::rstest;

mod common;

/// Path, directory flag and which trees took part, for every row
fn rows(walk: &mut TreeWalk<'_>) -> Vec<(String, bool, Vec<bool>)> {
    let mut rows = Vec::new();
    while walk.next().expect("walk failed") {
        let matched = (0..walk.tree_count()).map(|nth| walk.is_matched(nth)).collect();
        rows.push((walk.path_string(), walk.is_subtree(), matched));
    }
    rows
}

fn paths(walk: &mut TreeWalk<'_>) -> Vec<String> {
    rows(walk).into_iter().map(|(path, _, _)| path).collect()
}

#[test]
fn single_tree_is_walked_in_canonical_order() {
    let repo = Repo::new();
    let root = repo.tree(&[("a.c", "1"), ("a/b", "2"), ("a0", "3"), ("b", "4")]);

    let mut walk = TreeWalk::new();
    walk.add_tree(TreeCursor::from_tree(&repo.database, &root).unwrap());
    assert_eq!(paths(&mut walk), vec!["a.c", "a", "a0", "b"]);

    walk.reset();
    walk.set_recursive(true);
    assert_eq!(paths(&mut walk), vec!["a.c", "a/b", "a0", "b"]);
}

#[test]
fn post_order_reports_directories_after_their_children() {
    let repo = Repo::new();
    let root = repo.tree(&[("d/e/f", "1"), ("d/g", "2"), ("h", "3")]);

    let mut walk = TreeWalk::new();
    walk.add_tree(TreeCursor::from_tree(&repo.database, &root).unwrap());
    walk.set_recursive(true);
    walk.set_post_order(true);

    let mut seen = Vec::new();
    while walk.next().unwrap() {
        seen.push((walk.path_string(), walk.is_post_children()));
    }
    assert_eq!(
        seen,
        vec![
            ("d/e/f".to_string(), false),
            ("d/e".to_string(), true),
            ("d/g".to_string(), false),
            ("d".to_string(), true),
            ("h".to_string(), false),
        ]
    );
}

#[test]
fn two_trees_line_up_by_path() {
    let repo = Repo::new();
    let old = repo.tree(&[("kept", "same"), ("changed", "old"), ("removed", "r")]);
    let new = repo.tree(&[("added", "a"), ("changed", "new"), ("kept", "same")]);

    let mut walk = TreeWalk::new();
    walk.add_tree(TreeCursor::from_tree(&repo.database, &old).unwrap());
    walk.add_tree(TreeCursor::from_tree(&repo.database, &new).unwrap());

    let mut seen = Vec::new();
    while walk.next().unwrap() {
        seen.push((
            walk.path_string(),
            walk.file_mode(0),
            walk.file_mode(1),
            walk.id_equal(0, 1).unwrap(),
        ));
    }
    assert_eq!(
        seen,
        vec![
            ("added".to_string(), EntryMode::Missing, FILE, false),
            ("changed".to_string(), FILE, FILE, false),
            ("kept".to_string(), FILE, FILE, true),
            ("removed".to_string(), FILE, EntryMode::Missing, false),
        ]
    );
}

#[test]
fn file_and_directory_of_one_name_merge_in_conflict_walk() {
    let repo = Repo::new();
    let files = repo.tree(&[("a", "file"), ("a.b", "x"), ("a0b", "y")]);
    let dirs = repo.tree(&[("a/b", "inner")]);

    let mut plain = TreeWalk::new();
    plain.add_tree(TreeCursor::from_tree(&repo.database, &files).unwrap());
    plain.add_tree(TreeCursor::from_tree(&repo.database, &dirs).unwrap());
    assert_eq!(
        rows(&mut plain),
        vec![
            ("a".to_string(), false, vec![true, false]),
            ("a.b".to_string(), false, vec![true, false]),
            ("a".to_string(), true, vec![false, true]),
            ("a0b".to_string(), false, vec![true, false]),
        ]
    );

    let mut walk = TreeWalk::with_name_conflicts();
    walk.add_tree(TreeCursor::from_tree(&repo.database, &files).unwrap());
    walk.add_tree(TreeCursor::from_tree(&repo.database, &dirs).unwrap());

    assert!(walk.next().unwrap());
    assert_eq!(walk.path(), b"a");
    assert!(walk.is_directory_file_conflict());
    assert_eq!(walk.file_mode(0), FILE);
    assert_eq!(walk.file_mode(1), EntryMode::Directory);

    walk.enter_subtree().unwrap();
    assert!(walk.is_directory_file_conflict());
    assert_eq!(
        rows(&mut walk),
        vec![
            ("a/b".to_string(), false, vec![false, true]),
            ("a.b".to_string(), false, vec![true, false]),
            ("a0b".to_string(), false, vec![true, false]),
        ]
    );
    assert!(!walk.is_directory_file_conflict());
}

#[test]
fn index_cursor_walks_the_staged_table() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    let mut index = repo.write_index(vec![
        repo.staged("README", "r"),
        repo.staged("src/lib.rs", "l"),
        repo.staged("src/walk/mod.rs", "m"),
        repo.staged("tests/it.rs", "t"),
    ]);
    let head = index.write_tree(&repo.database)?;

    let mut walk = TreeWalk::new();
    walk.add_tree(TreeCursor::from_tree(&repo.database, &head)?);
    walk.add_tree(index.cursor());

    let mut seen = Vec::new();
    while walk.next()? {
        seen.push((walk.path_string(), walk.id_equal(0, 1)?));
    }
    assert_eq!(
        seen,
        vec![
            ("README".to_string(), true),
            ("src".to_string(), true),
            ("tests".to_string(), true),
        ]
    );
    Ok(())
}

#[test]
fn dirty_index_directories_are_still_entered() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    let mut index = repo.write_index(vec![repo.staged("dir/a", "a"), repo.staged("dir/b", "b")]);
    let head = index.write_tree(&repo.database)?;

    let changed = repo.staged("dir/b", "changed").object_id();
    let mut editor = index.editor();
    editor.add(PathEdit::update(&b"dir/b"[..], move |entry: &mut IndexEntry| {
        entry.set_object_id(&changed)
    }));
    editor.finish()?;

    let mut walk = TreeWalk::new();
    walk.add_tree(TreeCursor::from_tree(&repo.database, &head)?);
    walk.add_tree(index.cursor());
    walk.set_recursive(true);
    walk.set_filter(AnyDiffFilter);

    let mut seen = Vec::new();
    while walk.next()? {
        let staged = walk.index_entry(1).map(IndexEntry::path_string);
        seen.push((walk.path_string(), staged));
    }
    assert_eq!(seen, vec![("dir/b".to_string(), Some("dir/b".to_string()))]);
    Ok(())
}

#[test]
fn staged_file_over_committed_directory_conflicts_once() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    let head = repo.tree(&[("a/inner", "i"), ("a-b", "x")]);
    let mut index = repo.write_index(vec![repo.staged("a", "now a file"), repo.staged("a-b", "x")]);

    let mut walk = TreeWalk::with_name_conflicts();
    walk.add_tree(TreeCursor::from_tree(&repo.database, &head)?);
    walk.add_tree(index.cursor());

    assert_eq!(
        rows(&mut walk),
        vec![
            ("a".to_string(), true, vec![true, true]),
            ("a-b".to_string(), false, vec![true, true]),
        ]
    );
    Ok(())
}

#[test]
fn workspace_cursor_lists_files_on_disk() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    let generated = common::write_generated_files(repo.root(), 6);
    repo.dir.child("nested/deep/leaf.txt").write_str("leaf")?;

    let workspace = Workspace::new(repo.root());
    let mut walk = TreeWalk::new();
    walk.add_tree(TreeCursor::workspace(&workspace)?);
    walk.set_recursive(true);

    let mut expected: Vec<String> = generated.iter().map(|(name, _)| name.clone()).collect();
    expected.push("nested/deep/leaf.txt".to_string());
    expected.sort();

    let mut seen = Vec::new();
    while walk.next()? {
        let entry = walk.workspace_entry(0).expect("workspace row");
        seen.push(walk.path_string());
        let generated_file = generated
            .iter()
            .find(|(name, _)| name.as_bytes() == walk.path());
        if let Some((_, content)) = generated_file {
            assert_eq!(entry.size(), content.len() as u64);
            assert_eq!(walk.object_id(0)?, repo.staged("hashed", content).object_id());
        }
    }
    assert_eq!(seen, expected);
    Ok(())
}

#[test]
fn head_index_and_workspace_are_compared_in_one_pass() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    let head = repo.tree(&[
        ("a.txt", "a"),
        ("dir/b.txt", "b"),
        ("dir/c.txt", "c"),
        ("gone.txt", "g"),
    ]);

    let mut index = Index::lock(repo.index_path())?;
    let mut builder = index.builder();
    builder.add_tree(b"", 0, &repo.database, &head)?;
    builder.finish()?;
    let staged_b = repo.staged("dir/b.txt", "b2");
    let staged_new = repo.staged("new.txt", "n");
    let mut editor = index.editor();
    editor.add(PathEdit::update(&b"dir/b.txt"[..], move |entry: &mut IndexEntry| {
        entry.copy_meta_from(&staged_b)
    }));
    editor.add(PathEdit::delete_path(&b"gone.txt"[..]));
    editor.add(PathEdit::update(&b"new.txt"[..], move |entry: &mut IndexEntry| {
        entry.copy_meta_from(&staged_new)
    }));
    editor.commit()?;

    repo.dir.child("a.txt").write_str("a")?;
    repo.dir.child("dir/b.txt").write_str("b2")?;
    repo.dir.child("dir/c.txt").write_str("c, edited")?;
    repo.dir.child("new.txt").write_str("n")?;
    repo.dir.child("untracked.txt").write_str("u")?;

    let workspace = Workspace::new(repo.root());
    let mut walk = TreeWalk::new();
    walk.add_tree(TreeCursor::from_tree(&repo.database, &head)?);
    walk.add_tree(index.cursor());
    walk.add_tree(TreeCursor::workspace(&workspace)?);
    walk.set_recursive(true);
    walk.set_filter(AnyDiffFilter);

    assert_eq!(
        rows(&mut walk),
        vec![
            ("dir/b.txt".to_string(), false, vec![true, true, true]),
            ("dir/c.txt".to_string(), false, vec![true, true, true]),
            ("gone.txt".to_string(), false, vec![true, false, false]),
            ("new.txt".to_string(), false, vec![false, true, true]),
            ("untracked.txt".to_string(), false, vec![false, false, true]),
        ]
    );
    Ok(())
}

#[test]
fn workspace_rows_carry_modification_times() -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repo::new();
    let file = repo.dir.child("stamped");
    file.write_str("x")?;
    filetime::set_file_mtime(file.path(), FileTime::from_unix_time(1_234_567_890, 0))?;

    let workspace = Workspace::new(repo.root());
    let mut walk = TreeWalk::new();
    walk.add_tree(TreeCursor::workspace(&workspace)?);

    assert!(walk.next()?);
    let entry = walk.workspace_entry(0).expect("workspace row");
    assert_eq!(entry.mtime().secs, 1_234_567_890);
    assert_eq!(walk.file_mode(0), FILE);
    assert!(!walk.next()?);
    Ok(())
}

#[rstest]
#[case("src", vec!["src/lib.rs", "src/walk/mod.rs"])]
#[case("src/walk", vec!["src/walk/mod.rs"])]
#[case("src/walk/", vec!["src/walk/mod.rs"])]
#[case("README", vec!["README"])]
#[case("sr", vec![])]
fn path_filter_limits_the_walk(#[case] filter: &'static str, #[case] expected: Vec<&str>) {
    let repo = Repo::new();
    let root = repo.tree(&[
        ("README", "r"),
        ("src.rs", "s"),
        ("src/lib.rs", "l"),
        ("src/walk/mod.rs", "m"),
    ]);

    let mut walk = TreeWalk::new();
    walk.add_tree(TreeCursor::from_tree(&repo.database, &root).unwrap());
    walk.set_recursive(true);
    walk.set_filter(PathFilter::new(filter.as_bytes()));

    assert_eq!(paths(&mut walk), expected);
}
