//! Path syntax and canonical ordering
//!
//! Index and tree paths are raw byte strings separated by `/`. Git orders
//! tree entries as if every directory name carried a trailing `/`, so a
//! file `a` sorts before `a.b` while a directory `a` sorts after it.

use crate::artifacts::index::entry_mode::EntryMode;
use crate::errors::{IndexError, IndexResult};
use anyhow::anyhow;
use regex::bytes::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

/// Path components an index entry may never contain
const RESERVED_COMPONENT_REGEX: &str = r"(?i-u)^(\.|\.\.|\.git)$";

static RESERVED_COMPONENT: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(RESERVED_COMPONENT_REGEX));

/// Check that a path may be stored in the index
///
/// Rejects empty paths, leading or trailing `/`, empty components, NUL bytes
/// and the components `.`, `..` and `.git`.
pub fn validate(path: &[u8]) -> IndexResult<()> {
    if path.is_empty() {
        return Err(IndexError::invalid_path(path, "empty path"));
    }
    if path.contains(&0) {
        return Err(IndexError::invalid_path(path, "contains a NUL byte"));
    }
    if path[0] == b'/' {
        return Err(IndexError::invalid_path(path, "absolute path"));
    }
    if path[path.len() - 1] == b'/' {
        return Err(IndexError::invalid_path(path, "trailing slash"));
    }

    let reserved = RESERVED_COMPONENT
        .as_ref()
        .map_err(|err| IndexError::Other(anyhow!(err.clone())))?;
    for component in path.split(|&b| b == b'/') {
        if component.is_empty() {
            return Err(IndexError::invalid_path(path, "empty path component"));
        }
        if reserved.is_match(component) {
            return Err(IndexError::invalid_path(path, "reserved path component"));
        }
    }

    Ok(())
}

/// Byte a name is implicitly terminated with when ordering
pub fn last_path_char(mode: EntryMode) -> u8 {
    if mode.is_tree() { b'/' } else { b'\0' }
}

/// Canonical comparison of two names or paths, each qualified by its mode
pub fn compare(a: &[u8], a_mode: EntryMode, b: &[u8], b_mode: EntryMode) -> Ordering {
    compare_with_terminators(a, last_path_char(a_mode), b, last_path_char(b_mode))
}

/// Canonical comparison given the implicit terminator byte of each side
pub fn compare_with_terminators(a: &[u8], a_last: u8, b: &[u8], b_last: u8) -> Ordering {
    let common = a.len().min(b.len());
    match a[..common].cmp(&b[..common]) {
        Ordering::Equal => {}
        unequal => return unequal,
    }

    let a_next = a.get(common).copied().unwrap_or(a_last);
    let b_next = b.get(common).copied().unwrap_or(b_last);
    match a_next.cmp(&b_next) {
        Ordering::Equal if a.len() == b.len() => a_last.cmp(&b_last),
        Ordering::Equal if a.len() < b.len() => a_last.cmp(&b[common]).then(Ordering::Less),
        Ordering::Equal => a[common].cmp(&b_last).then(Ordering::Greater),
        unequal => unequal,
    }
}

/// The last component of a path
pub fn basename(path: &[u8]) -> &[u8] {
    match path.iter().rposition(|&b| b == b'/') {
        Some(slash) => &path[slash + 1..],
        None => path,
    }
}
