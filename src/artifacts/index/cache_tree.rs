//! Cache tree (`TREE` extension)
//!
//! A cache tree mirrors the directory structure of the index. Every node
//! remembers how many index rows live beneath it and, while clean, the id of
//! the tree object those rows hash to. Writing a tree for the whole index
//! then only has to hash the directories touched since the last write.
//!
//! ## Extension format
//!
//! ```text
//! <name> NUL <entry span> SP <child count> LF [<20 byte tree id>] <children...>
//! ```
//!
//! The span is `-1` for a dirty node, which then carries no id.

use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::artifacts::objects::object::ObjectWriter;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::TreeFormatter;
use crate::artifacts::paths;
use crate::errors::{IndexError, IndexResult};
use bytes::Bytes;
use std::cmp::Ordering;
use std::io::Write;

/// One directory level of the cache tree
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheTree {
    name: Bytes,
    id: Option<ObjectId>,
    entry_span: i32,
    children: Vec<CacheTree>,
}

impl CacheTree {
    /// An empty, dirty root node
    pub fn new_root() -> Self {
        CacheTree::dirty(Bytes::new())
    }

    fn dirty(name: Bytes) -> Self {
        CacheTree {
            name,
            id: None,
            entry_span: -1,
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Tree id, present only while the node is clean
    pub fn id(&self) -> Option<&ObjectId> {
        self.id.as_ref()
    }

    /// Rows beneath this node, or `-1` when the node is dirty
    pub fn entry_span(&self) -> i32 {
        self.entry_span
    }

    pub(crate) fn span(&self) -> usize {
        self.entry_span.max(0) as usize
    }

    pub fn is_valid(&self) -> bool {
        self.id.is_some()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn child(&self, index: usize) -> Option<&CacheTree> {
        self.children.get(index)
    }

    pub fn children(&self) -> &[CacheTree] {
        &self.children
    }

    /// Look up a node by directory path (no trailing slash); empty finds the root
    pub fn find(&self, path: &[u8]) -> Option<&CacheTree> {
        if path.is_empty() {
            return Some(self);
        }

        let (head, rest) = match path.iter().position(|&b| b == b'/') {
            Some(slash) => (&path[..slash], &path[slash + 1..]),
            None => (path, &path[path.len()..]),
        };
        self.children
            .iter()
            .find(|child| child.name() == head)
            .and_then(|child| child.find(rest))
    }

    /// Mark this node and every node along `path` dirty
    ///
    /// `path` may name a file or a directory; sibling subtrees stay clean.
    pub fn invalidate(&mut self, path: &[u8]) {
        self.id = None;
        self.entry_span = -1;

        let Some(slash) = path.iter().position(|&b| b == b'/') else {
            if let Some(child) = self.children.iter_mut().find(|child| child.name() == path) {
                child.id = None;
                child.entry_span = -1;
            }
            return;
        };

        let (head, rest) = (&path[..slash], &path[slash + 1..]);
        if let Some(child) = self.children.iter_mut().find(|child| child.name() == head) {
            child.invalidate(rest);
        }
    }

    /// True if `path`, relative to this node's parent, lies inside this node
    pub(crate) fn contains(&self, path: &[u8]) -> bool {
        path.len() > self.name.len()
            && path.starts_with(&self.name)
            && path[self.name.len()] == b'/'
    }

    /// Recompute spans for the rows `entries[start..]` under `path_offset`
    ///
    /// Nodes that still have a span are trusted without looking at their
    /// rows, so repeating a validation costs nothing.
    pub fn validate(&mut self, entries: &[IndexEntry], start: usize, path_offset: usize) {
        if self.entry_span >= 0 && start + self.span() <= entries.len() {
            return;
        }

        self.entry_span = 0;
        if start >= entries.len() {
            self.children.clear();
            return;
        }

        let first_path = entries[start].path();
        let mut index = start;
        let mut child_index = 0;
        while index < entries.len() {
            let current = entries[index].path();
            if path_offset > 0 && current.get(..path_offset) != first_path.get(..path_offset) {
                // the row belongs to a later sibling of this node
                break;
            }

            let rest = &current[path_offset..];
            let order = match self.children.get(child_index) {
                Some(child) => compare_to_child(rest, child.name()),
                None => Ordering::Less,
            };

            match order {
                Ordering::Greater => {
                    self.children.remove(child_index);
                    continue;
                }
                Ordering::Less => match rest.iter().position(|&b| b == b'/') {
                    None => {
                        index += 1;
                        self.entry_span += 1;
                        continue;
                    }
                    Some(slash) => {
                        let name = entries[index]
                            .path_bytes()
                            .slice(path_offset..path_offset + slash);
                        self.children.insert(child_index, CacheTree::dirty(name));
                    }
                },
                Ordering::Equal => {}
            }

            let child = &mut self.children[child_index];
            child.validate(entries, index, path_offset + child.name.len() + 1);
            index += child.span();
            self.entry_span += child.entry_span;
            child_index += 1;
        }

        self.children.truncate(child_index);
    }

    /// Write this node's tree object (and any dirty descendants) if unknown
    ///
    /// Requires a prior [`validate`](Self::validate) over the same rows.
    pub fn write_tree(
        &mut self,
        entries: &[IndexEntry],
        start: usize,
        path_offset: usize,
        writer: &dyn ObjectWriter,
    ) -> IndexResult<ObjectId> {
        if let Some(id) = self.id {
            return Ok(id);
        }

        let end = start + self.span();
        let mut size = 0;
        let mut index = start;
        let mut child_index = 0;
        while index < end {
            let entry = &entries[index];
            if let Some(child) = self.children.get_mut(child_index)
                && child.contains(&entry.path()[path_offset..])
            {
                child.write_tree(entries, index, path_offset + child.name.len() + 1, writer)?;
                size += TreeFormatter::entry_size(child.name(), EntryMode::Directory);
                index += child.span();
                child_index += 1;
                continue;
            }

            if !entry.is_merged() {
                return Err(IndexError::UnmergedPath(entry.path_string()));
            }
            size += TreeFormatter::entry_size(&entry.path()[path_offset..], entry.mode());
            index += 1;
        }

        let mut formatter = TreeFormatter::with_capacity(size);
        let mut index = start;
        let mut child_index = 0;
        while index < end {
            let entry = &entries[index];
            if let Some(child) = self.children.get(child_index)
                && child.contains(&entry.path()[path_offset..])
            {
                let child_id = child.id.unwrap_or_default();
                formatter.append(child.name(), EntryMode::Directory, &child_id);
                index += child.span();
                child_index += 1;
                continue;
            }

            formatter.append(
                &entry.path()[path_offset..],
                entry.mode(),
                &entry.object_id(),
            );
            index += 1;
        }

        let id = writer.write_tree(&formatter.into_bytes())?;
        tracing::debug!(
            tree = %String::from_utf8_lossy(&self.name),
            %id,
            span = self.entry_span,
            "wrote cached tree"
        );
        self.id = Some(id);
        Ok(id)
    }

    /// Decode a `TREE` extension payload
    pub fn read_extension(payload: &[u8]) -> IndexResult<Self> {
        let mut pos = 0;
        let root = CacheTree::read_node(payload, &mut pos)?;
        if pos != payload.len() {
            return Err(IndexError::Corrupt(
                "trailing bytes after cache tree extension".to_string(),
            ));
        }
        Ok(root)
    }

    fn read_node(payload: &[u8], pos: &mut usize) -> IndexResult<Self> {
        let name = read_until(payload, pos, b'\0', "cache tree name")?;
        let span = read_until(payload, pos, b' ', "cache tree entry count")?;
        let child_count = read_until(payload, pos, b'\n', "cache tree child count")?;

        let entry_span = parse_decimal::<i32>(span)?;
        let child_count = parse_decimal::<usize>(child_count)?;
        let id = if entry_span >= 0 {
            let raw = payload
                .get(*pos..*pos + OBJECT_ID_LENGTH)
                .ok_or(IndexError::UnexpectedEof("cache tree id"))?;
            *pos += OBJECT_ID_LENGTH;
            Some(ObjectId::from_slice(raw)?)
        } else {
            None
        };

        let mut children = Vec::with_capacity(child_count.min(payload.len()));
        for _ in 0..child_count {
            children.push(CacheTree::read_node(payload, pos)?);
        }
        children.sort_by(|a, b| {
            paths::compare(a.name(), EntryMode::Directory, b.name(), EntryMode::Directory)
        });

        Ok(CacheTree {
            name: Bytes::copy_from_slice(name),
            id,
            entry_span: if entry_span < 0 { -1 } else { entry_span },
            children,
        })
    }

    /// Encode this node and its descendants as a `TREE` extension payload
    pub fn write_extension(&self, out: &mut impl Write) -> IndexResult<()> {
        out.write_all(&self.name)?;
        out.write_all(b"\0")?;
        match self.id {
            Some(id) => {
                writeln!(out, "{} {}", self.entry_span, self.children.len())?;
                out.write_all(id.as_bytes())?;
            }
            None => writeln!(out, "-1 {}", self.children.len())?,
        }

        for child in &self.children {
            child.write_extension(out)?;
        }
        Ok(())
    }
}

/// Order a row's remaining path against a child directory name
///
/// Equal means the row lies inside the child.
fn compare_to_child(rest: &[u8], child: &[u8]) -> Ordering {
    let common = rest.len().min(child.len());
    match rest[..common].cmp(&child[..common]) {
        Ordering::Equal => {}
        unequal => return unequal,
    }

    if rest.len() <= child.len() {
        // the row ends at or before the end of the name, so it is not inside
        return Ordering::Less;
    }
    rest[common].cmp(&b'/')
}

fn read_until<'p>(
    payload: &'p [u8],
    pos: &mut usize,
    terminator: u8,
    what: &'static str,
) -> IndexResult<&'p [u8]> {
    let start = *pos;
    let length = payload[start..]
        .iter()
        .position(|&b| b == terminator)
        .ok_or(IndexError::UnexpectedEof(what))?;
    *pos = start + length + 1;
    Ok(&payload[start..start + length])
}

fn parse_decimal<T: std::str::FromStr>(raw: &[u8]) -> IndexResult<T> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse::<T>().ok())
        .ok_or_else(|| {
            IndexError::Corrupt(format!(
                "invalid number {:?} in cache tree extension",
                String::from_utf8_lossy(raw)
            ))
        })
}
