/// Knobs controlling how an [`Index`](crate::areas::index::Index) is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    /// Smudge entries that may be racily clean so their content gets re-checked
    pub smudge_racily_clean: bool,
    /// Persist the cache tree as the `TREE` extension
    pub write_cache_tree: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        IndexOptions {
            smudge_racily_clean: true,
            write_cache_tree: true,
        }
    }
}

impl IndexOptions {
    pub fn with_smudge_racily_clean(mut self, enabled: bool) -> Self {
        self.smudge_racily_clean = enabled;
        self
    }

    pub fn with_write_cache_tree(mut self, enabled: bool) -> Self {
        self.write_cache_tree = enabled;
        self
    }
}
