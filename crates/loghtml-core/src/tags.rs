//! Index of every tag seen by a logger.
//!
//! The browser-side filter builds its checkbox list from the tags present in
//! the document; the index gives the host application the same list without
//! reading the file back.

use std::collections::BTreeSet;

use parking_lot::RwLock;

/// Thread-safe, grow-only set of tag names.
#[derive(Debug, Default)]
pub struct TagIndex {
    tags: RwLock<BTreeSet<String>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a single tag. Inserting a known tag is a no-op.
    pub fn insert(&self, tag: &str) {
        if self.tags.read().contains(tag) {
            return;
        }
        self.tags.write().insert(tag.to_string());
    }

    /// Record every tag in `tags`.
    pub fn extend<I, S>(&self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fresh: Vec<String> = {
            let known = self.tags.read();
            tags.into_iter()
                .filter(|t| !known.contains(t.as_ref()))
                .map(|t| t.as_ref().to_string())
                .collect()
        };
        if !fresh.is_empty() {
            self.tags.write().extend(fresh);
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.read().contains(tag)
    }

    pub fn len(&self) -> usize {
        self.tags.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.read().is_empty()
    }

    /// Sorted copy of all tags seen so far.
    pub fn snapshot(&self) -> Vec<String> {
        self.tags.read().iter().cloned().collect()
    }
}
