//! Stable node identities kept beside the tree.
//!
//! The tree itself stays pointer-free: a [`KeyTable`] maps every current path
//! to a [`Key`] and is carried through each applied op, so a node keeps its key
//! while its path shifts. Only structurally new nodes get fresh keys.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::node::{Document, Node};
use crate::ops::Op;
use crate::path::{self, Affinity, Path};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key(u64);

impl Key {
    pub fn fresh() -> Self {
        Key(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyTable {
    by_path: BTreeMap<Path, Key>,
}

impl KeyTable {
    pub fn for_document(doc: &Document) -> Self {
        let mut table = Self::default();
        table.collect_garbage(doc);
        table
    }

    pub fn key(&self, path: &[usize]) -> Option<Key> {
        self.by_path.get(path).copied()
    }

    pub fn path_of(&self, key: Key) -> Option<Path> {
        self.by_path
            .iter()
            .find(|(_, k)| **k == key)
            .map(|(path, _)| path.clone())
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, Key)> {
        self.by_path.iter().map(|(path, key)| (path, *key))
    }

    /// Carries every entry through `op`.
    pub fn transform(&mut self, op: &Op) {
        match op {
            Op::InsertText { .. }
            | Op::RemoveText { .. }
            | Op::SetNode { .. }
            | Op::SetSelection { .. } => return,
            _ => {}
        }

        let merged_away = match op {
            Op::MergeNode { path, .. } => Some(path.as_slice()),
            _ => None,
        };

        let previous = std::mem::take(&mut self.by_path);
        for (path, key) in previous {
            if merged_away == Some(path.as_slice()) {
                continue;
            }
            if let Some(next) = path::transform(&path, op, Affinity::Backward) {
                self.by_path.insert(next, key);
            }
        }

        match op {
            Op::InsertNode { path, node } => self.mint_subtree(path, node),
            Op::SplitNode { path, .. } => {
                self.by_path.insert(path::next(path), Key::fresh());
            }
            _ => {}
        }
    }

    /// Drops entries that no longer resolve to a node and keys any node that
    /// has none yet.
    pub fn collect_garbage(&mut self, doc: &Document) {
        self.by_path.retain(|path, _| doc.node(path).is_some());
        for (path, _) in doc.descendants() {
            self.by_path.entry(path).or_insert_with(Key::fresh);
        }
    }

    fn mint_subtree(&mut self, at: &[usize], node: &Node) {
        self.by_path.insert(at.to_vec(), Key::fresh());
        for (ix, child) in node.children().iter().enumerate() {
            self.mint_subtree(&path::child(at, ix), child);
        }
    }
}
