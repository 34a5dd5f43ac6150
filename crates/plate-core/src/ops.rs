use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node::{Attrs, ElementKind, Marks, Node};
use crate::path::{self, Affinity, Path};
use crate::point::Range;

/// A partial set of node properties. Attribute values of `null` mean "absent".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ElementKind>,
    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<Marks>,
}

impl NodeProperties {
    pub fn marks(marks: Marks) -> Self {
        Self {
            marks: Some(marks),
            ..Self::default()
        }
    }

    /// Properties that recreate `node` as an empty shell, used by split and merge.
    pub fn of(node: &Node) -> Self {
        match node {
            Node::Text(t) => Self::marks(t.marks.clone()),
            Node::Element(el) => Self {
                kind: Some(el.kind.clone()),
                attrs: el.attrs.clone(),
                marks: None,
            },
        }
    }

    /// The current values of the keys `other` touches, suitable as the
    /// `properties` half of a `set_node`.
    pub fn snapshot(node: &Node, other: &NodeProperties) -> Self {
        match node {
            Node::Text(t) => Self {
                marks: other.marks.as_ref().map(|_| t.marks.clone()),
                ..Self::default()
            },
            Node::Element(el) => Self {
                kind: other.kind.as_ref().map(|_| el.kind.clone()),
                attrs: other
                    .attrs
                    .keys()
                    .map(|key| (key.clone(), el.attrs.get(key).cloned().unwrap_or(Value::Null)))
                    .collect(),
                marks: None,
            },
        }
    }

    pub(crate) fn apply_to(&self, node: &mut Node) {
        match node {
            Node::Text(t) => {
                if let Some(marks) = &self.marks {
                    t.marks = marks.clone();
                }
            }
            Node::Element(el) => {
                if let Some(kind) = &self.kind {
                    el.kind = kind.clone();
                }
                for (key, value) in &self.attrs {
                    if value.is_null() {
                        el.attrs.remove(key);
                    } else {
                        el.attrs.insert(key.clone(), value.clone());
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    InsertNode {
        #[serde(default)]
        path: Path,
        node: Node,
    },
    RemoveNode {
        #[serde(default)]
        path: Path,
        node: Node,
    },
    /// Merges the node at `path` into its previous sibling. `position` is the
    /// previous sibling's length (chars for text, children for elements).
    MergeNode {
        #[serde(default)]
        path: Path,
        position: usize,
        #[serde(default)]
        properties: NodeProperties,
    },
    /// Splits the node at `path` at `position`; the tail becomes a new next
    /// sibling built from `properties`.
    SplitNode {
        #[serde(default)]
        path: Path,
        position: usize,
        #[serde(default)]
        properties: NodeProperties,
    },
    SetNode {
        #[serde(default)]
        path: Path,
        properties: NodeProperties,
        new_properties: NodeProperties,
    },
    MoveNode {
        #[serde(default)]
        path: Path,
        new_path: Path,
    },
    InsertText {
        #[serde(default)]
        path: Path,
        offset: usize,
        text: String,
    },
    RemoveText {
        #[serde(default)]
        path: Path,
        offset: usize,
        text: String,
    },
    SetSelection {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        properties: Option<Range>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_properties: Option<Range>,
    },
}

impl Op {
    pub fn is_selection_op(&self) -> bool {
        matches!(self, Op::SetSelection { .. })
    }

    pub fn is_text_op(&self) -> bool {
        matches!(self, Op::InsertText { .. } | Op::RemoveText { .. })
    }

    pub fn path(&self) -> Option<&[usize]> {
        match self {
            Op::InsertNode { path, .. }
            | Op::RemoveNode { path, .. }
            | Op::MergeNode { path, .. }
            | Op::SplitNode { path, .. }
            | Op::SetNode { path, .. }
            | Op::MoveNode { path, .. }
            | Op::InsertText { path, .. }
            | Op::RemoveText { path, .. } => Some(path),
            Op::SetSelection { .. } => None,
        }
    }

    pub fn inverse(&self) -> Op {
        match self.clone() {
            Op::InsertNode { path, node } => Op::RemoveNode { path, node },
            Op::RemoveNode { path, node } => Op::InsertNode { path, node },
            Op::InsertText { path, offset, text } => Op::RemoveText { path, offset, text },
            Op::RemoveText { path, offset, text } => Op::InsertText { path, offset, text },
            Op::MergeNode {
                path,
                position,
                properties,
            } => Op::SplitNode {
                path: path::previous(&path).unwrap_or_default(),
                position,
                properties,
            },
            Op::SplitNode {
                path,
                position,
                properties,
            } => Op::MergeNode {
                path: path::next(&path),
                position,
                properties,
            },
            Op::SetNode {
                path,
                properties,
                new_properties,
            } => Op::SetNode {
                path,
                properties: new_properties,
                new_properties: properties,
            },
            Op::SetSelection {
                properties,
                new_properties,
            } => Op::SetSelection {
                properties: new_properties,
                new_properties: properties,
            },
            Op::MoveNode { path, new_path } => {
                if path == new_path {
                    return self.clone();
                }
                if path::is_sibling(&path, &new_path) {
                    return Op::MoveNode {
                        path: new_path,
                        new_path: path,
                    };
                }
                let inverse_path = path::transform(&path, self, Affinity::Forward);
                let inverse_new_path = path::transform(&path::next(&path), self, Affinity::Forward);
                Op::MoveNode {
                    path: inverse_path.unwrap_or_default(),
                    new_path: inverse_new_path.unwrap_or_default(),
                }
            }
        }
    }

    /// Paths whose subtrees must be renormalized after this op, ancestors first.
    pub fn dirty_paths(&self) -> Vec<Path> {
        match self {
            Op::InsertText { path, .. } | Op::RemoveText { path, .. } | Op::SetNode { path, .. } => {
                path::levels(path)
            }
            Op::InsertNode { path, node } => {
                let mut paths = path::levels(path);
                fn walk(node: &Node, at: &mut Path, out: &mut Vec<Path>) {
                    for (ix, child) in node.children().iter().enumerate() {
                        at.push(ix);
                        out.push(at.clone());
                        walk(child, at, out);
                        at.pop();
                    }
                }
                walk(node, &mut path.clone(), &mut paths);
                paths
            }
            Op::RemoveNode { path, .. } => path::ancestors(path),
            Op::MergeNode { path, .. } => {
                let mut paths = path::ancestors(path);
                paths.extend(path::previous(path));
                paths
            }
            Op::SplitNode { path, .. } => {
                let mut paths = path::levels(path);
                paths.push(path::next(path));
                paths
            }
            Op::MoveNode { path, new_path } => {
                if path == new_path {
                    return Vec::new();
                }
                let mut paths: Vec<Path> = path::ancestors(path)
                    .iter()
                    .filter_map(|p| path::transform(p, self, Affinity::Forward))
                    .collect();
                let new_ancestors: Vec<Path> = path::ancestors(new_path)
                    .iter()
                    .filter_map(|p| path::transform(p, self, Affinity::Forward))
                    .collect();
                let mut result = new_ancestors.last().cloned().unwrap_or_default();
                result.push(new_path.last().copied().unwrap_or(0));
                paths.extend(new_ancestors);
                paths.push(result);
                paths
            }
            Op::SetSelection { .. } => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Ops applied together: one normalization pass, one undo step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub ops: Vec<Op>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_after: Option<Range>,
    #[serde(default)]
    pub meta: TransactionMeta,
}

impl Transaction {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            ops,
            selection_after: None,
            meta: TransactionMeta::default(),
        }
    }

    pub fn selection_after(mut self, selection_after: Range) -> Self {
        self.selection_after = Some(selection_after);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.meta.source = Some(source.into());
        self
    }
}
