//! Child-index paths and the rules for moving them through operations.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::ops::Op;

pub type Path = Vec<usize>;

/// Which side a coordinate sticks to when an operation lands exactly on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Affinity {
    #[default]
    Forward,
    Backward,
}

pub fn parent(path: &[usize]) -> Path {
    match path.split_last() {
        Some((_, parent)) => parent.to_vec(),
        None => Vec::new(),
    }
}

pub fn next(path: &[usize]) -> Path {
    let mut next = path.to_vec();
    if let Some(last) = next.last_mut() {
        *last += 1;
    }
    next
}

pub fn previous(path: &[usize]) -> Option<Path> {
    let (&last, parent) = path.split_last()?;
    let last = last.checked_sub(1)?;
    let mut prev = parent.to_vec();
    prev.push(last);
    Some(prev)
}

pub fn child(path: &[usize], index: usize) -> Path {
    let mut child = path.to_vec();
    child.push(index);
    child
}

/// Proper ancestors from the root (`[]`) down to the parent.
pub fn ancestors(path: &[usize]) -> Vec<Path> {
    (0..path.len()).map(|len| path[..len].to_vec()).collect()
}

/// Ancestors plus the path itself.
pub fn levels(path: &[usize]) -> Vec<Path> {
    (0..=path.len()).map(|len| path[..len].to_vec()).collect()
}

pub fn is_ancestor(path: &[usize], other: &[usize]) -> bool {
    path.len() < other.len() && other.starts_with(path)
}

pub fn is_descendant(path: &[usize], other: &[usize]) -> bool {
    is_ancestor(other, path)
}

pub fn is_sibling(path: &[usize], other: &[usize]) -> bool {
    match (path.split_last(), other.split_last()) {
        (Some((a, pa)), Some((b, pb))) => pa == pb && a != b,
        _ => false,
    }
}

pub fn common(path: &[usize], other: &[usize]) -> Path {
    path.iter()
        .zip(other)
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| *a)
        .collect()
}

/// Document order. Ancestors compare equal to their descendants.
pub fn compare(path: &[usize], other: &[usize]) -> Ordering {
    let len = path.len().min(other.len());
    path[..len].cmp(&other[..len])
}

/// True when `path` ends before `other` at the level of `path`'s last index.
pub fn ends_before(path: &[usize], other: &[usize]) -> bool {
    let Some((&last, parent)) = path.split_last() else {
        return false;
    };
    other.len() >= path.len() && other.starts_with(parent) && last < other[parent.len()]
}

/// Transforms `path` through `op`. Returns `None` when the node was removed
/// (or merged away).
pub fn transform(path: &[usize], op: &Op, affinity: Affinity) -> Option<Path> {
    let mut p = path.to_vec();
    if p.is_empty() {
        return Some(p);
    }

    match op {
        Op::InsertNode { path: op, .. } => {
            if op.as_slice() == path || ends_before(op, path) || is_ancestor(op, path) {
                p[op.len() - 1] += 1;
            }
        }
        Op::RemoveNode { path: op, .. } => {
            if op.as_slice() == path || is_ancestor(op, path) {
                return None;
            }
            if ends_before(op, path) {
                p[op.len() - 1] -= 1;
            }
        }
        Op::MergeNode { path: op, position, .. } => {
            if op.as_slice() == path || ends_before(op, path) {
                p[op.len() - 1] -= 1;
            } else if is_ancestor(op, path) {
                p[op.len() - 1] -= 1;
                p[op.len()] += position;
            }
        }
        Op::SplitNode { path: op, position, .. } => {
            if op.as_slice() == path {
                if affinity == Affinity::Forward {
                    p[op.len() - 1] += 1;
                }
            } else if ends_before(op, path) {
                p[op.len() - 1] += 1;
            } else if is_ancestor(op, path) && path[op.len()] >= *position {
                p[op.len() - 1] += 1;
                p[op.len()] -= position;
            }
        }
        Op::MoveNode { path: op, new_path } => {
            if op == new_path {
                return Some(p);
            }
            if is_ancestor(op, path) || op.as_slice() == path {
                let mut moved = new_path.clone();
                if ends_before(op, new_path) && op.len() < new_path.len() {
                    moved[op.len() - 1] -= 1;
                }
                moved.extend_from_slice(&path[op.len()..]);
                return Some(moved);
            }
            if is_sibling(op, new_path)
                && (is_ancestor(new_path, path) || new_path.as_slice() == path)
            {
                if ends_before(op, path) {
                    p[op.len() - 1] -= 1;
                } else {
                    p[op.len() - 1] += 1;
                }
            } else if ends_before(new_path, path)
                || new_path.as_slice() == path
                || is_ancestor(new_path, path)
            {
                if ends_before(op, path) {
                    p[op.len() - 1] -= 1;
                }
                p[new_path.len() - 1] += 1;
            } else if ends_before(op, path) {
                if new_path.as_slice() == path {
                    p[new_path.len() - 1] += 1;
                }
                p[op.len() - 1] -= 1;
            }
        }
        Op::InsertText { .. }
        | Op::RemoveText { .. }
        | Op::SetNode { .. }
        | Op::SetSelection { .. } => {}
    }

    Some(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    #[test]
    fn relations() {
        assert!(is_ancestor(&[0], &[0, 1]));
        assert!(!is_ancestor(&[0, 1], &[0, 1]));
        assert!(is_sibling(&[0, 1], &[0, 3]));
        assert!(ends_before(&[0, 1], &[0, 2, 5]));
        assert!(!ends_before(&[0, 2], &[0, 2, 5]));
        assert_eq!(common(&[1, 2, 3], &[1, 2, 7]), vec![1, 2]);
        assert_eq!(previous(&[0]), None);
        assert_eq!(ancestors(&[2, 1]), vec![vec![], vec![2]]);
    }

    #[test]
    fn insert_shifts_later_siblings() {
        let op = Op::InsertNode {
            path: vec![1],
            node: Node::paragraph(""),
        };
        assert_eq!(transform(&[0, 0], &op, Affinity::Forward), Some(vec![0, 0]));
        assert_eq!(transform(&[1, 0], &op, Affinity::Forward), Some(vec![2, 0]));
    }

    #[test]
    fn split_keeps_equal_path_with_backward_affinity() {
        let op = Op::SplitNode {
            path: vec![0],
            position: 1,
            properties: Default::default(),
        };
        assert_eq!(transform(&[0], &op, Affinity::Backward), Some(vec![0]));
        assert_eq!(transform(&[0], &op, Affinity::Forward), Some(vec![1]));
        assert_eq!(transform(&[0, 2], &op, Affinity::Forward), Some(vec![1, 1]));
    }

    #[test]
    fn move_relocates_subtree() {
        let op = Op::MoveNode {
            path: vec![0],
            new_path: vec![2],
        };
        assert_eq!(transform(&[0, 1], &op, Affinity::Forward), Some(vec![2, 1]));
        assert_eq!(transform(&[1], &op, Affinity::Forward), Some(vec![0]));
    }
}
