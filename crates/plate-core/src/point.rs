use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::ops::Op;
use crate::path::{self, Affinity, Path};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }

    pub fn compare(&self, other: &Point) -> Ordering {
        match path::compare(&self.path, &other.path) {
            Ordering::Equal => self.offset.cmp(&other.offset),
            ord => ord,
        }
    }

    pub fn is_before(&self, other: &Point) -> bool {
        self.compare(other) == Ordering::Less
    }

    pub fn is_after(&self, other: &Point) -> bool {
        self.compare(other) == Ordering::Greater
    }

    /// Moves the point through `op`. `None` means the point's leaf was removed.
    pub fn transform(&self, op: &Op, affinity: Affinity) -> Option<Point> {
        let mut point = self.clone();
        match op {
            Op::InsertText { path, offset, text } => {
                if *path == point.path
                    && (*offset < point.offset
                        || (*offset == point.offset && affinity == Affinity::Forward))
                {
                    point.offset += text.chars().count();
                }
            }
            Op::RemoveText { path, offset, text } => {
                if *path == point.path && *offset <= point.offset {
                    let removed = text.chars().count();
                    point.offset -= (point.offset - offset).min(removed);
                }
            }
            Op::MergeNode { path, position, .. } => {
                if *path == point.path {
                    point.offset += position;
                }
                point.path = path::transform(&point.path, op, affinity)?;
            }
            Op::SplitNode { path, position, .. } => {
                if *path == point.path {
                    if *position < point.offset
                        || (*position == point.offset && affinity == Affinity::Forward)
                    {
                        point.offset -= position;
                        point.path = path::transform(&point.path, op, Affinity::Forward)?;
                    }
                } else {
                    point.path = path::transform(&point.path, op, affinity)?;
                }
            }
            _ => {
                point.path = path::transform(&point.path, op, affinity)?;
            }
        }
        Some(point)
    }
}

/// How a range's two edges stick when an operation lands on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeAffinity {
    #[default]
    Forward,
    Backward,
    /// Edges move away from each other, so the range grows over inserted content.
    Outward,
    /// Edges move towards each other, so the range never grows.
    Inward,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub anchor: Point,
    pub focus: Point,
}

impl Range {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn is_expanded(&self) -> bool {
        !self.is_collapsed()
    }

    pub fn is_backward(&self) -> bool {
        self.anchor.is_after(&self.focus)
    }

    /// `(start, end)` in document order.
    pub fn edges(&self) -> (&Point, &Point) {
        if self.is_backward() {
            (&self.focus, &self.anchor)
        } else {
            (&self.anchor, &self.focus)
        }
    }

    pub fn start(&self) -> &Point {
        self.edges().0
    }

    pub fn end(&self) -> &Point {
        self.edges().1
    }

    pub fn includes(&self, point: &Point) -> bool {
        let (start, end) = self.edges();
        !point.is_before(start) && !point.is_after(end)
    }

    pub fn transform(&self, op: &Op, affinity: RangeAffinity) -> Option<Range> {
        let (anchor_affinity, focus_affinity) = match affinity {
            RangeAffinity::Forward => (Affinity::Forward, Affinity::Forward),
            RangeAffinity::Backward => (Affinity::Backward, Affinity::Backward),
            RangeAffinity::Inward | RangeAffinity::Outward => {
                let (start, end) = if affinity == RangeAffinity::Inward {
                    (Affinity::Forward, Affinity::Backward)
                } else {
                    (Affinity::Backward, Affinity::Forward)
                };
                if self.is_backward() {
                    (end, start)
                } else {
                    (start, end)
                }
            }
        };
        let anchor = self.anchor.transform(op, anchor_affinity)?;
        let focus = self.focus.transform(op, focus_affinity)?;
        Some(Range { anchor, focus })
    }
}
