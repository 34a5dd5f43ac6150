use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::Editor;
use crate::error::ApplyError;
use crate::node::{MarkKind, Marks, Node};
use crate::ops::{NodeProperties, Op};
use crate::path::{self, Affinity, Path};
use crate::point::{Point, Range, RangeAffinity};
use crate::text::slice_chars;

/// Distance covered by one caret step or one delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    #[default]
    Character,
    Word,
    /// Without layout information a line is the enclosing block.
    Line,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Anchor,
    Focus,
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveOptions {
    pub unit: Unit,
    pub reverse: bool,
    pub extend: bool,
}

/// Coordinates carried through the ops of a multi-step transform.
#[derive(Debug, Default)]
struct Refs {
    start: Option<Point>,
    end: Option<Point>,
    end_block: Option<Path>,
}

impl Refs {
    fn transform(&mut self, op: &Op) {
        self.start = self
            .start
            .take()
            .and_then(|p| p.transform(op, Affinity::Backward));
        self.end = self
            .end
            .take()
            .and_then(|p| p.transform(op, Affinity::Backward));
        self.end_block = self
            .end_block
            .take()
            .and_then(|p| path::transform(&p, op, Affinity::Forward));
    }
}

impl Editor {
    pub fn select(&mut self, range: Range) -> Result<(), ApplyError> {
        self.set_selection(Some(range))
    }

    pub fn deselect(&mut self) -> Result<(), ApplyError> {
        self.set_selection(None)
    }

    pub fn collapse(&mut self, edge: Edge) -> Result<(), ApplyError> {
        let Some(range) = self.selection() else {
            return Ok(());
        };
        let point = match edge {
            Edge::Anchor => range.anchor.clone(),
            Edge::Focus => range.focus.clone(),
            Edge::Start => range.start().clone(),
            Edge::End => range.end().clone(),
        };
        self.set_selection(Some(Range::collapsed(point)))
    }

    pub fn move_selection(&mut self, options: MoveOptions) -> Result<(), ApplyError> {
        let Some(range) = self.selection().cloned() else {
            return Ok(());
        };
        let step = |editor: &Self, point: &Point| {
            let moved = if options.reverse {
                editor.before(point, options.unit)
            } else {
                editor.after(point, options.unit)
            };
            moved.unwrap_or_else(|| point.clone())
        };

        let focus = step(self, &range.focus);
        let anchor = if options.extend {
            range.anchor.clone()
        } else {
            step(self, &range.anchor)
        };
        self.set_selection(Some(Range::new(anchor, focus)))
    }

    /// Inserts `text` at the caret, replacing an expanded selection. Pending
    /// marks make the text its own leaf. Text typed inside a void is dropped.
    pub fn insert_text(&mut self, text: &str) -> Result<(), ApplyError> {
        if text.is_empty() {
            return Ok(());
        }
        self.batch("insert_text", |editor| {
            if editor.selection().is_some_and(Range::is_expanded) {
                editor.delete_fragment(false)?;
            }
            let Some(point) = editor.selection().map(|range| range.anchor.clone()) else {
                return Ok(());
            };
            if editor.void_above(&point.path).is_some() {
                return Ok(());
            }
            let Some(leaf) = editor.doc().leaf(&point.path).cloned() else {
                return Err(ApplyError::invalid_path(&point.path, "selection is not in a leaf"));
            };

            match editor.pending_marks().cloned() {
                Some(marks) if marks != leaf.marks => {
                    let index = editor.split_leaf_for_insert(&point, &leaf.marks)?;
                    let at = path::child(&path::parent(&point.path), index);
                    editor.apply_operation(Op::InsertNode {
                        path: at.clone(),
                        node: Node::marked(text, marks),
                    })?;
                    let caret = Point::new(at, text.chars().count());
                    editor.set_selection(Some(Range::collapsed(caret)))
                }
                _ => {
                    editor.apply_operation(Op::InsertText {
                        path: point.path.clone(),
                        offset: point.offset,
                        text: text.to_string(),
                    })?;
                    editor.set_pending_marks(None);
                    Ok(())
                }
            }
        })
    }

    fn split_leaf_for_insert(&mut self, point: &Point, marks: &Marks) -> Result<usize, ApplyError> {
        let index = point.path.last().copied().unwrap_or(0);
        let len = self.doc().leaf(&point.path).map_or(0, |leaf| leaf.len());
        if point.offset == 0 {
            return Ok(index);
        }
        if point.offset < len {
            self.apply_operation(Op::SplitNode {
                path: point.path.clone(),
                position: point.offset,
                properties: NodeProperties::marks(marks.clone()),
            })?;
        }
        Ok(index + 1)
    }

    pub fn insert_soft_break(&mut self) -> Result<(), ApplyError> {
        self.insert_text("\n")
    }

    /// Splits the lowest block at the caret. Inside a void block a new empty
    /// paragraph is inserted after it instead.
    pub fn insert_break(&mut self) -> Result<(), ApplyError> {
        self.batch("insert_break", |editor| {
            if editor.selection().is_some_and(Range::is_expanded) {
                editor.delete_fragment(false)?;
            }
            let Some(mut point) = editor.selection().map(|range| range.anchor.clone()) else {
                return Ok(());
            };

            if let Some((void_path, void)) = editor.void_above(&point.path) {
                if !editor.is_inline(void) {
                    let at = path::next(&void_path);
                    editor.apply_operation(Op::InsertNode {
                        path: at.clone(),
                        node: Node::paragraph(""),
                    })?;
                    let caret = Point::new(path::child(&at, 0), 0);
                    return editor.set_selection(Some(Range::collapsed(caret)));
                }
                let after = path::next(&void_path);
                point = match editor.start(&after) {
                    Some(p) if path::parent(&p.path) == path::parent(&void_path) => p,
                    _ => return Ok(()),
                };
            }

            let Some((block_path, _)) = editor.block_above(&point.path) else {
                return Ok(());
            };
            let Some(marks) = editor.doc().leaf(&point.path).map(|leaf| leaf.marks.clone()) else {
                return Ok(());
            };
            let mut split_path = point.path.clone();
            let mut properties = NodeProperties::marks(marks);
            let mut position = point.offset;
            loop {
                let index = split_path.last().copied().unwrap_or(0);
                editor.apply_operation(Op::SplitNode {
                    path: split_path.clone(),
                    position,
                    properties,
                })?;
                if split_path == block_path {
                    break;
                }
                position = index + 1;
                split_path = path::parent(&split_path);
                properties = match editor.doc().node(&split_path) {
                    Some(node) => NodeProperties::of(node),
                    None => return Err(ApplyError::invalid_path(&split_path, "split ancestor vanished")),
                };
            }

            let new_block = path::next(&block_path);
            match editor.start(&new_block) {
                Some(caret) => editor.set_selection(Some(Range::collapsed(caret))),
                None => Ok(()),
            }
        })
    }

    pub fn delete_backward(&mut self, unit: Unit) -> Result<(), ApplyError> {
        self.delete_directional(unit, true)
    }

    pub fn delete_forward(&mut self, unit: Unit) -> Result<(), ApplyError> {
        self.delete_directional(unit, false)
    }

    fn delete_directional(&mut self, unit: Unit, reverse: bool) -> Result<(), ApplyError> {
        let source = if reverse { "delete_backward" } else { "delete_forward" };
        self.batch(source, |editor| {
            let Some(range) = editor.selection().cloned() else {
                return Ok(());
            };
            if range.is_expanded() {
                return editor.delete_fragment(reverse);
            }

            let point = range.anchor;
            if let Some((void_path, _)) = editor.void_above(&point.path) {
                return editor.remove_node_at(&void_path);
            }

            let target = if reverse {
                editor.before(&point, unit)
            } else {
                editor.after(&point, unit)
            };
            match target {
                Some(target) => editor.delete_range(Range::new(target, point)),
                None => Ok(()),
            }
        })
    }

    pub fn delete_fragment(&mut self, reverse: bool) -> Result<(), ApplyError> {
        let Some(range) = self.selection().cloned() else {
            return Ok(());
        };
        if range.is_collapsed() {
            return Ok(());
        }
        trace!(?range, reverse, "delete fragment");
        self.delete_range(range)
    }

    /// Removes everything between the edges of `range`, merging across blocks.
    pub fn delete_range(&mut self, range: Range) -> Result<(), ApplyError> {
        let (start, end) = {
            let (start, end) = range.edges();
            (start.clone(), end.clone())
        };
        if start == end {
            return Ok(());
        }
        self.validate_point(&start)?;
        self.validate_point(&end)?;

        self.batch("delete_range", |editor| {
            let start_void = editor.void_above(&start.path).map(|(p, _)| p);
            let end_void = editor.void_above(&end.path).map(|(p, _)| p);
            let start_block = editor.block_above(&start.path).map(|(p, _)| p);
            let end_block = editor.block_above(&end.path).map(|(p, _)| p);

            if start.path == end.path && start_void.is_none() {
                let removed = editor
                    .doc()
                    .leaf(&start.path)
                    .map(|leaf| slice_chars(&leaf.text, start.offset, end.offset).to_string())
                    .unwrap_or_default();
                editor.apply_operation(Op::RemoveText {
                    path: start.path.clone(),
                    offset: start.offset,
                    text: removed,
                })?;
                return editor.set_selection(Some(Range::collapsed(start.clone())));
            }

            let doomed = editor.nodes_between(&start, &end, start_void.as_deref(), end_void.as_deref());
            let mut refs = Refs {
                start: Some(start.clone()),
                end: Some(end.clone()),
                end_block: end_block.clone(),
            };

            if start_void.is_none()
                && let Some(leaf) = editor.doc().leaf(&start.path)
                && start.offset < leaf.len()
            {
                let text = slice_chars(&leaf.text, start.offset, leaf.len()).to_string();
                editor.apply_tracked(
                    Op::RemoveText {
                        path: start.path.clone(),
                        offset: start.offset,
                        text,
                    },
                    &mut refs,
                )?;
            }

            for doomed_path in doomed.iter().rev() {
                let Some(node) = editor.doc().node(doomed_path).cloned() else {
                    continue;
                };
                editor.apply_tracked(
                    Op::RemoveNode {
                        path: doomed_path.clone(),
                        node,
                    },
                    &mut refs,
                )?;
            }

            if end_void.is_none()
                && let Some(end_point) = refs.end.clone()
                && end_point.offset > 0
                && let Some(leaf) = editor.doc().leaf(&end_point.path)
            {
                let text = slice_chars(&leaf.text, 0, end_point.offset).to_string();
                editor.apply_tracked(
                    Op::RemoveText {
                        path: end_point.path.clone(),
                        offset: 0,
                        text,
                    },
                    &mut refs,
                )?;
            }

            let start_block_void = start_void.is_some() && start_void == start_block;
            if let (Some(start_block), Some(end_block)) = (start_block, refs.end_block.clone())
                && !start_block_void
                && start_block != end_block
            {
                editor.merge_block_into(&start_block, &end_block, &mut refs)?;
            }

            let caret = refs
                .start
                .clone()
                .or_else(|| refs.end.clone())
                .and_then(|p| editor.clamp_point(&p));
            editor.set_selection(caret.map(Range::collapsed))
        })
    }

    fn nodes_between(
        &self,
        start: &Point,
        end: &Point,
        start_void: Option<&[usize]>,
        end_void: Option<&[usize]>,
    ) -> Vec<Path> {
        let mut doomed: Vec<Path> = Vec::new();
        for (p, _) in self.doc().descendants() {
            if doomed.iter().any(|d| p.starts_with(d)) {
                continue;
            }
            let is_edge_void = start_void == Some(p.as_slice()) || end_void == Some(p.as_slice());
            let edge_ancestor = start.path.starts_with(&p) || end.path.starts_with(&p);
            let inside = path::compare(&p, &start.path).is_gt() && path::compare(&p, &end.path).is_lt();
            if is_edge_void || (!edge_ancestor && inside) {
                doomed.push(p);
            }
        }
        doomed
    }

    fn merge_block_into(
        &mut self,
        start_block: &[usize],
        end_block: &[usize],
        refs: &mut Refs,
    ) -> Result<(), ApplyError> {
        let target = path::next(start_block);
        let mut current = end_block.to_vec();

        if current != target {
            let mut empty_ancestor: Option<Path> = None;
            let mut level = path::parent(&current);
            while !level.is_empty()
                && !start_block.starts_with(&level)
                && self.doc().node(&level).is_some_and(|n| n.children().len() == 1)
            {
                empty_ancestor = Some(level.clone());
                level = path::parent(&level);
            }

            let move_op = Op::MoveNode {
                path: current.clone(),
                new_path: target.clone(),
            };
            let empty_ancestor =
                empty_ancestor.and_then(|p| path::transform(&p, &move_op, Affinity::Forward));
            self.apply_tracked(move_op, refs)?;
            current = target.clone();

            if let Some(empty) = empty_ancestor
                && let Some(node) = self.doc().node(&empty).cloned()
            {
                self.apply_tracked(Op::RemoveNode { path: empty, node }, refs)?;
            }
        }

        let Some(prev) = self.doc().node(start_block) else {
            return Err(ApplyError::invalid_path(start_block, "merge target vanished"));
        };
        let position = prev.children().len();
        let Some(node) = self.doc().node(&current) else {
            return Err(ApplyError::invalid_path(&current, "merged block vanished"));
        };
        let properties = NodeProperties::of(node);
        self.apply_tracked(
            Op::MergeNode {
                path: current,
                position,
                properties,
            },
            refs,
        )
    }

    fn apply_tracked(&mut self, op: Op, refs: &mut Refs) -> Result<(), ApplyError> {
        refs.transform(&op);
        self.apply_operation(op)
    }

    fn remove_node_at(&mut self, at: &[usize]) -> Result<(), ApplyError> {
        let Some(node) = self.doc().node(at).cloned() else {
            return Err(ApplyError::invalid_path(at, "nothing to remove"));
        };
        self.apply_operation(Op::RemoveNode {
            path: at.to_vec(),
            node,
        })
    }

    pub fn add_mark(&mut self, kind: MarkKind) -> Result<(), ApplyError> {
        self.set_mark(kind, true)
    }

    pub fn remove_mark(&mut self, kind: MarkKind) -> Result<(), ApplyError> {
        self.set_mark(kind, false)
    }

    pub fn toggle_mark(&mut self, kind: MarkKind) -> Result<(), ApplyError> {
        let on = self.marks().has(kind);
        self.set_mark(kind, !on)
    }

    /// A collapsed selection only updates the pending marks. An expanded one
    /// splits its edge leaves and sets the mark on every covered leaf.
    fn set_mark(&mut self, kind: MarkKind, on: bool) -> Result<(), ApplyError> {
        let Some(range) = self.selection().cloned() else {
            return Ok(());
        };

        if range.is_collapsed() {
            let mut marks = self.marks();
            marks.set(kind, on);
            self.set_pending_marks(Some(marks));
            return Ok(());
        }

        let source = if on { "add_mark" } else { "remove_mark" };
        self.batch(source, |editor| {
            let mut tracked = range.clone();
            let end = tracked.end().clone();
            editor.split_for_range(&end, &mut tracked)?;
            let start = tracked.start().clone();
            editor.split_for_range(&start, &mut tracked)?;

            let (start, end) = (tracked.start().clone(), tracked.end().clone());
            let covered: Vec<(Path, Marks)> = editor
                .doc()
                .texts()
                .into_iter()
                .filter(|(p, leaf)| {
                    let after_start = path::compare(p, &start.path).is_gt()
                        || (*p == start.path && start.offset < leaf.len());
                    let before_end = path::compare(p, &end.path).is_lt()
                        || (*p == end.path && end.offset > 0);
                    after_start && before_end
                })
                .map(|(p, leaf)| (p, leaf.marks.clone()))
                .collect();

            for (leaf_path, marks) in covered {
                if editor.void_above(&leaf_path).is_some() || marks.has(kind) == on {
                    continue;
                }
                let new_marks = {
                    let mut m = marks.clone();
                    m.set(kind, on);
                    m
                };
                editor.apply_operation(Op::SetNode {
                    path: leaf_path,
                    properties: NodeProperties::marks(marks),
                    new_properties: NodeProperties::marks(new_marks),
                })?;
            }

            editor.set_selection(Some(tracked))
        })
    }

    fn split_for_range(&mut self, point: &Point, tracked: &mut Range) -> Result<(), ApplyError> {
        let Some(leaf) = self.doc().leaf(&point.path) else {
            return Ok(());
        };
        if point.offset == 0 || point.offset >= leaf.len() {
            return Ok(());
        }
        let op = Op::SplitNode {
            path: point.path.clone(),
            position: point.offset,
            properties: NodeProperties::marks(leaf.marks.clone()),
        };
        if let Some(next) = tracked.transform(&op, RangeAffinity::Inward) {
            *tracked = next;
        }
        self.apply_operation(op)
    }

    pub fn insert_node(&mut self, node: Node) -> Result<(), ApplyError> {
        self.batch("insert_node", |editor| {
            if editor.selection().is_some_and(Range::is_expanded) {
                editor.delete_fragment(false)?;
            }
            let Some(point) = editor.selection().map(|range| range.anchor.clone()) else {
                return Ok(());
            };

            if editor.registry().is_block(&node) {
                let Some((block_path, _)) = editor.block_above(&point.path) else {
                    return Ok(());
                };
                let at = path::next(&block_path);
                editor.apply_operation(Op::InsertNode {
                    path: at.clone(),
                    node,
                })?;
                return match editor.start(&at) {
                    Some(caret) => editor.set_selection(Some(Range::collapsed(caret))),
                    None => Ok(()),
                };
            }

            if editor.void_above(&point.path).is_some() {
                return Ok(());
            }
            let Some(marks) = editor.doc().leaf(&point.path).map(|leaf| leaf.marks.clone()) else {
                return Ok(());
            };
            let index = point.path.last().copied().unwrap_or(0);
            let parent = path::parent(&point.path);
            editor.apply_operation(Op::SplitNode {
                path: point.path.clone(),
                position: point.offset,
                properties: NodeProperties::marks(marks),
            })?;
            editor.apply_operation(Op::InsertNode {
                path: path::child(&parent, index + 1),
                node,
            })?;
            let caret = Point::new(path::child(&parent, index + 2), 0);
            editor.set_selection(Some(Range::collapsed(caret)))
        })
    }
}
