use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::change::Change;
use crate::config::EditorConfig;
use crate::error::{ApplyError, CommandError};
use crate::keys::KeyTable;
use crate::node::{Document, ElementNode, Marks, Node, TextNode};
use crate::ops::{Op, Transaction};
use crate::path::{self, Affinity, Path};
use crate::plugin::{CommandSpec, NodeSpec, PluginRegistry};
use crate::point::{Point, Range};
use crate::serde_value::PlateValue;
use crate::text;

#[derive(Debug, Clone)]
pub struct UndoRecord {
    /// Value ops in the order they were applied, normalization included.
    pub ops: Vec<Op>,
    pub selection_before: Option<Range>,
    pub selection_after: Option<Range>,
    pub source: Option<String>,
}

#[derive(Debug, Clone)]
struct Snapshot {
    doc: Document,
    selection: Option<Range>,
    marks: Option<Marks>,
    keys: KeyTable,
    pending_ops: usize,
    pending_marks_changed: bool,
}

#[derive(Debug)]
struct Batch {
    snapshot: Snapshot,
    source: String,
    record_history: bool,
    ops: Vec<Op>,
    dirty: Vec<Path>,
    selection_lost: bool,
}

pub struct Editor {
    doc: Document,
    selection: Option<Range>,
    marks: Option<Marks>,
    keys: KeyTable,
    registry: PluginRegistry,
    config: EditorConfig,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
    batch: Option<Batch>,
    pending: Change,
    revision: u64,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("doc", &self.doc)
            .field("selection", &self.selection)
            .field("marks", &self.marks)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl Editor {
    pub fn new(doc: Document, selection: Option<Range>, registry: PluginRegistry) -> Self {
        Self::with_config(doc, selection, registry, EditorConfig::default())
    }

    pub fn with_config(
        doc: Document,
        selection: Option<Range>,
        registry: PluginRegistry,
        config: EditorConfig,
    ) -> Self {
        let keys = KeyTable::for_document(&doc);
        let mut editor = Self {
            doc,
            selection,
            marks: None,
            keys,
            registry,
            config: config.with_defaults(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            batch: None,
            pending: Change::default(),
            revision: 0,
        };
        if let Err(err) = editor.normalize() {
            warn!(%err, "initial value could not be normalized");
        }
        editor.pending = Change::default();
        editor
    }

    pub fn with_core_plugins() -> Self {
        let doc = Document::new(vec![Node::paragraph("")]);
        let selection = Range::collapsed(Point::new(vec![0, 0], 0));
        Self::new(doc, Some(selection), PluginRegistry::core())
    }

    /// Loads a persisted snapshot. Unlike [`Editor::new`], a value that cannot
    /// be normalized is reported instead of logged.
    pub fn from_value(value: PlateValue, registry: PluginRegistry) -> Result<Self, ApplyError> {
        let value = value.validated()?;
        let mut editor = Self {
            keys: KeyTable::for_document(&value.document),
            doc: value.document,
            selection: None,
            marks: None,
            registry,
            config: EditorConfig::default(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            batch: None,
            pending: Change::default(),
            revision: 0,
        };
        editor.normalize()?;
        editor.pending = Change::default();
        Ok(editor)
    }

    pub fn to_value(&self) -> PlateValue {
        PlateValue::from_document(self.doc.clone())
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> Option<&Range> {
        self.selection.as_ref()
    }

    pub fn keys(&self) -> &KeyTable {
        &self.keys
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Bumped once per committed batch that touched the value.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Marks toggled at a collapsed caret that the next insertion will carry.
    pub fn pending_marks(&self) -> Option<&Marks> {
        self.marks.as_ref()
    }

    pub fn set_pending_marks(&mut self, marks: Option<Marks>) {
        if self.marks != marks {
            self.marks = marks;
            self.pending.marks_changed = true;
        }
    }

    pub fn is_batching(&self) -> bool {
        self.batch.is_some()
    }

    /// Drains everything applied since the previous call into one change.
    pub fn take_change(&mut self) -> Option<Change> {
        if self.pending.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.pending))
    }

    pub fn has_pending_change(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };

        let result = self.run_batch("history:undo", false, |editor| {
            for op in record.ops.iter().rev() {
                editor.apply_operation(op.inverse())?;
            }
            editor.set_selection(record.selection_before.clone())
        });

        match result {
            Ok(()) => {
                self.redo_stack.push(record);
                true
            }
            Err(err) => {
                warn!(%err, "undo failed; history dropped");
                self.undo_stack.clear();
                false
            }
        }
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };

        let result = self.run_batch("history:redo", false, |editor| {
            for op in record.ops.iter().cloned() {
                editor.apply_operation(op)?;
            }
            editor.set_selection(record.selection_after.clone())
        });

        match result {
            Ok(()) => {
                self.undo_stack.push(record);
                true
            }
            Err(err) => {
                warn!(%err, "redo failed; history dropped");
                self.redo_stack.clear();
                false
            }
        }
    }

    /// Applies every op of `tx` in one batch.
    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        let Transaction {
            ops,
            selection_after,
            meta,
        } = tx;
        let source = meta.source.unwrap_or_else(|| "transaction".to_string());
        self.batch(&source, |editor| {
            for op in ops {
                editor.apply_operation(op)?;
            }
            if let Some(selection) = selection_after {
                editor.set_selection(Some(selection))?;
            }
            Ok(())
        })
    }

    /// Runs `f` with normalization deferred until it returns. Nested calls
    /// join the outermost batch. If `f` or the final normalization fails,
    /// the document, selection, keys and pending change are restored.
    pub fn batch<T>(
        &mut self,
        source: &str,
        f: impl FnOnce(&mut Self) -> Result<T, ApplyError>,
    ) -> Result<T, ApplyError> {
        self.run_batch(source, true, f)
    }

    fn run_batch<T>(
        &mut self,
        source: &str,
        record_history: bool,
        f: impl FnOnce(&mut Self) -> Result<T, ApplyError>,
    ) -> Result<T, ApplyError> {
        if self.batch.is_some() {
            return f(self);
        }

        self.batch = Some(Batch {
            snapshot: self.snapshot(),
            source: source.to_string(),
            record_history,
            ops: Vec::new(),
            dirty: Vec::new(),
            selection_lost: false,
        });

        let result = match f(self) {
            Ok(value) => self.finish_batch().map(|()| value),
            Err(err) => Err(err),
        };

        let Some(batch) = self.batch.take() else {
            return result;
        };

        match result {
            Ok(value) => {
                self.commit(batch);
                Ok(value)
            }
            Err(err) => {
                warn!(source = %batch.source, %err, "batch rolled back");
                self.restore(batch.snapshot);
                Err(err)
            }
        }
    }

    /// Applies one op. Outside a batch the op gets a batch of its own.
    pub fn apply_operation(&mut self, op: Op) -> Result<(), ApplyError> {
        if self.batch.is_none() {
            return self.batch("operation", |editor| editor.apply_operation(op));
        }

        trace!(?op, "apply");
        let fallback = match &op {
            Op::RemoveNode { path, .. } => self.removal_fallback(path),
            _ => None,
        };

        apply_op_to(&mut self.doc, &op)?;
        self.keys.transform(&op);
        self.transform_selection(&op, fallback);

        if let Some(batch) = self.batch.as_mut() {
            let mut dirty: Vec<Path> = batch
                .dirty
                .drain(..)
                .filter_map(|p| path::transform(&p, &op, Affinity::Forward))
                .collect();
            for p in op.dirty_paths() {
                if !dirty.contains(&p) {
                    dirty.push(p);
                }
            }
            batch.dirty = dirty;
            batch.ops.push(op);
        }
        Ok(())
    }

    /// Replaces the selection through a `set_selection` op. No-op when equal.
    pub fn set_selection(&mut self, selection: Option<Range>) -> Result<(), ApplyError> {
        if self.selection == selection {
            return Ok(());
        }
        if let Some(range) = &selection {
            for point in [&range.anchor, &range.focus] {
                self.validate_point(point)?;
            }
        }
        self.apply_operation(Op::SetSelection {
            properties: self.selection.clone(),
            new_properties: selection,
        })
    }

    /// Normalizes every node, not only the dirty ones.
    pub fn normalize(&mut self) -> Result<(), ApplyError> {
        self.run_batch("normalize", false, |editor| {
            let mut all: Vec<Path> = vec![Vec::new()];
            all.extend(editor.doc.descendants().into_iter().map(|(p, _)| p));
            if let Some(batch) = editor.batch.as_mut() {
                batch.dirty = all;
            }
            Ok(())
        })
    }

    pub fn run_command(&mut self, id: &str, args: Option<Value>) -> Result<(), CommandError> {
        let Some(command) = self.registry.command(id) else {
            return Err(CommandError::new(format!("Unknown command: {id}")));
        };
        (command.handler)(self, args)
    }

    pub fn node_specs(&self) -> &HashMap<String, NodeSpec> {
        self.registry.node_specs()
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        self.registry.commands()
    }

    pub(crate) fn validate_point(&self, point: &Point) -> Result<(), ApplyError> {
        let Some(leaf) = self.doc.leaf(&point.path) else {
            return Err(ApplyError::invalid_path(&point.path, "no text leaf"));
        };
        if point.offset > leaf.len() {
            return Err(ApplyError::InvalidPoint(point.clone()));
        }
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            doc: self.doc.clone(),
            selection: self.selection.clone(),
            marks: self.marks.clone(),
            keys: self.keys.clone(),
            pending_ops: self.pending.operations.len(),
            pending_marks_changed: self.pending.marks_changed,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.doc = snapshot.doc;
        self.selection = snapshot.selection;
        self.marks = snapshot.marks;
        self.keys = snapshot.keys;
        self.pending.operations.truncate(snapshot.pending_ops);
        self.pending.marks_changed = snapshot.pending_marks_changed;
    }

    fn commit(&mut self, batch: Batch) {
        if batch.ops.is_empty() {
            return;
        }

        let value_ops: Vec<Op> = batch
            .ops
            .iter()
            .filter(|op| !op.is_selection_op())
            .cloned()
            .collect();

        if !value_ops.is_empty() {
            self.revision += 1;
            if batch.record_history {
                self.undo_stack.push(UndoRecord {
                    ops: value_ops,
                    selection_before: batch.snapshot.selection.clone(),
                    selection_after: self.selection.clone(),
                    source: Some(batch.source.clone()),
                });
                self.redo_stack.clear();
                if self.undo_stack.len() > self.config.max_undo {
                    self.undo_stack.remove(0);
                }
            }
        }

        debug!(source = %batch.source, ops = batch.ops.len(), "batch committed");
        self.pending.operations.extend(batch.ops);
    }

    fn finish_batch(&mut self) -> Result<(), ApplyError> {
        self.normalize_dirty()?;
        self.registry.check_invariants(&self.doc)?;
        self.keys.collect_garbage(&self.doc);
        self.repair_selection()
    }

    fn normalize_dirty(&mut self) -> Result<(), ApplyError> {
        let dirty_count = self.batch.as_ref().map_or(0, |b| b.dirty.len());
        let budget = self
            .config
            .max_normalize_iterations
            .saturating_mul(dirty_count.max(1));
        let mut iterations = 0usize;

        while let Some(path) = self.pop_dirty() {
            if !self.doc.has_path(&path) {
                continue;
            }
            let ops = self.registry.normalize_node(&self.doc, &path);
            if ops.is_empty() {
                continue;
            }
            iterations += 1;
            if iterations > budget {
                return Err(ApplyError::NormalizeDidNotConverge(budget));
            }
            debug!(?path, repairs = ops.len(), "normalize");
            for op in ops {
                self.apply_operation(op)?;
            }
        }
        Ok(())
    }

    fn pop_dirty(&mut self) -> Option<Path> {
        let batch = self.batch.as_mut()?;
        let (ix, _) = batch
            .dirty
            .iter()
            .enumerate()
            .max_by_key(|(ix, p)| (p.len(), *ix))?;
        Some(batch.dirty.remove(ix))
    }

    fn repair_selection(&mut self) -> Result<(), ApplyError> {
        let lost = self.batch.as_ref().is_some_and(|b| b.selection_lost);
        let repaired = match &self.selection {
            Some(range) => {
                let anchor = self.clamp_point(&range.anchor);
                let focus = self.clamp_point(&range.focus);
                match (anchor, focus) {
                    (Some(anchor), Some(focus)) => Some(Range::new(anchor, focus)),
                    _ => self.first_point().map(Range::collapsed),
                }
            }
            None if lost => self.first_point().map(Range::collapsed),
            None => None,
        };
        if repaired != self.selection {
            trace!(?repaired, "selection clamped");
            self.set_selection(repaired)?;
        }
        Ok(())
    }

    /// The nearest valid point to `point`: the same leaf with the offset
    /// clamped, else the closest leaf at or under the path, else `None`.
    pub fn clamp_point(&self, point: &Point) -> Option<Point> {
        if let Some(leaf) = self.doc.leaf(&point.path) {
            return Some(Point::new(point.path.clone(), point.offset.min(leaf.len())));
        }

        let mut resolved: Path = Vec::new();
        let mut children: &[Node] = &self.doc.children;
        for &wanted in &point.path {
            if children.is_empty() {
                break;
            }
            let ix = wanted.min(children.len() - 1);
            resolved.push(ix);
            match &children[ix] {
                Node::Text(t) => {
                    return Some(Point::new(resolved, point.offset.min(t.len())));
                }
                Node::Element(el) => children = &el.children,
            }
        }
        self.doc
            .texts_under(&resolved)
            .into_iter()
            .next()
            .map(|(path, _)| Point::new(path, 0))
    }

    fn first_point(&self) -> Option<Point> {
        self.doc
            .texts()
            .into_iter()
            .next()
            .map(|(path, _)| Point::new(path, 0))
    }

    /// Where a selection edge inside the subtree at `removed` should land:
    /// the end of the previous leaf, else the start of the following one.
    fn removal_fallback(&self, removed: &[usize]) -> Option<Point> {
        let selection = self.selection.as_ref()?;
        let inside = |p: &Point| p.path.starts_with(removed);
        if !inside(&selection.anchor) && !inside(&selection.focus) {
            return None;
        }

        let texts = self.doc.texts();
        let before = texts.iter().rev().find(|(p, _)| {
            !p.starts_with(removed) && path::compare(p, removed) == std::cmp::Ordering::Less
        });
        if let Some((p, t)) = before {
            return Some(Point::new(p.clone(), t.len()));
        }

        let after = texts.iter().find(|(p, _)| {
            !p.starts_with(removed) && path::compare(p, removed) == std::cmp::Ordering::Greater
        })?;
        let op = Op::RemoveNode {
            path: removed.to_vec(),
            node: Node::text(""),
        };
        let moved = path::transform(&after.0, &op, Affinity::Forward)?;
        Some(Point::new(moved, 0))
    }

    fn transform_selection(&mut self, op: &Op, fallback: Option<Point>) {
        if let Op::SetSelection { new_properties, .. } = op {
            self.selection = new_properties.clone();
            if self.marks.take().is_some() {
                self.pending.marks_changed = true;
            }
            return;
        }

        let Some(selection) = self.selection.take() else {
            return;
        };
        let anchor = selection
            .anchor
            .transform(op, Affinity::Forward)
            .or_else(|| fallback.clone());
        let focus = selection
            .focus
            .transform(op, Affinity::Forward)
            .or(fallback);

        self.selection = match (anchor, focus) {
            (Some(anchor), Some(focus)) => Some(Range::new(anchor, focus)),
            _ => {
                if let Some(batch) = self.batch.as_mut() {
                    batch.selection_lost = true;
                }
                None
            }
        };
    }
}

fn split_last(path: &[usize]) -> Result<(usize, &[usize]), ApplyError> {
    path.split_last()
        .map(|(&last, parent)| (last, parent))
        .ok_or_else(|| ApplyError::invalid_path(path, "the root cannot be addressed"))
}

fn apply_op_to(doc: &mut Document, op: &Op) -> Result<(), ApplyError> {
    match op {
        Op::InsertNode { path, node } => {
            let (index, parent) = split_last(path)?;
            let children = doc.children_mut_at(parent)?;
            if index > children.len() {
                return Err(ApplyError::invalid_path(
                    path,
                    format!("insert index {index} > {}", children.len()),
                ));
            }
            children.insert(index, node.clone());
        }
        Op::RemoveNode { path, .. } => {
            let (index, parent) = split_last(path)?;
            let children = doc.children_mut_at(parent)?;
            if index >= children.len() {
                return Err(ApplyError::invalid_path(path, "remove index out of bounds"));
            }
            children.remove(index);
        }
        Op::MergeNode { path, .. } => {
            let (index, parent) = split_last(path)?;
            if index == 0 {
                return Err(ApplyError::invalid_path(path, "no previous sibling to merge into"));
            }
            let children = doc.children_mut_at(parent)?;
            if index >= children.len() {
                return Err(ApplyError::invalid_path(path, "merge index out of bounds"));
            }
            let compatible = matches!(
                (&children[index - 1], &children[index]),
                (Node::Text(_), Node::Text(_)) | (Node::Element(_), Node::Element(_))
            );
            if !compatible {
                return Err(ApplyError::invalid_path(path, "cannot merge text with element"));
            }
            let node = children.remove(index);
            match (&mut children[index - 1], node) {
                (Node::Text(prev), Node::Text(next)) => prev.text.push_str(&next.text),
                (Node::Element(prev), Node::Element(next)) => prev.children.extend(next.children),
                _ => {}
            }
        }
        Op::SplitNode {
            path,
            position,
            properties,
        } => {
            let (index, parent) = split_last(path)?;
            let children = doc.children_mut_at(parent)?;
            let Some(node) = children.get_mut(index) else {
                return Err(ApplyError::invalid_path(path, "split index out of bounds"));
            };
            let tail = match node {
                Node::Text(t) => {
                    if *position > t.len() {
                        return Err(ApplyError::InvalidPoint(Point::new(path.clone(), *position)));
                    }
                    let at = text::byte_offset(&t.text, *position);
                    Node::Text(TextNode {
                        text: t.text.split_off(at),
                        marks: properties.marks.clone().unwrap_or_else(|| t.marks.clone()),
                    })
                }
                Node::Element(el) => {
                    if *position > el.children.len() {
                        return Err(ApplyError::invalid_path(path, "split position out of bounds"));
                    }
                    let rest = el.children.split_off(*position);
                    let (kind, attrs) = match &properties.kind {
                        Some(kind) => (
                            kind.clone(),
                            properties
                                .attrs
                                .iter()
                                .filter(|(_, v)| !v.is_null())
                                .map(|(k, v)| (k.clone(), v.clone()))
                                .collect(),
                        ),
                        None => (el.kind.clone(), el.attrs.clone()),
                    };
                    Node::Element(ElementNode {
                        kind,
                        attrs,
                        children: rest,
                    })
                }
            };
            children.insert(index + 1, tail);
        }
        Op::SetNode {
            path,
            new_properties,
            ..
        } => {
            let node = doc.node_mut(path)?;
            new_properties.apply_to(node);
        }
        Op::MoveNode { path, new_path } => {
            if path == new_path {
                return Ok(());
            }
            if path::is_ancestor(path, new_path) {
                return Err(ApplyError::invalid_path(
                    new_path,
                    "cannot move a node into its own subtree",
                ));
            }
            let (index, parent) = split_last(path)?;
            let children = doc.children_mut_at(parent)?;
            if index >= children.len() {
                return Err(ApplyError::invalid_path(path, "move source out of bounds"));
            }
            let node = children.remove(index);
            let Some(target) = path::transform(path, op, Affinity::Forward) else {
                return Err(ApplyError::invalid_path(new_path, "move target vanished"));
            };
            let (target_index, target_parent) = split_last(&target)?;
            let children = doc.children_mut_at(target_parent)?;
            if target_index > children.len() {
                return Err(ApplyError::invalid_path(new_path, "move target out of bounds"));
            }
            children.insert(target_index, node);
        }
        Op::InsertText {
            path,
            offset,
            text: inserted,
        } => {
            let leaf = doc.text_mut(path)?;
            if *offset > leaf.len() {
                return Err(ApplyError::InvalidPoint(Point::new(path.clone(), *offset)));
            }
            text::insert_chars(&mut leaf.text, *offset, inserted);
        }
        Op::RemoveText {
            path,
            offset,
            text: removed,
        } => {
            let leaf = doc.text_mut(path)?;
            let count = removed.chars().count();
            if offset + count > leaf.len() {
                return Err(ApplyError::InvalidPoint(Point::new(path.clone(), offset + count)));
            }
            text::remove_chars(&mut leaf.text, *offset, count);
        }
        Op::SetSelection { .. } => {}
    }
    Ok(())
}
