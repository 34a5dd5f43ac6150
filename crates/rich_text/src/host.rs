//! The display surface an [`crate::Editable`] drives.
//!
//! Hosts see the document only as mounted views and text runs; every
//! coordinate they report is a [`HostPoint`] into that rendered structure.

use std::collections::{BTreeMap, HashSet};

use crate::view::{RenderPass, ViewNode, ViewTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostHandle(u64);

impl HostHandle {
    pub(crate) fn new(id: u64) -> Self {
        HostHandle(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

/// One rendered run inside a text view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId {
    pub text: HostHandle,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostNode {
    /// The editable root. Offsets count its top-level children.
    Editor,
    /// Offsets count child views.
    Element(HostHandle),
    /// Offsets count runs.
    Text(HostHandle),
    /// Offsets count characters of the run's host text.
    Run(RunId),
    /// Anything the editor does not manage.
    Foreign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostPoint {
    pub node: HostNode,
    pub offset: usize,
}

impl HostPoint {
    pub fn new(node: HostNode, offset: usize) -> Self {
        Self { node, offset }
    }

    pub fn run(run: RunId, offset: usize) -> Self {
        Self::new(HostNode::Run(run), offset)
    }
}

/// A host range in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostRange {
    pub start: HostPoint,
    pub end: HostPoint,
}

impl HostRange {
    pub fn collapsed(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostSelection {
    pub anchor: HostPoint,
    pub focus: HostPoint,
}

impl HostSelection {
    pub fn collapsed(point: HostPoint) -> Self {
        Self {
            anchor: point,
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

pub trait HostSurface {
    fn selection(&self) -> Option<HostSelection>;

    /// Base/extent order: a backward range passes its end as `anchor`.
    fn set_selection(&mut self, anchor: HostPoint, focus: HostPoint);

    fn collapse_selection_to_end(&mut self);

    fn clear_selection(&mut self);

    fn is_focused(&self) -> bool;

    fn focus(&mut self);

    fn blur(&mut self);

    /// Mounts, unmounts and rewrites views after a render pass.
    fn apply_render(&mut self, pass: &RenderPass, view: &ViewTree);

    /// The run's text as the host currently displays it.
    fn run_text(&self, run: RunId) -> Option<String>;

    fn scroll_into_view(&mut self, _range: &HostRange) {}

    /// Whether the host can insert `ch` at `offset` natively without
    /// corrupting its own view. `None` when it cannot tell.
    fn native_insert_supported(&self, _ch: char, _offset: usize) -> Option<bool> {
        None
    }

    /// The placeholder appeared or went away; the host should re-measure.
    fn resized(&mut self) {}
}

/// A headless host that keeps run text in memory and records every render.
#[derive(Debug, Default)]
pub struct MemoryHost {
    runs: BTreeMap<RunId, String>,
    selection: Option<HostSelection>,
    focused: bool,
    native_insert: Option<bool>,
    passes: Vec<RenderPass>,
    scrolls: Vec<HostRange>,
    selection_writes: usize,
    resizes: usize,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `supported` for every native insert query.
    pub fn with_native_insert(mut self, supported: Option<bool>) -> Self {
        self.native_insert = supported;
        self
    }

    pub fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    pub fn last_pass(&self) -> Option<&RenderPass> {
        self.passes.last()
    }

    pub fn scrolls(&self) -> &[HostRange] {
        &self.scrolls
    }

    /// How many times the engine moved the host selection.
    pub fn selection_writes(&self) -> usize {
        self.selection_writes
    }

    pub fn resizes(&self) -> usize {
        self.resizes
    }

    /// Concatenated host text of every run of a text view.
    pub fn text_of(&self, text: HostHandle) -> String {
        self.runs
            .range(RunId { text, index: 0 }..=RunId { text, index: usize::MAX })
            .map(|(_, s)| s.as_str())
            .collect()
    }

    /// Simulates the user placing the selection.
    pub fn select(&mut self, anchor: HostPoint, focus: HostPoint) {
        self.selection = Some(HostSelection { anchor, focus });
    }

    /// Simulates a native keystroke at a collapsed selection inside a run.
    /// Returns false when there is nowhere to type.
    pub fn type_char(&mut self, ch: char) -> bool {
        let Some(selection) = self.selection.filter(HostSelection::is_collapsed) else {
            return false;
        };
        let HostNode::Run(run) = selection.focus.node else {
            return false;
        };
        let Some(text) = self.runs.get_mut(&run) else {
            return false;
        };
        let at = text
            .char_indices()
            .nth(selection.focus.offset)
            .map_or(text.len(), |(ix, _)| ix);
        text.insert(at, ch);
        let caret = HostPoint::run(run, selection.focus.offset + 1);
        self.selection = Some(HostSelection::collapsed(caret));
        true
    }

    fn writes_text(pass: &RenderPass, text: HostHandle, fresh: &HashSet<HostHandle>) -> bool {
        fresh.contains(&text) || pass.updated.contains(&text)
    }
}

impl HostSurface for MemoryHost {
    fn selection(&self) -> Option<HostSelection> {
        self.selection
    }

    fn set_selection(&mut self, anchor: HostPoint, focus: HostPoint) {
        self.selection_writes += 1;
        self.selection = Some(HostSelection { anchor, focus });
    }

    fn collapse_selection_to_end(&mut self) {
        if let Some(selection) = self.selection.as_mut() {
            selection.anchor = selection.focus;
        }
    }

    fn clear_selection(&mut self) {
        self.selection = None;
    }

    fn is_focused(&self) -> bool {
        self.focused
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn blur(&mut self) {
        self.focused = false;
    }

    fn apply_render(&mut self, pass: &RenderPass, view: &ViewTree) {
        let gone: HashSet<HostHandle> = pass.unmounted.iter().copied().collect();
        self.runs.retain(|run, _| !gone.contains(&run.text));

        let mut fresh = HashSet::new();
        for root in &pass.mounted {
            if let Some(node) = view.find(*root) {
                node.walk(&mut |n| {
                    fresh.insert(n.handle());
                });
            }
        }

        view.walk(&mut |node| {
            let ViewNode::Text(text) = node else {
                return;
            };
            if !Self::writes_text(pass, text.handle, &fresh) {
                return;
            }
            self.runs.retain(|run, _| run.text != text.handle);
            for run in &text.runs {
                self.runs.insert(run.id, run.host_text());
            }
        });

        let lost = self.selection.is_some_and(|s| {
            [s.anchor.node, s.focus.node].into_iter().any(|node| match node {
                HostNode::Run(run) => !self.runs.contains_key(&run),
                HostNode::Element(h) | HostNode::Text(h) => gone.contains(&h),
                HostNode::Editor | HostNode::Foreign => false,
            })
        });
        if lost {
            self.selection = None;
        }

        self.passes.push(pass.clone());
    }

    fn run_text(&self, run: RunId) -> Option<String> {
        self.runs.get(&run).cloned()
    }

    fn scroll_into_view(&mut self, range: &HostRange) {
        self.scrolls.push(*range);
    }

    fn native_insert_supported(&self, _ch: char, _offset: usize) -> Option<bool> {
        self.native_insert
    }

    fn resized(&mut self) {
        self.resizes += 1;
    }
}
