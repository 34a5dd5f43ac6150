use canvas_plate_core::{Editor, Path, Point, Range};

use crate::error::BridgeError;
use crate::host::{HostHandle, HostNode, HostPoint, HostRange, HostSelection, RunId};
use crate::view::{Run, RunKind, TextView, ViewNode, ViewRenderer};

/// A host range plus the direction the document range runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostTarget {
    pub range: HostRange,
    pub backward: bool,
}

impl HostTarget {
    /// Base and extent, in the order the host should receive them.
    pub fn base_extent(&self) -> (HostPoint, HostPoint) {
        if self.backward {
            (self.range.end, self.range.start)
        } else {
            (self.range.start, self.range.end)
        }
    }
}

/// Maps document points to host points and back over one render.
#[derive(Debug, Clone, Copy)]
pub struct SelectionBridge<'a> {
    pub editor: &'a Editor,
    pub view: &'a ViewRenderer,
}

impl<'a> SelectionBridge<'a> {
    pub fn new(editor: &'a Editor, view: &'a ViewRenderer) -> Self {
        Self { editor, view }
    }

    pub fn point_to_host(&self, point: &Point) -> Result<HostPoint, BridgeError> {
        let offset = if self.editor.is_in_void(&point.path) {
            0
        } else {
            point.offset
        };
        let text = self
            .view
            .handle_at(self.editor, &point.path)
            .and_then(|handle| self.view.text_view(handle))
            .ok_or_else(|| BridgeError::InvalidPoint(point.clone()))?;

        let mut start = 0;
        let runs: Vec<&Run> = text.runs.iter().filter(|run| run.is_editable()).collect();
        for (ix, run) in runs.iter().enumerate() {
            let end = start + run.doc_len();
            if offset <= end {
                if offset == end {
                    if let Some(next) = runs.get(ix + 1).filter(|next| next.is_mark_placeholder()) {
                        return Ok(HostPoint::run(next.id, 1));
                    }
                }
                let within = (offset - start).min(run.host_len());
                return Ok(HostPoint::run(run.id, within));
            }
            start = end;
        }
        Err(BridgeError::InvalidPoint(point.clone()))
    }

    /// Zero-width edges land after the padding character.
    pub fn range_to_host(&self, range: &Range) -> Result<HostTarget, BridgeError> {
        let (start, end) = range.edges();
        let start = self.edge_to_host(start)?;
        let end = self.edge_to_host(end)?;
        Ok(HostTarget {
            range: HostRange { start, end },
            backward: range.is_backward(),
        })
    }

    fn edge_to_host(&self, point: &Point) -> Result<HostPoint, BridgeError> {
        let host = self.point_to_host(point)?;
        match host.node {
            HostNode::Run(run) if self.run(run).is_some_and(Run::is_zero_width) => {
                Ok(HostPoint::run(run, 1))
            }
            _ => Ok(host),
        }
    }

    /// Resolves a host coordinate. Without `exact`, element and text
    /// coordinates are first moved to the nearest run, and a coordinate that
    /// still finds no run falls back to the nearest addressable ancestor.
    pub fn host_to_point(&self, point: &HostPoint, exact: bool) -> Result<Point, BridgeError> {
        let (run_id, run_offset) = match point.node {
            HostNode::Foreign => return Err(BridgeError::UnresolvableHostSelection),
            HostNode::Run(run) => (run, point.offset),
            HostNode::Text(_) | HostNode::Element(_) | HostNode::Editor if exact => {
                return Err(BridgeError::UnresolvableHostSelection);
            }
            node => match self.nearest_run(node, point.offset) {
                Some(found) => found,
                None => return self.ancestor_point(node),
            },
        };

        let text = self.text(run_id.text)?;
        let path = self.path_of(run_id.text)?;
        let Some(run) = text.run(run_id.index) else {
            return Err(BridgeError::UnresolvableHostSelection);
        };
        if self.editor.is_in_void(&path) {
            return Ok(Point::new(path, 0));
        }

        let before: usize = text.runs[..run_id.index]
            .iter()
            .filter(|run| !run.is_zero_width() && run.is_editable())
            .map(Run::doc_len)
            .sum();
        let within = match run.kind {
            RunKind::String { .. } => run_offset.min(run.doc_len()),
            _ => 0,
        };
        let len = self.editor.doc().leaf(&path).map_or(0, |leaf| leaf.len());
        Ok(Point::new(path, (before + within).min(len)))
    }

    /// A focus on a non-editable placeholder run snaps to the end of the
    /// anchor's run.
    pub fn host_to_range(
        &self,
        selection: &HostSelection,
        exact: bool,
    ) -> Result<Range, BridgeError> {
        let focus = match selection.focus.node {
            HostNode::Run(run) if self.run(run).is_some_and(|r| !r.is_editable()) => {
                let end = match selection.anchor.node {
                    HostNode::Run(anchor) => self.run(anchor).map_or(0, Run::host_len),
                    _ => selection.anchor.offset,
                };
                HostPoint::new(selection.anchor.node, end)
            }
            _ => selection.focus,
        };
        let anchor = self.host_to_point(&selection.anchor, exact)?;
        let focus = if focus == selection.anchor {
            anchor.clone()
        } else {
            self.host_to_point(&focus, exact)?
        };
        Ok(Range::new(anchor, focus))
    }

    /// The node is mounted, editable, and not part of a void's spacer.
    pub fn has_editable_target(&self, node: &HostNode) -> bool {
        match node {
            HostNode::Editor => true,
            HostNode::Foreign => false,
            HostNode::Run(run) => {
                self.run(*run).is_some_and(Run::is_editable)
                    && self.path_of(run.text).is_ok_and(|p| !self.editor.is_in_void(&p))
            }
            HostNode::Element(handle) | HostNode::Text(handle) => {
                self.path_of(*handle).is_ok_and(|p| !self.editor.is_in_void(&p))
            }
        }
    }

    /// The node resolves at all, editable or not.
    pub fn has_target(&self, node: &HostNode) -> bool {
        match node {
            HostNode::Editor => true,
            HostNode::Foreign => false,
            HostNode::Run(run) => self.run(*run).is_some(),
            HostNode::Element(handle) | HostNode::Text(handle) => self.path_of(*handle).is_ok(),
        }
    }

    pub fn is_target_inside_non_readonly_void(&self, node: &HostNode, read_only: bool) -> bool {
        if read_only {
            return false;
        }
        let handle = match node {
            HostNode::Run(run) => run.text,
            HostNode::Element(handle) | HostNode::Text(handle) => *handle,
            HostNode::Editor | HostNode::Foreign => return false,
        };
        self.path_of(handle).is_ok_and(|p| self.editor.is_in_void(&p))
    }

    fn path_of(&self, handle: HostHandle) -> Result<Path, BridgeError> {
        self.view
            .tables()
            .find_path(handle)
            .ok_or(BridgeError::Unmounted(handle))
    }

    fn text(&self, handle: HostHandle) -> Result<&'a TextView, BridgeError> {
        self.view
            .text_view(handle)
            .ok_or(BridgeError::Unmounted(handle))
    }

    fn run(&self, id: RunId) -> Option<&'a Run> {
        self.view.text_view(id.text)?.run(id.index)
    }

    fn children_of(&self, node: HostNode) -> Option<&'a [ViewNode]> {
        match node {
            HostNode::Editor => Some(&self.view.view().children),
            HostNode::Element(handle) => {
                let path = self.path_of(handle).ok()?;
                Some(self.view.view().node(&path)?.children())
            }
            _ => None,
        }
    }

    /// Moves an element or text coordinate onto a run: the first run of the
    /// child after the offset, else the end of the last run before it.
    fn nearest_run(&self, node: HostNode, offset: usize) -> Option<(RunId, usize)> {
        if let HostNode::Text(handle) = node {
            let text = self.view.text_view(handle)?;
            return match text.runs.get(offset) {
                Some(run) => Some((run.id, 0)),
                None => text.runs.last().map(|run| (run.id, run.host_len())),
            };
        }

        let children = self.children_of(node)?;
        if let Some(child) = children.get(offset) {
            if let Some(run) = first_run(child) {
                return Some((run.id, 0));
            }
        }
        let before = offset.checked_sub(1).and_then(|ix| children.get(ix))?;
        last_run(before).map(|run| (run.id, run.host_len()))
    }

    fn ancestor_point(&self, node: HostNode) -> Result<Point, BridgeError> {
        let path = match node {
            HostNode::Element(handle) | HostNode::Text(handle) => self.path_of(handle)?,
            HostNode::Editor => Vec::new(),
            _ => return Err(BridgeError::UnresolvableHostSelection),
        };
        self.editor
            .start(&path)
            .ok_or(BridgeError::UnresolvableHostSelection)
    }
}

fn first_run(node: &ViewNode) -> Option<&Run> {
    match node {
        ViewNode::Text(text) => text.runs.iter().find(|run| run.is_editable()),
        ViewNode::Element(el) => el.children.iter().find_map(first_run),
    }
}

fn last_run(node: &ViewNode) -> Option<&Run> {
    match node {
        ViewNode::Text(text) => text.runs.iter().rev().find(|run| run.is_editable()),
        ViewNode::Element(el) => el.children.iter().rev().find_map(last_run),
    }
}
