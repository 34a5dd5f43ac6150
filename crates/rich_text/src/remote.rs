use canvas_plate_core::{Editor, Key, Point, Range};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decorate::{Decoration, DecorationKind};

/// A point addressed by leaf identity instead of path, so it survives
/// structural edits that shift paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativePoint {
    pub key: Key,
    pub offset: usize,
}

impl RelativePoint {
    pub fn from_point(editor: &Editor, point: &Point) -> Option<Self> {
        Some(Self {
            key: editor.keys().key(&point.path)?,
            offset: point.offset,
        })
    }

    /// The current point for this position, with the offset clamped to the
    /// leaf. `None` once the leaf is gone.
    pub fn to_point(&self, editor: &Editor) -> Option<Point> {
        let path = editor.keys().path_of(self.key)?;
        let leaf = editor.doc().leaf(&path)?;
        Some(Point::new(path, self.offset.min(leaf.len())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeRange {
    pub anchor: RelativePoint,
    pub focus: RelativePoint,
}

impl RelativeRange {
    pub fn from_range(editor: &Editor, range: &Range) -> Option<Self> {
        Some(Self {
            anchor: RelativePoint::from_point(editor, &range.anchor)?,
            focus: RelativePoint::from_point(editor, &range.focus)?,
        })
    }

    pub fn to_range(&self, editor: &Editor) -> Option<Range> {
        Some(Range::new(
            self.anchor.to_point(editor)?,
            self.focus.to_point(editor)?,
        ))
    }
}

/// A collaborator's cursor as the transport delivers it. `data` is opaque
/// presentation state such as a name and color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCursor {
    pub client_id: u64,
    #[serde(default)]
    pub data: Value,
    pub selection: Option<RelativeRange>,
}

/// Projected remote ranges, recomputed only when the document revision or
/// the cursor set changes.
#[derive(Debug, Clone, Default)]
pub struct RemoteCursorCache {
    revision: Option<u64>,
    cursors: Vec<RemoteCursor>,
    projected: Vec<(u64, Range)>,
}

impl RemoteCursorCache {
    pub fn project(&mut self, editor: &Editor, cursors: &[RemoteCursor]) -> &[(u64, Range)] {
        let stale = self.revision != Some(editor.revision()) || self.cursors != cursors;
        if stale {
            self.projected = cursors
                .iter()
                .filter_map(|cursor| {
                    let range = cursor.selection.as_ref()?.to_range(editor)?;
                    Some((cursor.client_id, range))
                })
                .collect();
            self.revision = Some(editor.revision());
            self.cursors = cursors.to_vec();
        }
        &self.projected
    }

    pub fn invalidate(&mut self) {
        self.revision = None;
    }
}

/// A caret decoration per cursor plus a selection decoration for each
/// expanded one.
pub fn remote_decorations(
    editor: &Editor,
    cache: &mut RemoteCursorCache,
    cursors: &[RemoteCursor],
) -> Vec<Decoration> {
    let mut out = Vec::new();
    for (client_id, range) in cache.project(editor, cursors) {
        if range.is_expanded() {
            out.push(Decoration::new(
                range.clone(),
                DecorationKind::RemoteSelection {
                    client_id: *client_id,
                },
            ));
        }
        out.push(Decoration::new(
            Range::collapsed(range.focus.clone()),
            DecorationKind::RemoteCaret {
                client_id: *client_id,
            },
        ));
    }
    out
}
