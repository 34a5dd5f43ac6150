use canvas_plate_core::{Editor, Marks, Point, Range};

#[derive(Debug, Clone, PartialEq)]
pub enum DecorationKind {
    /// Empty-document placeholder.
    Placeholder,
    /// Preview of marks toggled at the caret but not yet typed.
    PendingMarks(Marks),
    RemoteCaret { client_id: u64 },
    RemoteSelection { client_id: u64 },
    Custom(String),
}

/// A presentation-only range. Never stored in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoration {
    pub range: Range,
    pub kind: DecorationKind,
}

impl Decoration {
    pub fn new(range: Range, kind: DecorationKind) -> Self {
        Self { range, kind }
    }
}

/// The part of a decoration that falls inside one text leaf, in char offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeafDecoration<'a> {
    pub start: usize,
    pub end: usize,
    pub kind: &'a DecorationKind,
}

impl LeafDecoration<'_> {
    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecorationSet {
    items: Vec<Decoration>,
}

impl DecorationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, decoration: Decoration) {
        self.items.push(decoration);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decoration> {
        self.items.iter()
    }

    /// Intersects every decoration with the leaf at `path` (`len` chars long).
    pub fn for_text(&self, path: &[usize], len: usize) -> Vec<LeafDecoration<'_>> {
        let leaf_start = Point::new(path.to_vec(), 0);
        let leaf_end = Point::new(path.to_vec(), len);
        self.items
            .iter()
            .filter_map(|decoration| {
                let (start, end) = decoration.range.edges();
                if end.is_before(&leaf_start) || start.is_after(&leaf_end) {
                    return None;
                }
                let start = if start.path == path {
                    start.offset.min(len)
                } else {
                    0
                };
                let end = if end.path == path { end.offset.min(len) } else { len };
                Some(LeafDecoration {
                    start,
                    end,
                    kind: &decoration.kind,
                })
            })
            .collect()
    }
}

impl Extend<Decoration> for DecorationSet {
    fn extend<T: IntoIterator<Item = Decoration>>(&mut self, iter: T) {
        self.items.extend(iter);
    }
}

impl FromIterator<Decoration> for DecorationSet {
    fn from_iter<T: IntoIterator<Item = Decoration>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Result of one decoration pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decorated {
    pub set: DecorationSet,
    pub has_mark_placeholder: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DecorationEngine {
    placeholder: Option<String>,
}

impl DecorationEngine {
    pub fn new(placeholder: Option<String>) -> Self {
        Self { placeholder }
    }

    pub fn placeholder(&self) -> Option<&str> {
        self.placeholder.as_deref()
    }

    pub fn compute(&self, editor: &Editor, composing: bool, external: &[Decoration]) -> Decorated {
        let mut out = Decorated::default();

        if self.placeholder.is_some()
            && !composing
            && editor.doc().children.len() == 1
            && is_single_empty_text(editor)
        {
            if let Some(start) = editor.start(&[]) {
                out.set
                    .push(Decoration::new(Range::collapsed(start), DecorationKind::Placeholder));
            }
        }

        if let Some(decoration) = pending_marks_preview(editor) {
            out.set.push(decoration);
            out.has_mark_placeholder = true;
        }

        out.set.extend(external.iter().cloned());
        out
    }
}

fn is_single_empty_text(editor: &Editor) -> bool {
    let texts = editor.doc().texts();
    texts.len() == 1 && texts.iter().all(|(_, leaf)| leaf.is_empty())
}

fn pending_marks_preview(editor: &Editor) -> Option<Decoration> {
    let selection = editor.selection().filter(|range| range.is_collapsed())?;
    let marks = editor.pending_marks()?;
    let leaf = editor.doc().leaf(&selection.anchor.path)?;
    if &leaf.marks == marks {
        return None;
    }
    Some(Decoration::new(
        Range::collapsed(selection.anchor.clone()),
        DecorationKind::PendingMarks(marks.clone()),
    ))
}

/// Marks a composition ending now should be typed with: the pending marks,
/// when they differ from those of the leaf under the anchor.
pub fn update_pending_insertion_marks(editor: &Editor) -> Option<Marks> {
    let anchor = &editor.selection()?.anchor;
    let marks = editor.pending_marks()?;
    let leaf = editor.doc().leaf(&anchor.path)?;
    (&leaf.marks != marks).then(|| marks.clone())
}
