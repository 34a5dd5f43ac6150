use crate::core::Editor;
use crate::node::{ElementNode, Marks};
use crate::path::{self, Path};
use crate::point::{Point, Range};
use crate::text;
use crate::transforms::Unit;

/// Stands in for a void inline when a block's text is scanned for words.
const VOID_CHAR: char = '\u{FFFC}';

/// One addressable stretch of a block's content. A void inline is a single
/// unit-wide segment however much text it holds.
#[derive(Debug, Clone)]
struct Segment {
    path: Path,
    start: usize,
    len: usize,
    void: bool,
}

impl Segment {
    fn end(&self) -> usize {
        self.start + self.len
    }
}

impl Editor {
    pub fn is_void(&self, el: &ElementNode) -> bool {
        self.registry().is_void(el)
    }

    pub fn is_inline(&self, el: &ElementNode) -> bool {
        self.registry().is_inline(el)
    }

    /// Both edges resolve to a text leaf with an in-bounds offset.
    pub fn has_range(&self, range: &Range) -> bool {
        [&range.anchor, &range.focus]
            .into_iter()
            .all(|point| self.validate_point(point).is_ok())
    }

    /// First point inside the node at `path` (`[]` is the document).
    pub fn start(&self, at: &[usize]) -> Option<Point> {
        let texts = self.doc().texts_under(at);
        let (path, _) = texts.first()?;
        Some(Point::new(path.clone(), 0))
    }

    /// Last point inside the node at `path`.
    pub fn end(&self, at: &[usize]) -> Option<Point> {
        let texts = self.doc().texts_under(at);
        let (path, leaf) = texts.last()?;
        Some(Point::new(path.clone(), leaf.len()))
    }

    pub fn range_of(&self, at: &[usize]) -> Option<Range> {
        Some(Range::new(self.start(at)?, self.end(at)?))
    }

    /// The lowest block element strictly above `at`.
    pub fn block_above(&self, at: &[usize]) -> Option<(Path, &ElementNode)> {
        self.element_above(at, false, |editor, el| !editor.is_inline(el))
    }

    /// The lowest void element at or above `at`.
    pub fn void_above(&self, at: &[usize]) -> Option<(Path, &ElementNode)> {
        self.element_above(at, true, |editor, el| editor.is_void(el))
    }

    /// The lowest inline element at or above `at`.
    pub fn inline_above(&self, at: &[usize]) -> Option<(Path, &ElementNode)> {
        self.element_above(at, true, |editor, el| editor.is_inline(el))
    }

    fn element_above(
        &self,
        at: &[usize],
        include_self: bool,
        matches: impl Fn(&Self, &ElementNode) -> bool,
    ) -> Option<(Path, &ElementNode)> {
        let levels = path::levels(at);
        let skip_self = usize::from(!include_self);
        levels
            .into_iter()
            .skip(1)
            .rev()
            .skip(skip_self)
            .find_map(|p| {
                let el = self.doc().element(&p)?;
                matches(self, el).then_some((p, el))
            })
    }

    /// Marks the next insertion will carry: the pending marks, else those of
    /// the leaf under the anchor.
    pub fn marks(&self) -> Marks {
        if let Some(marks) = self.pending_marks() {
            return marks.clone();
        }
        self.selection()
            .and_then(|range| self.doc().leaf(&range.anchor.path))
            .map(|leaf| leaf.marks.clone())
            .unwrap_or_default()
    }

    /// The point one `unit` before `point`. Crossing a block boundary costs
    /// one step. `None` at the start of the document.
    pub fn before(&self, point: &Point, unit: Unit) -> Option<Point> {
        let (block_path, segments) = self.block_segments(point)?;
        let offset = block_offset(&segments, point);

        if offset == 0 {
            return self.end_before_block(&block_path);
        }

        let target = match unit {
            Unit::Character => {
                let seg = segments
                    .iter()
                    .find(|s| s.len > 0 && s.start < offset && s.end() >= offset)?;
                if seg.void {
                    return Some(Point::new(seg.path.clone(), 0));
                }
                let leaf = self.doc().leaf(&seg.path)?;
                let local = text::grapheme_before(&leaf.text, offset - seg.start);
                return Some(Point::new(seg.path.clone(), local));
            }
            Unit::Word => text::word_start_before(&self.block_text(&segments), offset),
            Unit::Line | Unit::Block => 0,
        };
        resolve_offset(&segments, target)
    }

    /// The point one `unit` after `point`. `None` at the end of the document.
    pub fn after(&self, point: &Point, unit: Unit) -> Option<Point> {
        let (block_path, segments) = self.block_segments(point)?;
        let offset = block_offset(&segments, point);
        let block_len = segments.last().map_or(0, Segment::end);

        if offset >= block_len {
            return self.start_after_block(&block_path);
        }

        let target = match unit {
            Unit::Character => {
                let seg = segments
                    .iter()
                    .find(|s| s.len > 0 && s.start <= offset && s.end() > offset)?;
                if !seg.void {
                    let leaf = self.doc().leaf(&seg.path)?;
                    let local = text::grapheme_after(&leaf.text, offset - seg.start);
                    return Some(Point::new(seg.path.clone(), local));
                }
                offset + 1
            }
            Unit::Word => text::word_end_after(&self.block_text(&segments), offset),
            Unit::Line | Unit::Block => block_len,
        };
        resolve_offset(&segments, target)
    }

    /// The lowest block around `point` and its content split into segments.
    /// A void block has no segments.
    fn block_segments(&self, point: &Point) -> Option<(Path, Vec<Segment>)> {
        let (block_path, block) = self.block_above(&point.path)?;
        if self.is_void(block) {
            return Some((block_path, Vec::new()));
        }

        let mut segments: Vec<Segment> = Vec::new();
        let mut cursor = 0;
        let mut last_void: Option<Path> = None;
        for (leaf_path, leaf) in self.doc().texts_under(&block_path) {
            match self.void_above(&leaf_path) {
                Some((void_path, _)) => {
                    if last_void.as_ref() == Some(&void_path) {
                        continue;
                    }
                    segments.push(Segment {
                        path: leaf_path,
                        start: cursor,
                        len: 1,
                        void: true,
                    });
                    cursor += 1;
                    last_void = Some(void_path);
                }
                None => {
                    segments.push(Segment {
                        path: leaf_path,
                        start: cursor,
                        len: leaf.len(),
                        void: false,
                    });
                    cursor += leaf.len();
                }
            }
        }
        Some((block_path, segments))
    }

    fn block_text(&self, segments: &[Segment]) -> String {
        segments
            .iter()
            .map(|seg| {
                if seg.void {
                    VOID_CHAR.to_string()
                } else {
                    self.doc()
                        .leaf(&seg.path)
                        .map(|leaf| leaf.text.clone())
                        .unwrap_or_default()
                }
            })
            .collect()
    }

    fn end_before_block(&self, block_path: &[usize]) -> Option<Point> {
        self.doc()
            .texts()
            .into_iter()
            .rev()
            .find(|(p, _)| path::compare(p, block_path).is_lt())
            .map(|(p, leaf)| Point::new(p, leaf.len()))
    }

    fn start_after_block(&self, block_path: &[usize]) -> Option<Point> {
        self.doc()
            .texts()
            .into_iter()
            .find(|(p, _)| path::compare(p, block_path).is_gt())
            .map(|(p, _)| Point::new(p, 0))
    }

    /// Whether the node at `at` is a void element or sits inside one.
    pub fn is_in_void(&self, at: &[usize]) -> bool {
        self.void_above(at).is_some()
    }
}

fn block_offset(segments: &[Segment], point: &Point) -> usize {
    segments
        .iter()
        .find(|seg| seg.path == point.path)
        .map_or(0, |seg| {
            if seg.void {
                seg.start
            } else {
                seg.start + point.offset.min(seg.len)
            }
        })
}

/// Maps a block offset back to a point, preferring the earliest text
/// segment that contains it.
fn resolve_offset(segments: &[Segment], offset: usize) -> Option<Point> {
    segments
        .iter()
        .find(|seg| !seg.void && seg.start <= offset && seg.end() >= offset)
        .map(|seg| Point::new(seg.path.clone(), offset - seg.start))
        .or_else(|| {
            segments
                .iter()
                .find(|seg| seg.start <= offset && seg.end() >= offset)
                .map(|seg| Point::new(seg.path.clone(), 0))
        })
}
