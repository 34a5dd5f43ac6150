//! Diff-based input for hosts whose per-keystroke events are unreliable.
//!
//! The host reports what changed in a text view as [`TextDiff`]s. Each diff
//! is relative to the leaf text with the earlier queued diffs applied. The
//! queue holds one merged diff per leaf, replayed as remove/insert ops when
//! flushed.

use canvas_plate_core::{ApplyError, Editor, Op, Path, Point, Range, text};
use similar::{DiffTag, TextDiff as CharDiff};
use tracing::{debug, trace};

/// Replace chars `start..end` of a leaf with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringDiff {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl StringDiff {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            start: at,
            end: at,
            text: text.into(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.start == self.end && self.text.is_empty()
    }

    pub fn apply(&self, s: &str) -> String {
        let len = text::char_len(s);
        let end = self.end.min(len);
        let start = self.start.min(end);
        let mut out = String::with_capacity(s.len() + self.text.len());
        out.push_str(text::slice_chars(s, 0, start));
        out.push_str(&self.text);
        out.push_str(text::slice_chars(s, end, len));
        out
    }
}

/// One diff equivalent to applying `first` then `second` to `base`, or `None`
/// when the two cancel out.
pub fn merge_string_diffs(
    base: &str,
    first: &StringDiff,
    second: &StringDiff,
) -> Option<StringDiff> {
    diff_from_text(base, &second.apply(&first.apply(base)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDiff {
    pub path: Path,
    pub diff: StringDiff,
}

impl TextDiff {
    pub fn new(path: Path, diff: StringDiff) -> Self {
        Self { path, diff }
    }
}

/// The smallest single replacement turning `last` into `current`.
pub fn diff_from_text(last: &str, current: &str) -> Option<StringDiff> {
    let diff = CharDiff::from_chars(last, current);
    let changed: Vec<_> = diff
        .ops()
        .iter()
        .filter(|op| op.tag() != DiffTag::Equal)
        .collect();
    let (first, last_op) = (changed.first()?, changed.last()?);

    let start = first.old_range().start;
    let end = last_op.old_range().end;
    let new_start = first.new_range().start;
    let new_end = last_op.new_range().end;
    Some(StringDiff {
        start,
        end,
        text: text::slice_chars(current, new_start, new_end).to_string(),
    })
}

#[derive(Debug, Default)]
pub struct ImeReconciler {
    diffs: Vec<TextDiff>,
    flush_requested: bool,
    composing: bool,
    pending_selection: Option<Range>,
}

impl ImeReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `diff`, folding it into the pending diff of the same leaf.
    pub fn queue(&mut self, editor: &Editor, diff: TextDiff) {
        if diff.diff.is_noop() {
            return;
        }
        trace!(path = ?diff.path, diff = ?diff.diff, "queue diff");
        let existing = self.diffs.iter().position(|pending| pending.path == diff.path);
        let (Some(ix), Some(leaf)) = (existing, editor.doc().leaf(&diff.path)) else {
            self.diffs.push(diff);
            return;
        };
        match merge_string_diffs(&leaf.text, &self.diffs[ix].diff, &diff.diff) {
            Some(merged) => self.diffs[ix].diff = merged,
            None => {
                self.diffs.remove(ix);
            }
        }
    }

    pub fn pending(&self) -> &[TextDiff] {
        &self.diffs
    }

    /// `base` with the pending diff for `path` applied.
    pub fn pending_text(&self, path: &[usize], base: &str) -> String {
        match self.diffs.iter().find(|pending| pending.path == path) {
            Some(pending) => pending.diff.apply(base),
            None => base.to_string(),
        }
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }

    pub fn has_pending_action(&self) -> bool {
        !self.diffs.is_empty() || self.flush_requested
    }

    /// Whether a queued insertion just completed a shortcut trigger at the
    /// start of its block: it ends in a space and the text before that space
    /// is one of `triggers`.
    pub fn evaluate_early_flush(&self, editor: &Editor, triggers: &[String]) -> bool {
        self.diffs.iter().any(|TextDiff { path, diff }| {
            let Some(typed) = diff.text.strip_suffix(' ') else {
                return false;
            };
            let Some(leaf) = editor.doc().leaf(path) else {
                return false;
            };
            let before = format!("{}{}", text::slice_chars(&leaf.text, 0, diff.start), typed);
            if !triggers.iter().any(|trigger| *trigger == before) {
                return false;
            }
            let Some((block_path, _)) = editor.block_above(path) else {
                return false;
            };
            editor.start(&block_path) == Some(Point::new(path.clone(), 0))
        })
    }

    /// Returns false when a flush is already pending; repeated requests
    /// coalesce into that one.
    pub fn request_flush(&mut self) -> bool {
        if self.flush_requested {
            debug!("flush already pending; request coalesced");
            return false;
        }
        self.flush_requested = true;
        true
    }

    pub fn flush_requested(&self) -> bool {
        self.flush_requested
    }

    /// Replays the queue in one batch. A selection the user made while diffs
    /// were pending wins over the caret after the last replacement.
    pub fn flush(&mut self, editor: &mut Editor) -> Result<bool, ApplyError> {
        self.flush_requested = false;
        let diffs = std::mem::take(&mut self.diffs);
        let selection = self.pending_selection.take();
        if diffs.is_empty() {
            if let Some(range) = selection {
                editor.select(range)?;
            }
            return Ok(false);
        }

        debug!(count = diffs.len(), "flushing text diffs");
        editor.batch("ime:flush", |editor| {
            let mut caret = None;
            for TextDiff { path, diff } in diffs {
                let Some(leaf) = editor.doc().leaf(&path) else {
                    return Err(ApplyError::InvalidPath {
                        path,
                        reason: "diff target is not a text leaf".to_string(),
                    });
                };
                let end = diff.end.min(leaf.len());
                let start = diff.start.min(end);
                let removed = text::slice_chars(&leaf.text, start, end).to_string();
                if !removed.is_empty() {
                    editor.apply_operation(Op::RemoveText {
                        path: path.clone(),
                        offset: start,
                        text: removed,
                    })?;
                }
                if !diff.text.is_empty() {
                    editor.apply_operation(Op::InsertText {
                        path: path.clone(),
                        offset: start,
                        text: diff.text.clone(),
                    })?;
                }
                caret = Some(Point::new(path, start + diff.text.chars().count()));
            }
            let selection = selection
                .filter(|range| editor.has_range(range))
                .or_else(|| caret.map(Range::collapsed));
            if let Some(range) = selection {
                editor.set_selection(Some(range))?;
            }
            Ok(())
        })?;
        Ok(true)
    }

    pub fn composition_start(&mut self) {
        self.composing = true;
    }

    pub fn composition_end(&mut self) {
        self.composing = false;
    }

    /// Holds a user selection until pending diffs are flushed. Returns false
    /// when nothing is pending and the selection can be applied directly.
    pub fn handle_user_select(&mut self, range: Range) -> bool {
        if !self.has_pending_action() {
            return false;
        }
        self.pending_selection = Some(range);
        true
    }

    pub fn clear(&mut self) {
        self.diffs.clear();
        self.flush_requested = false;
        self.pending_selection = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_of_an_insertion() {
        assert_eq!(
            diff_from_text("wor", "word"),
            Some(StringDiff::insert(3, "d"))
        );
    }

    #[test]
    fn diff_of_a_replacement_spans_every_change() {
        let diff = diff_from_text("the cat sat", "the dog sat").unwrap();

        assert_eq!((diff.start, diff.end), (4, 7));
        assert_eq!(diff.text, "dog");
    }

    #[test]
    fn identical_text_has_no_diff() {
        assert_eq!(diff_from_text("same", "same"), None);
    }

    #[test]
    fn repeated_flush_requests_coalesce() {
        let mut ime = ImeReconciler::new();

        assert!(ime.request_flush());
        assert!(!ime.request_flush());
        assert!(ime.has_pending_action());
    }

    #[test]
    fn diffs_on_one_leaf_merge() {
        use canvas_plate_core::{Document, Node, PluginRegistry};

        let editor = Editor::new(
            Document::new(vec![Node::paragraph("ab"), Node::paragraph("x")]),
            None,
            PluginRegistry::core(),
        );
        let mut ime = ImeReconciler::new();

        ime.queue(&editor, TextDiff::new(vec![0, 0], StringDiff::insert(2, "c")));
        ime.queue(&editor, TextDiff::new(vec![1, 0], StringDiff::insert(0, "y")));
        ime.queue(&editor, TextDiff::new(vec![0, 0], StringDiff::insert(0, "z")));
        assert_eq!(
            ime.pending(),
            &[
                TextDiff::new(
                    vec![0, 0],
                    StringDiff {
                        start: 0,
                        end: 2,
                        text: "zabc".to_string()
                    }
                ),
                TextDiff::new(vec![1, 0], StringDiff::insert(0, "y")),
            ]
        );
        assert_eq!(ime.pending_text(&[0, 0], "ab"), "zabc");

        ime.queue(
            &editor,
            TextDiff::new(
                vec![1, 0],
                StringDiff {
                    start: 0,
                    end: 1,
                    text: String::new(),
                },
            ),
        );
        assert_eq!(ime.pending().len(), 1);
    }
}
