//! Input-type classification and native passthrough.
//!
//! Input types follow the W3C Input Events names. Classification turns one
//! before-input event into an [`EditIntent`]; [`crate::Editable`] decides
//! whether the host may perform an eligible single-character insert natively
//! and defers the matching engine insert until the host has settled.

use canvas_plate_core::{ApplyError, Editor, Range, Unit};
use tracing::trace;

use crate::host::{HostRange, HostSurface};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputType {
    InsertText,
    InsertCompositionText,
    InsertLineBreak,
    InsertParagraph,
    InsertFromPaste,
    InsertFromDrop,
    InsertReplacementText,
    InsertFromYank,
    DeleteContentBackward,
    DeleteContentForward,
    DeleteContent,
    DeleteWordBackward,
    DeleteWordForward,
    DeleteEntireWordBackward,
    DeleteEntireWordForward,
    DeleteSoftLineBackward,
    DeleteSoftLineForward,
    DeleteEntireSoftLine,
    DeleteHardLineBackward,
    DeleteHardLineForward,
    DeleteByCut,
    DeleteByDrag,
    DeleteCompositionText,
    HistoryUndo,
    HistoryRedo,
    FormatBold,
    FormatItalic,
    FormatUnderline,
    FormatStrikeThrough,
    Unknown(String),
}

impl InputType {
    pub fn parse(s: &str) -> Self {
        match s {
            "insertText" => InputType::InsertText,
            "insertCompositionText" => InputType::InsertCompositionText,
            "insertLineBreak" => InputType::InsertLineBreak,
            "insertParagraph" => InputType::InsertParagraph,
            "insertFromPaste" => InputType::InsertFromPaste,
            "insertFromDrop" => InputType::InsertFromDrop,
            "insertReplacementText" => InputType::InsertReplacementText,
            "insertFromYank" => InputType::InsertFromYank,

            "deleteContentBackward" => InputType::DeleteContentBackward,
            "deleteContentForward" => InputType::DeleteContentForward,
            "deleteContent" => InputType::DeleteContent,
            "deleteWordBackward" => InputType::DeleteWordBackward,
            "deleteWordForward" => InputType::DeleteWordForward,
            "deleteEntireWordBackward" => InputType::DeleteEntireWordBackward,
            "deleteEntireWordForward" => InputType::DeleteEntireWordForward,
            "deleteSoftLineBackward" => InputType::DeleteSoftLineBackward,
            "deleteSoftLineForward" => InputType::DeleteSoftLineForward,
            "deleteEntireSoftLine" => InputType::DeleteEntireSoftLine,
            "deleteHardLineBackward" => InputType::DeleteHardLineBackward,
            "deleteHardLineForward" => InputType::DeleteHardLineForward,
            "deleteByCut" => InputType::DeleteByCut,
            "deleteByDrag" => InputType::DeleteByDrag,
            "deleteCompositionText" => InputType::DeleteCompositionText,

            "historyUndo" => InputType::HistoryUndo,
            "historyRedo" => InputType::HistoryRedo,

            "formatBold" => InputType::FormatBold,
            "formatItalic" => InputType::FormatItalic,
            "formatUnderline" => InputType::FormatUnderline,
            "formatStrikeThrough" => InputType::FormatStrikeThrough,

            other => InputType::Unknown(other.to_string()),
        }
    }

    pub fn is_deletion(&self) -> bool {
        matches!(
            self,
            InputType::DeleteContentBackward
                | InputType::DeleteContentForward
                | InputType::DeleteContent
                | InputType::DeleteWordBackward
                | InputType::DeleteWordForward
                | InputType::DeleteEntireWordBackward
                | InputType::DeleteEntireWordForward
                | InputType::DeleteSoftLineBackward
                | InputType::DeleteSoftLineForward
                | InputType::DeleteEntireSoftLine
                | InputType::DeleteHardLineBackward
                | InputType::DeleteHardLineForward
                | InputType::DeleteByCut
                | InputType::DeleteByDrag
                | InputType::DeleteCompositionText
        )
    }

    /// Deletions that remove their own target rather than moving from the caret.
    pub fn deletes_target(&self) -> bool {
        matches!(self, InputType::DeleteByCut | InputType::DeleteByDrag)
    }

    pub fn is_backward(&self) -> bool {
        matches!(
            self,
            InputType::DeleteContentBackward
                | InputType::DeleteWordBackward
                | InputType::DeleteEntireWordBackward
                | InputType::DeleteSoftLineBackward
                | InputType::DeleteHardLineBackward
        )
    }

    pub fn is_composition_change(&self) -> bool {
        matches!(
            self,
            InputType::InsertCompositionText | InputType::DeleteCompositionText
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditIntent {
    InsertText(String),
    InsertSoftBreak,
    InsertBreak,
    Delete { unit: Unit, reverse: bool },
    /// Deletes the whole line around the caret.
    DeleteEntireLine,
    DeleteFragment { reverse: bool },
    RunCommand(&'static str),
    Ignore,
}

impl EditIntent {
    /// Classifies `input_type`. An expanded selection turns every deletion
    /// into a fragment delete whatever its direction label says.
    pub fn classify(input_type: &InputType, data: Option<&str>, expanded: bool) -> Self {
        if expanded && input_type.is_deletion() {
            return EditIntent::DeleteFragment {
                reverse: input_type.is_backward(),
            };
        }

        match input_type {
            InputType::InsertText
            | InputType::InsertCompositionText
            | InputType::InsertFromPaste
            | InputType::InsertFromDrop
            | InputType::InsertReplacementText
            | InputType::InsertFromYank => match data {
                Some(text) if !text.is_empty() => EditIntent::InsertText(text.to_string()),
                _ => EditIntent::Ignore,
            },
            InputType::InsertLineBreak => EditIntent::InsertSoftBreak,
            InputType::InsertParagraph => EditIntent::InsertBreak,

            InputType::DeleteContentBackward => EditIntent::delete(Unit::Character, true),
            InputType::DeleteContentForward | InputType::DeleteContent => {
                EditIntent::delete(Unit::Character, false)
            }
            InputType::DeleteWordBackward | InputType::DeleteEntireWordBackward => {
                EditIntent::delete(Unit::Word, true)
            }
            InputType::DeleteWordForward | InputType::DeleteEntireWordForward => {
                EditIntent::delete(Unit::Word, false)
            }
            InputType::DeleteSoftLineBackward | InputType::DeleteHardLineBackward => {
                EditIntent::delete(Unit::Line, true)
            }
            InputType::DeleteSoftLineForward | InputType::DeleteHardLineForward => {
                EditIntent::delete(Unit::Line, false)
            }
            InputType::DeleteEntireSoftLine => EditIntent::DeleteEntireLine,
            InputType::DeleteByCut | InputType::DeleteByDrag => {
                EditIntent::DeleteFragment { reverse: false }
            }

            InputType::HistoryUndo => EditIntent::RunCommand("history.undo"),
            InputType::HistoryRedo => EditIntent::RunCommand("history.redo"),
            InputType::FormatBold => EditIntent::RunCommand("marks.toggle_bold"),
            InputType::FormatItalic => EditIntent::RunCommand("marks.toggle_italic"),
            InputType::FormatUnderline => EditIntent::RunCommand("marks.toggle_underline"),
            InputType::FormatStrikeThrough => EditIntent::RunCommand("marks.toggle_strikethrough"),

            InputType::DeleteCompositionText | InputType::Unknown(_) => EditIntent::Ignore,
        }
    }

    fn delete(unit: Unit, reverse: bool) -> Self {
        EditIntent::Delete { unit, reverse }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeforeInput {
    pub input_type: InputType,
    pub data: Option<String>,
    pub target_range: Option<HostRange>,
}

impl BeforeInput {
    pub fn new(input_type: &str) -> Self {
        Self {
            input_type: InputType::parse(input_type),
            data: None,
            target_range: None,
        }
    }

    pub fn text(input_type: &str, data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::new(input_type)
        }
    }

    pub fn target(mut self, range: HostRange) -> Self {
        self.target_range = Some(range);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeforeInputResult {
    Handled,
    /// The host performs the insert itself; the engine insert is deferred
    /// until [`crate::Editable::on_input`].
    Native,
    PassThrough,
}

/// Whether a single-character insert may be left to the host.
pub fn native_insert_allowed(editor: &Editor, host: &impl HostSurface, data: &str) -> bool {
    let Some(selection) = editor.selection().filter(|range| range.is_collapsed()) else {
        return false;
    };
    let mut chars = data.chars();
    let (Some(ch), None) = (chars.next(), chars.next()) else {
        return false;
    };
    if editor.pending_marks().is_some() {
        return false;
    }
    let anchor = &selection.anchor;
    if let Some((inline_path, _)) = editor.inline_above(&anchor.path) {
        if editor.end(&inline_path).as_ref() == Some(anchor) {
            return false;
        }
    }

    let allowed = host
        .native_insert_supported(ch, anchor.offset)
        .unwrap_or_else(|| (ch.is_ascii_alphabetic() || ch == ' ') && anchor.offset != 0);
    trace!(%ch, offset = anchor.offset, allowed, "native insert check");
    allowed
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredInsert {
    pub text: String,
    pub at: Range,
}

/// Inserts the host already performed, waiting for it to settle.
#[derive(Debug, Clone, Default)]
pub struct DeferredOps {
    queue: Vec<DeferredInsert>,
}

impl DeferredOps {
    pub fn push(&mut self, insert: DeferredInsert) {
        self.queue.push(insert);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending(&self) -> &[DeferredInsert] {
        &self.queue
    }

    pub fn clear(&mut self) -> Vec<DeferredInsert> {
        std::mem::take(&mut self.queue)
    }

    pub fn flush(&mut self, editor: &mut Editor) -> Result<usize, ApplyError> {
        if self.queue.is_empty() {
            return Ok(0);
        }
        let queue = std::mem::take(&mut self.queue);
        let count = queue.len();
        editor.batch("input:native", |editor| {
            // (queued at, caret after) of the previous insert
            let mut previous: Option<(Range, Option<Range>)> = None;
            for insert in queue {
                let target = match previous.take() {
                    Some((queued, Some(after))) if queued == insert.at => after,
                    _ => insert.at.clone(),
                };
                if editor.selection() != Some(&target) && editor.has_range(&target) {
                    editor.select(target)?;
                }
                editor.insert_text(&insert.text)?;
                previous = Some((insert.at, editor.selection().cloned()));
            }
            Ok(())
        })?;
        trace!(count, "flushed deferred inserts");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_input_types_are_kept() {
        assert_eq!(
            InputType::parse("insertOrderedList"),
            InputType::Unknown("insertOrderedList".to_string())
        );
        assert_eq!(
            EditIntent::classify(&InputType::parse("insertOrderedList"), None, false),
            EditIntent::Ignore
        );
    }

    #[test]
    fn expanded_deletes_become_fragment_deletes() {
        let forward = InputType::parse("deleteContentForward");
        let backward = InputType::parse("deleteWordBackward");

        assert_eq!(
            EditIntent::classify(&forward, None, true),
            EditIntent::DeleteFragment { reverse: false }
        );
        assert_eq!(
            EditIntent::classify(&backward, None, true),
            EditIntent::DeleteFragment { reverse: true }
        );
        assert_eq!(
            EditIntent::classify(&backward, None, false),
            EditIntent::Delete {
                unit: Unit::Word,
                reverse: true
            }
        );
    }

    #[test]
    fn line_breaks_and_paragraphs() {
        assert_eq!(
            EditIntent::classify(&InputType::InsertLineBreak, None, false),
            EditIntent::InsertSoftBreak
        );
        assert_eq!(
            EditIntent::classify(&InputType::InsertParagraph, None, true),
            EditIntent::InsertBreak
        );
        assert_eq!(
            EditIntent::classify(&InputType::InsertText, Some(""), false),
            EditIntent::Ignore
        );
    }

    #[test]
    fn deferred_inserts_replay_from_a_superseded_point() {
        use canvas_plate_core::{Document, Node, PluginRegistry, Point};

        let start = Range::collapsed(Point::new(vec![0, 0], 1));
        let mut editor = Editor::new(
            Document::new(vec![Node::paragraph("xy")]),
            Some(start.clone()),
            PluginRegistry::core(),
        );
        let mut deferred = DeferredOps::default();
        deferred.push(DeferredInsert {
            text: "a".to_string(),
            at: start.clone(),
        });
        deferred.push(DeferredInsert {
            text: "b".to_string(),
            at: start,
        });
        deferred.push(DeferredInsert {
            text: "c".to_string(),
            at: Range::collapsed(Point::new(vec![0, 0], 0)),
        });

        assert_eq!(deferred.flush(&mut editor).unwrap(), 3);
        assert_eq!(editor.doc().children, vec![Node::paragraph("cxaby")]);
    }
}
