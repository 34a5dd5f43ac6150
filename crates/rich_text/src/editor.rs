//! The [`Editable`]: one document bound to one host surface.
//!
//! Host events come in through the `on_*` handlers. Engine work that has to
//! wait for the host (change delivery, re-render, selection sync, IME flushes)
//! is queued on the [`Scheduler`] and runs when the embedder drains it with
//! [`Editable::run_until_idle`] or [`Editable::tick`].

use canvas_plate_core::{
    ApplyError, Change, ChangeListeners, ChangeSignal, Document, Editor, ListenerId, Marks,
    PluginRegistry, Range, Unit, path,
};
use tracing::{debug, trace, warn};

use crate::config::{EditableConfig, InputMode};
use crate::decorate::{
    Decorated, Decoration, DecorationEngine, DecorationKind, DecorationSet,
    update_pending_insertion_marks,
};
use crate::element::ElementRegistry;
use crate::error::{BridgeError, HotkeyError};
use crate::host::{HostHandle, HostNode, HostSelection, HostSurface};
use crate::hotkeys::{HotkeyTable, KeyEvent};
use crate::ime::{ImeReconciler, TextDiff, diff_from_text};
use crate::input::{
    BeforeInput, BeforeInputResult, DeferredInsert, DeferredOps, EditIntent, InputType,
    native_insert_allowed,
};
use crate::remote::{RemoteCursor, RemoteCursorCache, remote_decorations};
use crate::scheduler::{Scheduler, Task};
use crate::selection::SelectionBridge;
use crate::state::{EditableState, ModifierState};
use crate::view::{RenderPass, RunKind, ViewRenderer, ZERO_WIDTH};

pub struct Editable<H: HostSurface> {
    editor: Editor,
    host: H,
    renderer: ViewRenderer,
    hotkeys: HotkeyTable,
    config: EditableConfig,
    state: EditableState,
    modifiers: ModifierState,
    scheduler: Scheduler,
    deferred: DeferredOps,
    ime: ImeReconciler,
    decorator: DecorationEngine,
    decorations: DecorationSet,
    external: Vec<Decoration>,
    remote: Vec<RemoteCursor>,
    remote_cache: RemoteCursorCache,
    listeners: ChangeListeners,
    /// Marks the user saw previewed when the current composition started.
    pending_insertion_marks: Option<Marks>,
}

impl<H: HostSurface> std::fmt::Debug for Editable<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editable")
            .field("editor", &self.editor)
            .field("state", &self.state)
            .field("scheduled", &self.scheduler.len())
            .finish_non_exhaustive()
    }
}

impl<H: HostSurface> Editable<H> {
    pub fn new(editor: Editor, host: H, config: EditableConfig) -> Result<Self, HotkeyError> {
        Self::with_elements(editor, host, config, ElementRegistry::with_defaults())
    }

    pub fn from_document(
        document: Document,
        host: H,
        config: EditableConfig,
    ) -> Result<Self, HotkeyError> {
        let editor = Editor::with_config(
            document,
            None,
            PluginRegistry::core(),
            config.editor.clone(),
        );
        Self::new(editor, host, config)
    }

    pub fn with_elements(
        editor: Editor,
        host: H,
        config: EditableConfig,
        elements: ElementRegistry,
    ) -> Result<Self, HotkeyError> {
        let hotkeys = match &config.hotkeys {
            Some(map) => HotkeyTable::from_map(map, config.platform)?,
            None => HotkeyTable::defaults(config.platform),
        };

        let mut editable = Self {
            editor,
            host,
            renderer: ViewRenderer::new(elements, config.placeholder.clone()),
            hotkeys,
            state: EditableState::new(config.read_only),
            modifiers: ModifierState::default(),
            scheduler: Scheduler::new(),
            deferred: DeferredOps::default(),
            ime: ImeReconciler::new(),
            decorator: DecorationEngine::new(config.placeholder.clone()),
            decorations: DecorationSet::new(),
            external: Vec::new(),
            remote: Vec::new(),
            remote_cache: RemoteCursorCache::default(),
            listeners: ChangeListeners::new(),
            pending_insertion_marks: None,
            config,
        };

        let decorated = editable.decorate();
        editable.render(decorated);
        editable.scheduler.schedule(Task::SyncSelectionToHost);
        editable.scheduler.schedule(Task::UpdatePendingInsertionMarks);
        debug!(mounted = editable.renderer.tables().len(), "editable mounted");
        Ok(editable)
    }

    pub fn teardown(mut self) -> (Editor, H) {
        self.scheduler.clear();
        self.deferred.clear();
        self.ime.clear();
        let pass = self.renderer.unmount_all();
        self.host.apply_render(&pass, self.renderer.view());
        debug!(unmounted = pass.unmounted.len(), "editable torn down");
        (self.editor, self.host)
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// For simulating user activity on the host. Changes made here are not
    /// seen by the engine until the matching `on_*` handler runs.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn view(&self) -> &ViewRenderer {
        &self.renderer
    }

    pub fn config(&self) -> &EditableConfig {
        &self.config
    }

    pub fn state(&self) -> &EditableState {
        &self.state
    }

    pub fn modifiers(&self) -> ModifierState {
        self.modifiers
    }

    pub fn decorations(&self) -> &DecorationSet {
        &self.decorations
    }

    pub fn deferred(&self) -> &DeferredOps {
        &self.deferred
    }

    pub fn ime(&self) -> &ImeReconciler {
        &self.ime
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn pending_insertion_marks(&self) -> Option<&Marks> {
        self.pending_insertion_marks.as_ref()
    }

    pub fn bridge(&self) -> SelectionBridge<'_> {
        SelectionBridge::new(&self.editor, &self.renderer)
    }

    /// Deferred native inserts are applied before `f` runs.
    pub fn update<T>(&mut self, f: impl FnOnce(&mut Editor) -> T) -> T {
        self.flush_deferred();
        let out = f(&mut self.editor);
        self.after_change();
        out
    }

    pub fn run_command(&mut self, id: &str) -> Result<(), BridgeError> {
        self.update(|editor| editor.run_command(id, None))?;
        Ok(())
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.state.read_only = read_only;
        self.config.read_only = read_only;
    }

    pub fn focus(&mut self) {
        self.host.focus();
        self.on_focus();
    }

    pub fn blur(&mut self) {
        self.host.blur();
        self.on_blur();
    }

    pub fn subscribe<F>(&mut self, signal: ChangeSignal, listener: F) -> ListenerId
    where
        F: FnMut(&Change) + 'static,
    {
        self.listeners.subscribe(signal, listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub fn set_decorations(&mut self, decorations: Vec<Decoration>) {
        self.external = decorations;
        self.scheduler.schedule(Task::FlushChanges);
    }

    pub fn set_remote_cursors(&mut self, cursors: Vec<RemoteCursor>) {
        self.remote = cursors;
        self.scheduler.schedule(Task::FlushChanges);
    }

    pub fn run_until_idle(&mut self) {
        while let Some(task) = self.scheduler.next(false) {
            self.run_task(task);
        }
    }

    /// One host turn: drains everything, idle tasks included.
    pub fn tick(&mut self) {
        while let Some(task) = self.scheduler.next(true) {
            self.run_task(task);
        }
    }

    pub fn on_before_input(&mut self, event: BeforeInput) -> BeforeInputResult {
        if self.state.read_only {
            return BeforeInputResult::Handled;
        }
        let BeforeInput {
            input_type,
            data,
            target_range,
        } = event;
        trace!(?input_type, ?data, "before input");

        let composition_change = input_type.is_composition_change();
        if composition_change && self.state.composing {
            return BeforeInputResult::PassThrough;
        }

        let mut native = match (&input_type, data.as_deref()) {
            (InputType::InsertText, Some(data)) => {
                native_insert_allowed(&self.editor, &self.host, data)
            }
            _ => false,
        };

        // Delete types compute their own range from the caret.
        if !input_type.is_deletion() || input_type.deletes_target() {
            if let Some(target) = target_range {
                let selection = HostSelection {
                    anchor: target.start,
                    focus: target.end,
                };
                let resolved = self.bridge().host_to_range(&selection, false);
                match resolved {
                    Ok(range) if self.editor.selection() != Some(&range) => {
                        native = false;
                        if let Err(err) = self.update(|editor| editor.select(range)) {
                            warn!(%err, "input target range rejected");
                        }
                    }
                    Ok(_) => {}
                    Err(err) => debug!(%err, "input target range unresolvable"),
                }
            }
        }

        if composition_change {
            return BeforeInputResult::PassThrough;
        }

        let selection = self.editor.selection().cloned();
        let expanded = selection.as_ref().is_some_and(Range::is_expanded);
        let intent = EditIntent::classify(&input_type, data.as_deref(), expanded);

        if native {
            if let (EditIntent::InsertText(text), Some(at)) = (&intent, selection) {
                trace!(%text, "insert left to the host");
                self.deferred.push(DeferredInsert {
                    text: text.clone(),
                    at,
                });
                return BeforeInputResult::Native;
            }
        }

        if let Err(err) = self.execute(intent) {
            warn!(%err, "input dropped");
        }
        BeforeInputResult::Handled
    }

    pub fn on_input(&mut self) {
        if !self.deferred.is_empty() {
            self.scheduler.schedule(Task::FlushDeferredOps);
        }
    }

    /// The host reverted a native insert. Deferred inserts are dropped and
    /// the affected text views are rewritten from the document.
    pub fn on_input_cancelled(&mut self) {
        let dropped = self.deferred.clear();
        if dropped.is_empty() {
            return;
        }
        let mut updated: Vec<HostHandle> = dropped
            .iter()
            .filter_map(|insert| self.renderer.handle_at(&self.editor, &insert.at.anchor.path))
            .collect();
        updated.sort();
        updated.dedup();
        debug!(count = dropped.len(), "deferred inserts cancelled");
        let pass = RenderPass {
            updated,
            ..RenderPass::default()
        };
        self.host.apply_render(&pass, self.renderer.view());
        self.scheduler.schedule(Task::SyncSelectionToHost);
    }

    pub fn on_key_down(&mut self, event: &KeyEvent) -> bool {
        self.modifiers.record(event, true);
        if self.state.read_only || self.state.composing {
            return false;
        }
        let Some(command) = self.hotkeys.resolve(event).map(str::to_string) else {
            return false;
        };
        trace!(key = %event.key, %command, "hotkey");
        if let Err(err) = self.run_command(&command) {
            warn!(%command, %err, "hotkey command failed");
        }
        true
    }

    pub fn on_key_up(&mut self, event: &KeyEvent) {
        self.modifiers.record(event, false);
    }

    pub fn on_composition_start(&mut self) {
        if self.state.read_only {
            return;
        }
        self.state.composing = true;
        self.ime.composition_start();

        let result = self.update(|editor| {
            let Some(selection) = editor.selection().cloned() else {
                return Ok(());
            };
            if selection.is_expanded() {
                return editor.delete_fragment(false);
            }
            // Composing at the end of an inline would extend it.
            let Some((inline_path, _)) = editor.inline_above(&selection.anchor.path) else {
                return Ok(());
            };
            if editor.end(&inline_path).as_ref() != Some(&selection.anchor) {
                return Ok(());
            }
            match editor.start(&path::next(&inline_path)) {
                Some(after) => editor.select(Range::collapsed(after)),
                None => Ok(()),
            }
        });
        if let Err(err) = result {
            warn!(%err, "composition start edit failed");
        }
        self.scheduler.schedule(Task::FlushChanges);
    }

    pub fn on_composition_update(&mut self) {
        if !self.state.read_only && !self.state.composing {
            self.state.composing = true;
            self.ime.composition_start();
        }
    }

    /// In diff mode the queued diffs carry the composed text.
    pub fn on_composition_end(&mut self, data: Option<&str>) {
        if self.state.read_only {
            return;
        }
        self.ime.composition_end();
        self.scheduler.schedule(Task::FinishComposition);

        if self.config.input_mode == InputMode::Diff {
            if self.ime.has_pending_action() && self.ime.request_flush() {
                self.scheduler.schedule(Task::FlushIme);
            }
            return;
        }

        let Some(text) = data.filter(|text| !text.is_empty()) else {
            return;
        };
        let placeholder = self.pending_insertion_marks.take();
        let result = self.update(|editor| {
            let user_marks = placeholder.map(|marks| {
                let user = editor.pending_marks().cloned();
                editor.set_pending_marks(Some(marks));
                user
            });
            let result = editor.insert_text(text);
            if let Some(user) = user_marks {
                editor.set_pending_marks(user);
            }
            result
        });
        if let Err(err) = result {
            warn!(%err, "composed text dropped");
        }
    }

    pub fn on_drag_start(&mut self) {
        self.state.dragging = true;
    }

    pub fn on_drag_end(&mut self) {
        self.state.dragging = false;
        self.scheduler.schedule(Task::SyncSelectionToHost);
    }

    pub fn on_selection_change(&mut self) {
        if self.state.composing || self.state.updating_selection || self.state.dragging {
            return;
        }
        self.state.focused = self.host.is_focused();

        let Some(host_selection) = self.host.selection() else {
            if let Err(err) = self.update(Editor::deselect) {
                warn!(%err, "deselect failed");
            }
            return;
        };

        let read_only = self.state.read_only;
        let bridge = SelectionBridge::new(&self.editor, &self.renderer);
        let anchor_selectable = bridge.has_editable_target(&host_selection.anchor.node)
            || bridge.is_target_inside_non_readonly_void(&host_selection.anchor.node, read_only);
        let focus_in_editor = bridge.has_target(&host_selection.focus.node);

        if anchor_selectable && focus_in_editor {
            match bridge.host_to_range(&host_selection, false) {
                Ok(range) => {
                    if self.ime.has_pending_action() {
                        self.ime.handle_user_select(range);
                    } else if let Err(err) = self.update(|editor| editor.select(range)) {
                        warn!(%err, "host selection rejected");
                    }
                }
                Err(err) => trace!(%err, "host selection ignored"),
            }
        }

        if read_only && !(anchor_selectable && focus_in_editor) {
            if let Err(err) = self.update(Editor::deselect) {
                warn!(%err, "deselect failed");
            }
        }
    }

    pub fn on_focus(&mut self) {
        self.state.focused = true;
        self.scheduler.schedule(Task::SyncSelectionToHost);
    }

    pub fn on_blur(&mut self) {
        self.state.focused = false;
        self.modifiers.reset();
    }

    /// While composing, only a completed shortcut trigger flushes early.
    pub fn on_text_diffs(&mut self, diffs: Vec<TextDiff>) {
        for diff in diffs {
            self.ime.queue(&self.editor, diff);
        }
        if !self.ime.has_pending_action() {
            return;
        }
        let early = self.state.composing
            && self
                .ime
                .evaluate_early_flush(&self.editor, &self.config.shortcut_triggers);
        if (early || !self.state.composing) && self.ime.request_flush() {
            debug!(early, "ime flush scheduled");
            self.scheduler.schedule(Task::FlushIme);
        }
    }

    pub fn on_host_text_mutation(&mut self, text: HostHandle) {
        let Some(diff) = self.host_text_diff(text) else {
            return;
        };
        self.on_text_diffs(vec![diff]);
    }

    fn host_text_diff(&self, handle: HostHandle) -> Option<TextDiff> {
        let view = self.renderer.text_view(handle)?;
        let path = self.renderer.tables().find_path(handle)?;
        if self.editor.is_in_void(&path) {
            return None;
        }

        let mut last = String::new();
        let mut current = String::new();
        for run in view.runs.iter().filter(|run| run.is_editable()) {
            let mut shown = self.host.run_text(run.id).unwrap_or_default();
            if let RunKind::String { trailing_newline } = run.kind {
                last.push_str(&run.text);
                if trailing_newline && shown.ends_with('\n') {
                    shown.pop();
                }
            }
            current.extend(shown.chars().filter(|ch| *ch != ZERO_WIDTH));
        }

        // Host text already carries the queued diffs for this leaf.
        let last = self.ime.pending_text(&path, &last);
        let diff = diff_from_text(&last, &current)?;
        Some(TextDiff::new(path, diff))
    }

    fn execute(&mut self, intent: EditIntent) -> Result<(), BridgeError> {
        match intent {
            EditIntent::Ignore => Ok(()),
            EditIntent::RunCommand(id) => self.run_command(id),
            intent => {
                self.update(|editor| apply_intent(editor, intent))?;
                Ok(())
            }
        }
    }

    fn run_task(&mut self, task: Task) {
        trace!(?task, "run task");
        match task {
            Task::FlushDeferredOps => self.flush_deferred(),
            Task::FlushIme => self.flush_ime(),
            Task::FinishComposition => {
                self.state.composing = false;
                self.scheduler.schedule(Task::FlushChanges);
                self.scheduler.schedule(Task::SyncSelectionToHost);
            }
            Task::FlushChanges => self.flush_changes(),
            Task::SyncSelectionToHost => self.sync_selection_to_host(),
            Task::UpdatePendingInsertionMarks => {
                self.pending_insertion_marks = update_pending_insertion_marks(&self.editor);
            }
            Task::ClearUpdatingSelection => self.state.updating_selection = false,
        }
    }

    fn after_change(&mut self) {
        if !self.editor.has_pending_change() {
            return;
        }
        self.scheduler.schedule(Task::FlushChanges);
        self.scheduler.schedule(Task::SyncSelectionToHost);
        self.scheduler.schedule(Task::UpdatePendingInsertionMarks);
    }

    fn flush_deferred(&mut self) {
        if self.deferred.is_empty() {
            return;
        }
        if let Err(err) = self.deferred.flush(&mut self.editor) {
            warn!(%err, "deferred inserts dropped");
        }
        self.after_change();
    }

    fn flush_ime(&mut self) {
        match self.ime.flush(&mut self.editor) {
            Ok(applied) => trace!(applied, "ime flushed"),
            Err(err) => warn!(%err, "ime flush failed"),
        }
        self.after_change();
    }

    /// Re-renders only when the value, pending marks or decorations changed.
    fn flush_changes(&mut self) {
        let change = self.editor.take_change();
        let decorated = self.decorate();
        let rerender = change
            .as_ref()
            .is_some_and(|change| change.touches_value() || change.marks_changed)
            || decorated.set != self.decorations;
        if rerender {
            self.render(decorated);
        }
        if let Some(change) = change {
            self.listeners.dispatch(&change);
        }
    }

    fn decorate(&mut self) -> Decorated {
        let mut external = self.external.clone();
        external.extend(remote_decorations(
            &self.editor,
            &mut self.remote_cache,
            &self.remote,
        ));
        self.decorator
            .compute(&self.editor, self.state.composing, &external)
    }

    fn render(&mut self, decorated: Decorated) {
        let had_placeholder = has_placeholder(&self.decorations);
        self.state.has_mark_placeholder = decorated.has_mark_placeholder;
        let pass = self.renderer.render(&self.editor, &decorated.set);
        self.decorations = decorated.set;
        if !pass.is_empty() {
            self.host.apply_render(&pass, self.renderer.view());
        }
        if had_placeholder != has_placeholder(&self.decorations) {
            self.host.resized();
        }
    }

    fn sync_selection_to_host(&mut self) {
        let Some(selection) = self.editor.selection().cloned() else {
            if self.host.selection().is_some() {
                self.host.clear_selection();
            }
            return;
        };

        let bridge = SelectionBridge::new(&self.editor, &self.renderer);
        if let Some(current) = self.host.selection() {
            let resolved = bridge.host_to_range(&current, true).ok();
            if resolved.as_ref() == Some(&selection) {
                let in_placeholder = match current.anchor.node {
                    HostNode::Run(run) => self
                        .renderer
                        .text_view(run.text)
                        .and_then(|text| text.run(run.index))
                        .is_some_and(|run| run.is_mark_placeholder()),
                    _ => false,
                };
                if !self.state.has_mark_placeholder || in_placeholder {
                    return;
                }
            }
        }

        let target = bridge.range_to_host(&selection);
        self.state.updating_selection = true;
        self.scheduler.schedule(Task::ClearUpdatingSelection);
        match target {
            Ok(_) if self.state.composing => self.host.collapse_selection_to_end(),
            Ok(target) => {
                let (base, extent) = target.base_extent();
                trace!(?base, ?extent, "host selection written");
                self.host.set_selection(base, extent);
                self.host.scroll_into_view(&target.range);
            }
            Err(err) => {
                debug!(%err, "selection has no host counterpart");
                self.host.clear_selection();
            }
        }
    }
}

fn has_placeholder(decorations: &DecorationSet) -> bool {
    decorations
        .iter()
        .any(|decoration| decoration.kind == DecorationKind::Placeholder)
}

fn apply_intent(editor: &mut Editor, intent: EditIntent) -> Result<(), ApplyError> {
    match intent {
        EditIntent::InsertText(text) => editor.insert_text(&text),
        EditIntent::InsertSoftBreak => editor.insert_soft_break(),
        EditIntent::InsertBreak => editor.insert_break(),
        EditIntent::Delete { unit, reverse: true } => editor.delete_backward(unit),
        EditIntent::Delete { unit, reverse: false } => editor.delete_forward(unit),
        EditIntent::DeleteEntireLine => editor.batch("delete_entire_line", |editor| {
            editor.delete_backward(Unit::Line)?;
            editor.delete_forward(Unit::Line)
        }),
        EditIntent::DeleteFragment { reverse } => editor.delete_fragment(reverse),
        EditIntent::RunCommand(_) | EditIntent::Ignore => Ok(()),
    }
}
