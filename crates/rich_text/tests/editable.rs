use std::cell::Cell;
use std::rc::Rc;

use canvas_plate::{
    BridgeError, DecorationKind, Editable, EditableConfig, HostPoint, HostSurface, InputMode,
    KeyEvent, MemoryHost, Platform, RunId,
};
use canvas_plate_core::{ChangeSignal, Document, Editor, Node, PluginRegistry, Point, Range};

fn editable_with(children: Vec<Node>, caret: Point) -> Editable<MemoryHost> {
    let editor = Editor::new(
        Document::new(children),
        Some(Range::collapsed(caret)),
        PluginRegistry::core(),
    );
    let config = EditableConfig::default().platform(Platform::Other);
    let mut editable = Editable::new(editor, MemoryHost::new(), config).unwrap();
    editable.tick();
    editable
}

fn counter(editable: &mut Editable<MemoryHost>, signal: ChangeSignal) -> (Rc<Cell<usize>>, u64) {
    let count = Rc::new(Cell::new(0));
    let seen = Rc::clone(&count);
    let id = editable.subscribe(signal, move |_| seen.set(seen.get() + 1));
    (count, id)
}

#[test]
fn listeners_receive_the_signals_they_asked_for() {
    let mut editable = editable_with(vec![Node::paragraph("ab")], Point::new(vec![0, 0], 2));
    let (changes, _) = counter(&mut editable, ChangeSignal::Change);
    let (values, _) = counter(&mut editable, ChangeSignal::Value);
    let (selections, _) = counter(&mut editable, ChangeSignal::Selection);

    editable.update(|editor| editor.insert_text("c")).unwrap();
    editable.run_until_idle();
    assert_eq!((changes.get(), values.get(), selections.get()), (1, 1, 0));

    editable
        .update(|editor| editor.select(Range::collapsed(Point::new(vec![0, 0], 0))))
        .unwrap();
    editable.run_until_idle();
    assert_eq!((changes.get(), values.get(), selections.get()), (2, 1, 1));
}

#[test]
fn changes_coalesce_until_the_flush() {
    let mut editable = editable_with(vec![Node::paragraph("")], Point::new(vec![0, 0], 0));
    let (changes, _) = counter(&mut editable, ChangeSignal::Change);

    editable.update(|editor| editor.insert_text("a")).unwrap();
    editable.update(|editor| editor.insert_text("b")).unwrap();
    editable.update(|editor| editor.insert_break()).unwrap();
    assert_eq!(changes.get(), 0);

    editable.run_until_idle();
    assert_eq!(changes.get(), 1);
    assert_eq!(
        editable.editor().doc().children,
        vec![Node::paragraph("ab"), Node::paragraph("")]
    );
}

#[test]
fn unsubscribed_listeners_stay_quiet() {
    let mut editable = editable_with(vec![Node::paragraph("")], Point::new(vec![0, 0], 0));
    let (values, id) = counter(&mut editable, ChangeSignal::Value);

    assert!(editable.unsubscribe(id));
    assert!(!editable.unsubscribe(id));
    editable.update(|editor| editor.insert_text("a")).unwrap();
    editable.run_until_idle();

    assert_eq!(values.get(), 0);
}

#[test]
fn config_loads_from_json() {
    let config = EditableConfig::from_json_str(
        r#"{
            "platform": "apple",
            "input_mode": "diff",
            "placeholder": "Type here",
            "editor": { "max_undo": 1 }
        }"#,
    )
    .unwrap();

    assert_eq!(config.platform, Platform::Apple);
    assert_eq!(config.input_mode, InputMode::Diff);
    assert_eq!(config.placeholder.as_deref(), Some("Type here"));
    assert_eq!(config.shortcut_triggers, EditableConfig::default().shortcut_triggers);
    assert_eq!(config.editor.max_undo, 1);
    assert!(!config.read_only);

    assert!(EditableConfig::from_json_str(r#"{ "platform": "beos" }"#).is_err());
}

#[test]
fn document_editables_use_the_configured_history() {
    let config = EditableConfig::from_json_str(
        r#"{ "platform": "other", "placeholder": "Type here", "editor": { "max_undo": 1 } }"#,
    )
    .unwrap();
    let mut editable = Editable::from_document(
        Document::new(vec![Node::paragraph("")]),
        MemoryHost::new(),
        config,
    )
    .unwrap();

    assert_eq!(editable.editor().config().max_undo, 1);
    assert_eq!(editable.editor().selection(), None);
    assert!(
        editable
            .decorations()
            .iter()
            .any(|decoration| decoration.kind == DecorationKind::Placeholder)
    );

    editable
        .update(|editor| {
            editor.select(Range::collapsed(Point::new(vec![0, 0], 0)))?;
            editor.insert_text("a")?;
            editor.insert_text("b")
        })
        .unwrap();
    editable.update(|editor| editor.insert_text("c")).unwrap();
    editable.run_command("history.undo").unwrap();

    assert_eq!(editable.editor().doc().children, vec![Node::paragraph("ab")]);
    assert!(!editable.editor().can_undo());
}

#[test]
fn unknown_commands_are_reported() {
    let mut editable = editable_with(vec![Node::paragraph("")], Point::new(vec![0, 0], 0));

    assert!(matches!(
        editable.run_command("marks.toggle_sparkle"),
        Err(BridgeError::Command(_))
    ));
}

#[test]
fn drag_defers_selection_sync() {
    let mut editable = editable_with(vec![Node::paragraph("hello")], Point::new(vec![0, 0], 1));
    let text = editable.view().handle_at(editable.editor(), &[0, 0]).unwrap();
    let run = RunId { text, index: 0 };

    editable.on_drag_start();
    editable.host_mut().select(HostPoint::run(run, 3), HostPoint::run(run, 3));
    editable.on_selection_change();
    assert_eq!(
        editable.editor().selection(),
        Some(&Range::collapsed(Point::new(vec![0, 0], 1)))
    );

    editable.on_drag_end();
    editable.run_until_idle();

    assert!(!editable.state().dragging);
    assert_eq!(editable.host().selection().unwrap().focus, HostPoint::run(run, 1));
}

#[test]
fn focus_and_blur_track_host_state() {
    let mut editable = editable_with(vec![Node::paragraph("hello")], Point::new(vec![0, 0], 1));

    editable.focus();
    assert!(editable.state().focused);
    assert!(editable.host().is_focused());

    editable.on_key_down(&KeyEvent::new("Control").ctrl());
    assert!(editable.modifiers().ctrl);

    editable.blur();
    assert!(!editable.state().focused);
    assert!(!editable.modifiers().any());
}
