use std::cell::RefCell;
use std::rc::Rc;

use canvas_plate_core::{
    ApplyError, ChangeListeners, ChangeSignal, Document, Editor, Node, Op, PlateValue,
    PluginRegistry, Point, Range,
};

fn editor_with_text(text: &str) -> Editor {
    Editor::new(
        Document::new(vec![Node::paragraph(text)]),
        Some(Range::collapsed(Point::new(vec![0, 0], 0))),
        PluginRegistry::core(),
    )
}

fn recording_listeners() -> (ChangeListeners, Rc<RefCell<Vec<ChangeSignal>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut listeners = ChangeListeners::new();
    for signal in [ChangeSignal::Change, ChangeSignal::Selection, ChangeSignal::Value] {
        let seen = Rc::clone(&seen);
        listeners.subscribe(signal, move |_| seen.borrow_mut().push(signal));
    }
    (listeners, seen)
}

#[test]
fn synchronous_ops_coalesce_into_one_change() {
    let mut editor = editor_with_text("");

    editor.insert_text("a").unwrap();
    editor.insert_text("b").unwrap();
    editor
        .select(Range::collapsed(Point::new(vec![0, 0], 0)))
        .unwrap();

    let change = editor.take_change().unwrap();
    assert_eq!(change.operations.len(), 3);
    assert!(change.touches_value());
    assert!(change.touches_selection());
    assert_eq!(editor.take_change(), None);
}

#[test]
fn selection_only_change_skips_value_listeners() {
    let mut editor = editor_with_text("abc");
    let (mut listeners, seen) = recording_listeners();

    editor
        .select(Range::collapsed(Point::new(vec![0, 0], 2)))
        .unwrap();
    let change = editor.take_change().unwrap();
    assert!(change.is_selection_only());
    listeners.dispatch(&change);

    assert_eq!(
        *seen.borrow(),
        vec![ChangeSignal::Change, ChangeSignal::Selection]
    );
}

#[test]
fn value_change_skips_selection_listeners() {
    let mut editor = editor_with_text("abc");
    let (mut listeners, seen) = recording_listeners();

    editor.insert_text("x").unwrap();
    listeners.dispatch(&editor.take_change().unwrap());

    assert_eq!(*seen.borrow(), vec![ChangeSignal::Change, ChangeSignal::Value]);
}

#[test]
fn unsubscribed_listener_is_not_called() {
    let mut editor = editor_with_text("");
    let calls = Rc::new(RefCell::new(0));
    let mut listeners = ChangeListeners::new();
    let counter = Rc::clone(&calls);
    let id = listeners.subscribe(ChangeSignal::Change, move |_| *counter.borrow_mut() += 1);

    assert!(listeners.unsubscribe(id));
    editor.insert_text("a").unwrap();
    listeners.dispatch(&editor.take_change().unwrap());

    assert_eq!(*calls.borrow(), 0);
    assert!(listeners.is_empty());
}

#[test]
fn snapshot_round_trips_through_json() -> anyhow::Result<()> {
    let mut editor = editor_with_text("");
    editor.insert_text("saved")?;
    editor.run_command("core.insert_divider", None)?;

    let json = editor.to_value().to_json_pretty()?;
    let loaded = Editor::from_value(PlateValue::from_json_str(&json)?, PluginRegistry::core())?;

    assert_eq!(loaded.doc(), editor.doc());
    assert_eq!(loaded.selection(), None);
    Ok(())
}

#[test]
fn snapshot_with_foreign_schema_is_rejected() -> anyhow::Result<()> {
    let json = r#"{ "schema": "other", "version": 1, "document": { "children": [] } }"#;

    let err = Editor::from_value(PlateValue::from_json_str(json)?, PluginRegistry::core())
        .unwrap_err();

    assert!(matches!(err, ApplyError::Serde(_)));
    Ok(())
}

#[test]
fn loading_normalizes_the_document() -> anyhow::Result<()> {
    let json = r#"{ "document": { "children": [] } }"#;

    let editor = Editor::from_value(PlateValue::from_json_str(json)?, PluginRegistry::core())?;

    assert_eq!(editor.doc().children, vec![Node::paragraph("")]);
    Ok(())
}

#[test]
fn ops_are_tagged_by_name() -> anyhow::Result<()> {
    let op = Op::InsertText {
        path: vec![0, 0],
        offset: 1,
        text: "x".to_string(),
    };

    let json = serde_json::to_value(&op)?;

    assert_eq!(json["op"], "insert_text");
    assert_eq!(serde_json::from_value::<Op>(json)?, op);
    Ok(())
}
