use canvas_plate::{
    DecorationKind, Editable, EditableConfig, MemoryHost, Platform, RelativeRange, RemoteCursor,
    RemoteCursorCache, remote_decorations,
};
use canvas_plate_core::{Document, Editor, Node, PluginRegistry, Point, Range};
use serde_json::{Value, json};

fn editable_with(children: Vec<Node>) -> Editable<MemoryHost> {
    let editor = Editor::new(
        Document::new(children),
        Some(Range::collapsed(Point::new(vec![0, 0], 0))),
        PluginRegistry::core(),
    );
    let config = EditableConfig::default().platform(Platform::Other);
    let mut editable = Editable::new(editor, MemoryHost::new(), config).unwrap();
    editable.tick();
    editable
}

fn cursor(editor: &Editor, client_id: u64, range: Range) -> RemoteCursor {
    RemoteCursor {
        client_id,
        data: json!({ "name": "ada", "color": "#f60" }),
        selection: RelativeRange::from_range(editor, &range),
    }
}

fn remote_ranges(editable: &Editable<MemoryHost>) -> Vec<(DecorationKind, Range)> {
    editable
        .decorations()
        .iter()
        .filter(|decoration| {
            matches!(
                decoration.kind,
                DecorationKind::RemoteCaret { .. } | DecorationKind::RemoteSelection { .. }
            )
        })
        .map(|decoration| (decoration.kind.clone(), decoration.range.clone()))
        .collect()
}

#[test]
fn remote_selection_is_decorated() {
    let mut editable = editable_with(vec![Node::paragraph("hello"), Node::paragraph("world")]);
    let range = Range::new(Point::new(vec![1, 0], 1), Point::new(vec![1, 0], 3));
    let remote = cursor(editable.editor(), 7, range.clone());

    editable.set_remote_cursors(vec![remote]);
    editable.run_until_idle();

    assert_eq!(
        remote_ranges(&editable),
        vec![
            (DecorationKind::RemoteSelection { client_id: 7 }, range),
            (
                DecorationKind::RemoteCaret { client_id: 7 },
                Range::collapsed(Point::new(vec![1, 0], 3))
            ),
        ]
    );
}

#[test]
fn remote_cursor_follows_structural_edits() {
    let mut editable = editable_with(vec![Node::paragraph("hello"), Node::paragraph("world")]);
    let remote = cursor(
        editable.editor(),
        7,
        Range::collapsed(Point::new(vec![1, 0], 2)),
    );
    editable.set_remote_cursors(vec![remote]);
    editable.run_until_idle();

    editable.update(|editor| editor.insert_break()).unwrap();
    editable.run_until_idle();

    assert_eq!(editable.editor().doc().children.len(), 3);
    assert_eq!(
        remote_ranges(&editable),
        vec![(
            DecorationKind::RemoteCaret { client_id: 7 },
            Range::collapsed(Point::new(vec![2, 0], 2))
        )]
    );
}

#[test]
fn remote_offsets_are_clamped_to_the_leaf() {
    let mut editable = editable_with(vec![Node::paragraph("hello")]);
    let remote = cursor(
        editable.editor(),
        3,
        Range::collapsed(Point::new(vec![0, 0], 5)),
    );
    editable.set_remote_cursors(vec![remote]);

    editable
        .update(|editor| {
            editor.delete_range(Range::new(
                Point::new(vec![0, 0], 2),
                Point::new(vec![0, 0], 5),
            ))
        })
        .unwrap();
    editable.run_until_idle();

    assert_eq!(editable.editor().doc().children, vec![Node::paragraph("he")]);
    assert_eq!(
        remote_ranges(&editable),
        vec![(
            DecorationKind::RemoteCaret { client_id: 3 },
            Range::collapsed(Point::new(vec![0, 0], 2))
        )]
    );
}

#[test]
fn cursor_in_a_removed_leaf_is_dropped() {
    let mut editable = editable_with(vec![Node::paragraph("hello"), Node::paragraph("world")]);
    let remote = cursor(
        editable.editor(),
        9,
        Range::collapsed(Point::new(vec![1, 0], 1)),
    );
    editable.set_remote_cursors(vec![remote]);
    editable.run_until_idle();
    assert_eq!(remote_ranges(&editable).len(), 1);

    editable
        .update(|editor| {
            editor.select(Range::new(
                Point::new(vec![0, 0], 0),
                Point::new(vec![1, 0], 5),
            ))?;
            editor.delete_fragment(false)
        })
        .unwrap();
    editable.run_until_idle();

    assert_eq!(editable.editor().doc().children, vec![Node::paragraph("")]);
    assert!(remote_ranges(&editable).is_empty());
}

#[test]
fn projection_is_cached_per_revision() {
    let mut editor = Editor::new(
        Document::new(vec![Node::paragraph("hello")]),
        None,
        PluginRegistry::core(),
    );
    let cursors = vec![cursor(&editor, 1, Range::collapsed(Point::new(vec![0, 0], 4)))];
    let mut cache = RemoteCursorCache::default();

    let first = cache.project(&editor, &cursors).to_vec();
    assert_eq!(first, vec![(1, Range::collapsed(Point::new(vec![0, 0], 4)))]);

    editor
        .delete_range(Range::new(
            Point::new(vec![0, 0], 0),
            Point::new(vec![0, 0], 3),
        ))
        .unwrap();
    let decorations = remote_decorations(&editor, &mut cache, &cursors);

    assert_eq!(decorations.len(), 1);
    assert_eq!(decorations[0].range, Range::collapsed(Point::new(vec![0, 0], 2)));
}

#[test]
fn cursors_deserialize_from_the_transport() {
    let editor = Editor::new(
        Document::new(vec![Node::paragraph("hello")]),
        None,
        PluginRegistry::core(),
    );
    let key = editor.keys().key(&[0, 0]).unwrap().id();

    let remote: RemoteCursor = serde_json::from_value(json!({
        "client_id": 42,
        "selection": {
            "anchor": { "key": key, "offset": 1 },
            "focus": { "key": key, "offset": 4 },
        },
    }))
    .unwrap();

    assert_eq!(remote.client_id, 42);
    assert_eq!(remote.data, Value::Null);
    assert_eq!(
        remote.selection.unwrap().to_range(&editor),
        Some(Range::new(
            Point::new(vec![0, 0], 1),
            Point::new(vec![0, 0], 4)
        ))
    );
}
