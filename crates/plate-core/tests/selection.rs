use canvas_plate_core::{
    Affinity, ApplyError, Document, Editor, MarkKind, Node, NodeProperties, Op, PluginRegistry,
    Point, Range, RangeAffinity,
};

fn editor_with(children: Vec<Node>, selection: Range) -> Editor {
    Editor::new(Document::new(children), Some(selection), PluginRegistry::core())
}

#[test]
fn insert_before_selection_shifts_offsets() {
    let selection = Range::new(Point::new(vec![0, 0], 3), Point::new(vec![0, 0], 5));
    let mut editor = editor_with(vec![Node::paragraph("abcdef")], selection);

    editor
        .apply_operation(Op::InsertText {
            path: vec![0, 0],
            offset: 1,
            text: "xyz".to_string(),
        })
        .unwrap();

    assert_eq!(
        editor.selection(),
        Some(&Range::new(
            Point::new(vec![0, 0], 6),
            Point::new(vec![0, 0], 8),
        ))
    );
}

#[test]
fn merge_resolves_boundary_point_into_merged_leaf() {
    let selection = Range::collapsed(Point::new(vec![1, 0], 0));
    let mut editor = editor_with(vec![Node::paragraph("te"), Node::paragraph("st")], selection);

    editor
        .apply_operation(Op::MergeNode {
            path: vec![1],
            position: 1,
            properties: NodeProperties::of(&Node::paragraph("")),
        })
        .unwrap();

    assert_eq!(editor.doc().children, vec![Node::paragraph("test")]);
    assert_eq!(
        editor.selection(),
        Some(&Range::collapsed(Point::new(vec![0, 0], 2)))
    );
}

#[test]
fn removed_selection_clamps_to_previous_leaf() {
    let selection = Range::collapsed(Point::new(vec![1, 0], 1));
    let mut editor = editor_with(vec![Node::paragraph("ab"), Node::paragraph("cd")], selection);

    editor
        .apply_operation(Op::RemoveNode {
            path: vec![1],
            node: Node::paragraph("cd"),
        })
        .unwrap();

    assert_eq!(
        editor.selection(),
        Some(&Range::collapsed(Point::new(vec![0, 0], 2)))
    );
}

#[test]
fn removed_first_block_clamps_to_following_leaf() {
    let selection = Range::collapsed(Point::new(vec![0, 0], 1));
    let mut editor = editor_with(vec![Node::paragraph("ab"), Node::paragraph("cd")], selection);

    editor
        .apply_operation(Op::RemoveNode {
            path: vec![0],
            node: Node::paragraph("ab"),
        })
        .unwrap();

    assert_eq!(
        editor.selection(),
        Some(&Range::collapsed(Point::new(vec![0, 0], 0)))
    );
}

#[test]
fn selecting_an_invalid_point_fails() {
    let selection = Range::collapsed(Point::new(vec![0, 0], 0));
    let mut editor = editor_with(vec![Node::paragraph("ab")], selection.clone());

    let err = editor
        .select(Range::collapsed(Point::new(vec![0, 0], 9)))
        .unwrap_err();
    assert!(matches!(err, ApplyError::InvalidPoint(_)));

    let err = editor
        .select(Range::collapsed(Point::new(vec![3], 0)))
        .unwrap_err();
    assert!(matches!(err, ApplyError::InvalidPath { .. }));

    assert_eq!(editor.selection(), Some(&selection));
}

#[test]
fn clamp_point_finds_the_nearest_leaf() {
    let selection = Range::collapsed(Point::new(vec![0, 0], 0));
    let editor = editor_with(vec![Node::paragraph("ab"), Node::paragraph("cd")], selection);

    assert_eq!(
        editor.clamp_point(&Point::new(vec![0, 0], 7)),
        Some(Point::new(vec![0, 0], 2))
    );
    assert_eq!(
        editor.clamp_point(&Point::new(vec![4, 2], 1)),
        Some(Point::new(vec![1, 0], 1))
    );
}

#[test]
fn moving_the_selection_clears_pending_marks() {
    let selection = Range::collapsed(Point::new(vec![0, 0], 1));
    let mut editor = editor_with(vec![Node::paragraph("ab")], selection);

    editor.add_mark(MarkKind::Italic).unwrap();
    assert!(editor.pending_marks().is_some());

    editor
        .select(Range::collapsed(Point::new(vec![0, 0], 2)))
        .unwrap();

    assert_eq!(editor.pending_marks(), None);
    assert!(editor.take_change().unwrap().marks_changed);
}

#[test]
fn inward_range_does_not_grow_over_inserted_text() {
    let range = Range::new(Point::new(vec![0], 2), Point::new(vec![0], 4));
    let at_start = Op::InsertText {
        path: vec![0],
        offset: 2,
        text: "x".to_string(),
    };
    let at_end = Op::InsertText {
        path: vec![0],
        offset: 5,
        text: "y".to_string(),
    };

    let inward = range
        .transform(&at_start, RangeAffinity::Inward)
        .and_then(|r| r.transform(&at_end, RangeAffinity::Inward))
        .unwrap();
    assert_eq!(inward, Range::new(Point::new(vec![0], 3), Point::new(vec![0], 5)));

    let outward = range
        .transform(&at_start, RangeAffinity::Outward)
        .unwrap();
    assert_eq!(outward.anchor, Point::new(vec![0], 2));
    assert_eq!(
        Point::new(vec![0], 2).transform(&at_start, Affinity::Backward),
        Some(Point::new(vec![0], 2))
    );
}
