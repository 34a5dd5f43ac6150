use canvas_plate_core::{
    Document, Editor, Node, NodeProperties, Op, PluginRegistry, Point, Range,
};

fn editor_with(children: Vec<Node>) -> Editor {
    Editor::new(
        Document::new(children),
        Some(Range::collapsed(Point::new(vec![0, 0], 0))),
        PluginRegistry::core(),
    )
}

#[test]
fn every_node_is_keyed() {
    let editor = editor_with(vec![Node::paragraph("a"), Node::paragraph("b")]);

    assert_eq!(editor.keys().len(), 4);
    let block = editor.keys().key(&[1]).unwrap();
    assert_eq!(editor.keys().path_of(block), Some(vec![1]));
}

#[test]
fn split_keeps_the_key_on_the_first_half() {
    let mut editor = editor_with(vec![Node::paragraph("hi")]);
    let block = editor.keys().key(&[0]).unwrap();
    let leaf = editor.keys().key(&[0, 0]).unwrap();

    editor
        .batch("test:split", |editor| {
            editor.apply_operation(Op::SplitNode {
                path: vec![0, 0],
                position: 1,
                properties: NodeProperties::default(),
            })?;
            editor.apply_operation(Op::SplitNode {
                path: vec![0],
                position: 1,
                properties: NodeProperties::default(),
            })
        })
        .unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph("h"), Node::paragraph("i")]
    );
    assert_eq!(editor.keys().key(&[0]), Some(block));
    assert_eq!(editor.keys().key(&[0, 0]), Some(leaf));
    let new_block = editor.keys().key(&[1]).unwrap();
    assert_ne!(new_block, block);
    assert_ne!(editor.keys().key(&[1, 0]), Some(leaf));
}

#[test]
fn merge_drops_the_merged_key() {
    let mut editor = editor_with(vec![Node::paragraph("te"), Node::paragraph("st")]);
    let first = editor.keys().key(&[0]).unwrap();
    let first_leaf = editor.keys().key(&[0, 0]).unwrap();
    let second = editor.keys().key(&[1]).unwrap();

    editor
        .apply_operation(Op::MergeNode {
            path: vec![1],
            position: 1,
            properties: NodeProperties::of(&Node::paragraph("")),
        })
        .unwrap();

    assert_eq!(editor.doc().children, vec![Node::paragraph("test")]);
    assert_eq!(editor.keys().key(&[0]), Some(first));
    assert_eq!(editor.keys().key(&[0, 0]), Some(first_leaf));
    assert_eq!(editor.keys().path_of(second), None);
    assert_eq!(editor.keys().len(), 2);
}

#[test]
fn insert_shifts_keys_of_later_siblings() {
    let mut editor = editor_with(vec![Node::paragraph("a"), Node::paragraph("b")]);
    let second = editor.keys().key(&[1]).unwrap();

    editor
        .apply_operation(Op::InsertNode {
            path: vec![1],
            node: Node::paragraph("new"),
        })
        .unwrap();

    assert_eq!(editor.keys().path_of(second), Some(vec![2]));
    assert!(editor.keys().key(&[1, 0]).is_some());
    assert_eq!(editor.keys().len(), 6);
}
