use canvas_plate::{
    Decoration, DecorationKind, Editable, EditableConfig, MemoryHost, Platform, RunKind,
};
use canvas_plate_core::{
    Document, Editor, Node, NodeProperties, Op, PluginRegistry, Point, Range, Transaction, Unit,
};

fn editable_with(children: Vec<Node>, caret: Point, config: EditableConfig) -> Editable<MemoryHost> {
    let editor = Editor::new(
        Document::new(children),
        Some(Range::collapsed(caret)),
        PluginRegistry::core(),
    );
    Editable::new(editor, MemoryHost::new(), config.platform(Platform::Other)).unwrap()
}

#[test]
fn initial_render_mounts_each_block_once() {
    let editable = editable_with(
        vec![Node::paragraph("one"), Node::paragraph("two")],
        Point::new(vec![0, 0], 0),
        EditableConfig::default(),
    );

    let pass = editable.host().last_pass().unwrap();
    assert_eq!(pass.mounted.len(), 2);
    assert!(pass.unmounted.is_empty());
    assert_eq!(editable.view().tables().len(), 4);

    let text = editable.view().handle_at(editable.editor(), &[1, 0]).unwrap();
    assert_eq!(editable.host().text_of(text), "two");
    assert_eq!(editable.view().tables().find_path(text), Some(vec![1, 0]));
}

#[test]
fn split_mounts_only_the_new_block() {
    let mut editable = editable_with(
        vec![Node::paragraph("hi")],
        Point::new(vec![0, 0], 1),
        EditableConfig::default(),
    );
    let block = editable.view().handle_at(editable.editor(), &[0]).unwrap();
    let leaf = editable.view().handle_at(editable.editor(), &[0, 0]).unwrap();

    editable
        .update(|editor| {
            editor.apply(Transaction::new(vec![
                Op::SplitNode {
                    path: vec![0, 0],
                    position: 1,
                    properties: NodeProperties::default(),
                },
                Op::SplitNode {
                    path: vec![0],
                    position: 1,
                    properties: NodeProperties::default(),
                },
            ]))
        })
        .unwrap();
    editable.run_until_idle();

    assert_eq!(
        editable.editor().doc().children,
        vec![Node::paragraph("h"), Node::paragraph("i")]
    );
    let pass = editable.host().last_pass().unwrap();
    assert_eq!(pass.mounted.len(), 1);
    assert!(pass.unmounted.is_empty());
    assert_eq!(pass.updated, vec![leaf]);
    assert_eq!(editable.view().handle_at(editable.editor(), &[0]), Some(block));
    assert_eq!(editable.host().text_of(leaf), "h");

    let second = editable.view().handle_at(editable.editor(), &[1, 0]).unwrap();
    assert_eq!(editable.host().text_of(second), "i");
}

#[test]
fn merge_unmounts_the_merged_block() {
    let mut editable = editable_with(
        vec![Node::paragraph("te"), Node::paragraph("st")],
        Point::new(vec![1, 0], 0),
        EditableConfig::default(),
    );
    let first = editable.view().handle_at(editable.editor(), &[0, 0]).unwrap();
    let mut gone = vec![
        editable.view().handle_at(editable.editor(), &[1]).unwrap(),
        editable.view().handle_at(editable.editor(), &[1, 0]).unwrap(),
    ];
    gone.sort();

    editable
        .update(|editor| editor.delete_backward(Unit::Character))
        .unwrap();
    editable.run_until_idle();

    assert_eq!(editable.editor().doc().children, vec![Node::paragraph("test")]);
    assert_eq!(
        editable.editor().selection(),
        Some(&Range::collapsed(Point::new(vec![0, 0], 2)))
    );
    let pass = editable.host().last_pass().unwrap();
    assert!(pass.mounted.is_empty());
    assert_eq!(pass.unmounted, gone);
    assert_eq!(editable.host().text_of(first), "test");
    assert!(!editable.view().tables().is_mounted(gone[0]));
}

#[test]
fn empty_leaf_renders_a_line_break_padding() {
    let editable = editable_with(
        vec![Node::paragraph("")],
        Point::new(vec![0, 0], 0),
        EditableConfig::default(),
    );

    let text = editable.view().view().text(&[0, 0]).unwrap();
    assert_eq!(text.runs.len(), 1);
    assert_eq!(
        text.runs[0].kind,
        RunKind::ZeroWidth {
            length: 0,
            line_break: true,
            mark_placeholder: false,
        }
    );
    assert_eq!(editable.host().text_of(text.handle), "\u{feff}");
}

#[test]
fn void_text_renders_as_one_padding_run() {
    let editable = editable_with(
        vec![Node::paragraph("a"), Node::divider(), Node::paragraph("b")],
        Point::new(vec![0, 0], 0),
        EditableConfig::default(),
    );

    let divider = editable.view().view().node(&[1]).unwrap().as_element().unwrap();
    assert!(divider.void);
    assert_eq!(divider.tag, "hr");
    let text = editable.view().view().text(&[1, 0]).unwrap();
    assert_eq!(text.runs.len(), 1);
    assert!(text.runs[0].is_zero_width());
}

#[test]
fn decorations_split_the_leaf_into_runs() {
    let mut editable = editable_with(
        vec![Node::paragraph("hello")],
        Point::new(vec![0, 0], 0),
        EditableConfig::default(),
    );
    let handle = editable.view().handle_at(editable.editor(), &[0, 0]).unwrap();

    editable.set_decorations(vec![Decoration::new(
        Range::new(Point::new(vec![0, 0], 1), Point::new(vec![0, 0], 3)),
        DecorationKind::Custom("highlight".to_string()),
    )]);
    editable.run_until_idle();

    let text = editable.view().view().text(&[0, 0]).unwrap();
    let parts: Vec<&str> = text.runs.iter().map(|run| run.text.as_str()).collect();
    assert_eq!(parts, vec!["h", "el", "lo"]);
    assert_eq!(
        text.runs[1].decorations,
        vec![DecorationKind::Custom("highlight".to_string())]
    );
    assert_eq!(editable.host().last_pass().unwrap().updated, vec![handle]);
    assert_eq!(editable.host().text_of(handle), "hello");
}

#[test]
fn placeholder_shows_until_composition_starts() {
    let mut editable = editable_with(
        vec![Node::paragraph("")],
        Point::new(vec![0, 0], 0),
        EditableConfig::default().placeholder("Write something"),
    );

    let text = editable.view().view().text(&[0, 0]).unwrap();
    assert_eq!(text.runs[0].kind, RunKind::Placeholder);
    assert_eq!(text.runs[0].text, "Write something");
    assert!(!text.runs[0].is_editable());
    assert_eq!(editable.host().resizes(), 1);

    editable.on_composition_start();
    editable.run_until_idle();

    let text = editable.view().view().text(&[0, 0]).unwrap();
    assert_eq!(text.runs.len(), 1);
    assert!(
        !editable
            .decorations()
            .iter()
            .any(|decoration| decoration.kind == DecorationKind::Placeholder)
    );
    assert_eq!(editable.host().resizes(), 2);
}

#[test]
fn placeholder_hides_once_text_is_typed() {
    let mut editable = editable_with(
        vec![Node::paragraph("")],
        Point::new(vec![0, 0], 0),
        EditableConfig::default().placeholder("Write something"),
    );

    editable.update(|editor| editor.insert_text("a")).unwrap();
    editable.run_until_idle();

    let text = editable.view().view().text(&[0, 0]).unwrap();
    assert_eq!(text.runs.len(), 1);
    assert_eq!(text.runs[0].text, "a");
}

#[test]
fn teardown_unmounts_everything() {
    let editable = editable_with(
        vec![Node::paragraph("one"), Node::paragraph("two")],
        Point::new(vec![0, 0], 0),
        EditableConfig::default(),
    );
    let text = editable.view().handle_at(editable.editor(), &[0, 0]).unwrap();

    let (editor, host) = editable.teardown();

    assert_eq!(host.last_pass().unwrap().unmounted.len(), 4);
    assert_eq!(host.text_of(text), "");
    assert_eq!(editor.doc().children.len(), 2);
}
