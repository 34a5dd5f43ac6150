use canvas_plate_core::{
    ApplyError, ChildConstraint, Document, Editor, Node, NodeRole, NodeSpec, NormalizePass, Op,
    PlatePlugin, PluginRegistry, Point, Range, RegistryError, Transaction,
};

fn messy_document() -> Document {
    Document::new(vec![
        Node::text("loose"),
        Node::element("paragraph", Vec::new()),
        Node::element("paragraph", vec![Node::text("a"), Node::text("b")]),
        Node::element("blockquote", vec![Node::text("quoted")]),
        Node::element("paragraph", vec![Node::link("https://example.com", "x")]),
        Node::element("divider", vec![Node::text("junk")]),
    ])
}

#[test]
fn normalization_repairs_every_invariant() {
    let editor = Editor::new(messy_document(), None, PluginRegistry::core());

    assert_eq!(
        editor.doc().children,
        vec![
            Node::paragraph("loose"),
            Node::paragraph(""),
            Node::paragraph("ab"),
            Node::element("blockquote", vec![Node::paragraph("quoted")]),
            Node::element(
                "paragraph",
                vec![
                    Node::text(""),
                    Node::link("https://example.com", "x"),
                    Node::text(""),
                ],
            ),
            Node::divider(),
        ]
    );
    editor.registry().check_invariants(editor.doc()).unwrap();
}

#[test]
fn normalization_is_idempotent() {
    let mut editor = Editor::new(messy_document(), None, PluginRegistry::core());
    let once = editor.doc().clone();

    editor.normalize().unwrap();

    assert_eq!(editor.doc(), &once);
    assert_eq!(editor.take_change(), None);
}

#[test]
fn empty_document_gets_a_paragraph() {
    let mut editor = Editor::new(
        Document::new(vec![Node::paragraph("only")]),
        Some(Range::collapsed(Point::new(vec![0, 0], 2))),
        PluginRegistry::core(),
    );

    editor
        .apply_operation(Op::RemoveNode {
            path: vec![0],
            node: Node::paragraph("only"),
        })
        .unwrap();

    assert_eq!(editor.doc().children, vec![Node::paragraph("")]);
    assert_eq!(
        editor.selection(),
        Some(&Range::collapsed(Point::new(vec![0, 0], 0)))
    );
}

#[test]
fn block_inside_paragraph_collapses_to_text() {
    let editor = Editor::new(
        Document::new(vec![Node::element(
            "paragraph",
            vec![Node::text("a"), Node::paragraph("b")],
        )]),
        None,
        PluginRegistry::core(),
    );

    assert_eq!(editor.doc().children, vec![Node::paragraph("ab")]);
}

#[test]
fn failed_operation_rolls_back_the_batch() {
    let mut editor = Editor::new(
        Document::new(vec![Node::paragraph("keep")]),
        Some(Range::collapsed(Point::new(vec![0, 0], 0))),
        PluginRegistry::core(),
    );
    let before = editor.doc().clone();

    let err = editor
        .apply(Transaction::new(vec![
            Op::InsertText {
                path: vec![0, 0],
                offset: 0,
                text: "x".to_string(),
            },
            Op::RemoveNode {
                path: vec![5],
                node: Node::paragraph(""),
            },
        ]))
        .unwrap_err();

    assert!(matches!(err, ApplyError::InvalidPath { .. }));
    assert_eq!(editor.doc(), &before);
    assert_eq!(
        editor.selection(),
        Some(&Range::collapsed(Point::new(vec![0, 0], 0)))
    );
    assert_eq!(editor.revision(), 0);
    assert!(!editor.can_undo());
    assert_eq!(editor.take_change(), None);
}

struct AlwaysDirty;

impl NormalizePass for AlwaysDirty {
    fn id(&self) -> &'static str {
        "test.always_dirty"
    }

    fn run(&self, _doc: &Document, path: &[usize], _registry: &PluginRegistry) -> Vec<Op> {
        if !path.is_empty() {
            return Vec::new();
        }
        vec![Op::InsertText {
            path: vec![0, 0],
            offset: 0,
            text: "!".to_string(),
        }]
    }
}

struct AlwaysDirtyPlugin;

impl PlatePlugin for AlwaysDirtyPlugin {
    fn id(&self) -> &'static str {
        "test.always_dirty"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(AlwaysDirty)]
    }
}

#[test]
fn runaway_normalization_fails_atomically() {
    let registry = PluginRegistry::new(vec![Box::new(AlwaysDirtyPlugin) as Box<dyn PlatePlugin>])
        .unwrap();
    let mut editor = Editor::new(
        Document::new(vec![Node::paragraph("a")]),
        Some(Range::collapsed(Point::new(vec![0, 0], 1))),
        registry,
    );
    let before = editor.doc().clone();

    let err = editor.insert_text("b").unwrap_err();

    assert!(matches!(err, ApplyError::NormalizeDidNotConverge(_)));
    assert_eq!(editor.doc(), &before);
}

#[test]
fn unrepaired_invariant_is_reported() {
    let registry = PluginRegistry::new(Vec::new()).unwrap();
    let mut editor = Editor::new(
        Document::new(vec![Node::paragraph("a")]),
        None,
        registry,
    );

    let err = editor
        .apply_operation(Op::RemoveNode {
            path: vec![0],
            node: Node::paragraph("a"),
        })
        .unwrap_err();

    assert!(matches!(err, ApplyError::InvariantViolation(_)));
    assert_eq!(editor.doc().children, vec![Node::paragraph("a")]);
}

struct SecondParagraph;

impl PlatePlugin for SecondParagraph {
    fn id(&self) -> &'static str {
        "test.second_paragraph"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec {
            kind: "paragraph".to_string(),
            role: NodeRole::Block,
            is_void: false,
            children: ChildConstraint::InlineOnly,
        }]
    }
}

#[test]
fn duplicate_kinds_are_rejected() {
    let mut registry = PluginRegistry::core();

    let err = registry.register_plugin(Box::new(SecondParagraph)).unwrap_err();

    assert_eq!(err, RegistryError::DuplicateKind("paragraph".to_string()));
}
