use canvas_plate::{
    BridgeError, Decoration, DecorationKind, Editable, EditableConfig, HostNode, HostPoint,
    HostSurface, MemoryHost, Platform, RunId,
};
use canvas_plate_core::{Document, Editor, Node, PluginRegistry, Point, Range};

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

fn run(editable: &Editable<MemoryHost>, path: &[usize], index: usize) -> RunId {
    let text = editable.view().handle_at(editable.editor(), path).unwrap();
    RunId { text, index }
}

#[test]
fn points_round_trip_through_the_host() {
    let mut editable = editable_with(vec![Node::paragraph("hello")], Point::new(vec![0, 0], 0));
    editable.set_decorations(vec![Decoration::new(
        Range::new(Point::new(vec![0, 0], 1), Point::new(vec![0, 0], 3)),
        DecorationKind::Custom("highlight".to_string()),
    )]);
    editable.run_until_idle();

    let bridge = editable.bridge();
    for offset in 0..=5 {
        let point = Point::new(vec![0, 0], offset);
        let host = bridge.point_to_host(&point).unwrap();
        assert_eq!(bridge.host_to_point(&host, true).unwrap(), point, "offset {offset}");
    }
}

#[test]
fn point_in_a_later_run_counts_earlier_runs() {
    let mut editable = editable_with(vec![Node::paragraph("hello")], Point::new(vec![0, 0], 0));
    editable.set_decorations(vec![Decoration::new(
        Range::new(Point::new(vec![0, 0], 1), Point::new(vec![0, 0], 3)),
        DecorationKind::Custom("highlight".to_string()),
    )]);
    editable.run_until_idle();

    let host = editable
        .bridge()
        .point_to_host(&Point::new(vec![0, 0], 4))
        .unwrap();

    assert_eq!(host, HostPoint::run(run(&editable, &[0, 0], 2), 1));
}

#[test]
fn void_points_map_to_offset_zero() {
    let editable = editable_with(
        vec![Node::paragraph("a"), Node::divider(), Node::paragraph("b")],
        Point::new(vec![0, 0], 0),
    );
    let bridge = editable.bridge();

    let host = bridge.point_to_host(&Point::new(vec![1, 0], 0)).unwrap();
    assert_eq!(host, HostPoint::run(run(&editable, &[1, 0], 0), 0));
    assert_eq!(
        bridge.host_to_point(&HostPoint::run(run(&editable, &[1, 0], 0), 1), true).unwrap(),
        Point::new(vec![1, 0], 0)
    );
}

#[test]
fn zero_width_range_edges_sit_after_the_padding() {
    let editable = editable_with(vec![Node::paragraph("")], Point::new(vec![0, 0], 0));

    let target = editable
        .bridge()
        .range_to_host(&Range::collapsed(Point::new(vec![0, 0], 0)))
        .unwrap();

    assert_eq!(target.range.start, HostPoint::run(run(&editable, &[0, 0], 0), 1));
    assert!(!target.backward);
}

#[test]
fn inexact_coordinates_snap_to_the_nearest_run() {
    let editable = editable_with(
        vec![Node::paragraph("ab"), Node::paragraph("cd")],
        Point::new(vec![0, 0], 0),
    );
    let bridge = editable.bridge();
    let second = editable.view().handle_at(editable.editor(), &[1]).unwrap();

    let point = bridge
        .host_to_point(&HostPoint::new(HostNode::Element(second), 0), false)
        .unwrap();
    assert_eq!(point, Point::new(vec![1, 0], 0));

    let end = bridge
        .host_to_point(&HostPoint::new(HostNode::Editor, 2), false)
        .unwrap();
    assert_eq!(end, Point::new(vec![1, 0], 2));

    assert!(matches!(
        bridge.host_to_point(&HostPoint::new(HostNode::Element(second), 0), true),
        Err(BridgeError::UnresolvableHostSelection)
    ));
    assert!(matches!(
        bridge.host_to_point(&HostPoint::new(HostNode::Foreign, 0), false),
        Err(BridgeError::UnresolvableHostSelection)
    ));
}

#[test]
fn initial_sync_writes_the_host_selection() {
    let editable = editable_with(vec![Node::paragraph("hello")], Point::new(vec![0, 0], 2));

    let selection = editable.host().selection().unwrap();
    assert_eq!(selection.anchor, HostPoint::run(run(&editable, &[0, 0], 0), 2));
    assert!(selection.is_collapsed());
    assert_eq!(editable.host().selection_writes(), 1);
    assert_eq!(editable.host().scrolls().len(), 1);
}

#[test]
fn backward_ranges_are_written_extent_first() {
    let mut editable = editable_with(vec![Node::paragraph("hello")], Point::new(vec![0, 0], 0));

    editable
        .update(|editor| {
            editor.select(Range::new(
                Point::new(vec![0, 0], 4),
                Point::new(vec![0, 0], 1),
            ))
        })
        .unwrap();
    editable.run_until_idle();

    let text = run(&editable, &[0, 0], 0);
    let selection = editable.host().selection().unwrap();
    assert_eq!(selection.anchor, HostPoint::run(text, 4));
    assert_eq!(selection.focus, HostPoint::run(text, 1));
}

#[test]
fn host_selection_changes_are_committed() {
    let mut editable = editable_with(vec![Node::paragraph("hello")], Point::new(vec![0, 0], 0));
    let text = run(&editable, &[0, 0], 0);

    editable
        .host_mut()
        .select(HostPoint::run(text, 1), HostPoint::run(text, 3));
    editable.on_selection_change();

    assert_eq!(
        editable.editor().selection(),
        Some(&Range::new(
            Point::new(vec![0, 0], 1),
            Point::new(vec![0, 0], 3)
        ))
    );
}

#[test]
fn selection_changes_are_ignored_while_the_engine_writes() {
    let mut editable = editable_with(vec![Node::paragraph("hello")], Point::new(vec![0, 0], 0));
    let text = run(&editable, &[0, 0], 0);

    editable
        .update(|editor| editor.select(Range::collapsed(Point::new(vec![0, 0], 5))))
        .unwrap();
    editable.run_until_idle();
    assert!(editable.state().updating_selection);

    editable.host_mut().select(HostPoint::run(text, 2), HostPoint::run(text, 2));
    editable.on_selection_change();
    assert_eq!(
        editable.editor().selection(),
        Some(&Range::collapsed(Point::new(vec![0, 0], 5)))
    );

    editable.tick();
    assert!(!editable.state().updating_selection);
    editable.on_selection_change();
    assert_eq!(
        editable.editor().selection(),
        Some(&Range::collapsed(Point::new(vec![0, 0], 2)))
    );
}

#[test]
fn foreign_selection_is_ignored_unless_read_only() {
    let mut editable = editable_with(vec![Node::paragraph("hello")], Point::new(vec![0, 0], 1));
    let foreign = HostPoint::new(HostNode::Foreign, 0);

    editable.host_mut().select(foreign, foreign);
    editable.on_selection_change();
    assert_eq!(
        editable.editor().selection(),
        Some(&Range::collapsed(Point::new(vec![0, 0], 1)))
    );

    editable.set_read_only(true);
    editable.on_selection_change();
    assert_eq!(editable.editor().selection(), None);
}

#[test]
fn sync_skips_a_host_selection_that_already_matches() {
    let mut editable = editable_with(vec![Node::paragraph("hello")], Point::new(vec![0, 0], 5));
    let text = run(&editable, &[0, 0], 0);
    assert_eq!(editable.host().selection_writes(), 1);

    editable.host_mut().select(HostPoint::run(text, 3), HostPoint::run(text, 3));
    editable.on_selection_change();
    editable.tick();

    assert_eq!(
        editable.editor().selection(),
        Some(&Range::collapsed(Point::new(vec![0, 0], 3)))
    );
    assert_eq!(editable.host().selection_writes(), 1);
}
