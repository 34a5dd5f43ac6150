//! Projects the document into host views.
//!
//! Every element becomes an [`ElementView`] and every leaf a [`TextView`] made
//! of [`Run`]s. View identity follows node [`Key`]s: a node that keeps its key
//! keeps its [`HostHandle`], so a render pass only mounts what is new.

use std::collections::{BTreeSet, HashMap, HashSet};

use canvas_plate_core::{Attrs, Editor, ElementNode, Key, Marks, Node, Path, TextNode};
use tracing::{debug, trace};

use crate::decorate::{DecorationKind, DecorationSet, LeafDecoration};
use crate::element::ElementRegistry;
use crate::host::{HostHandle, RunId};

pub const ZERO_WIDTH: char = '\u{FEFF}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunKind {
    String {
        /// The host shows an extra newline so a trailing `\n` gets its line.
        trailing_newline: bool,
    },
    /// Synthetic padding for empty or void text. Its host text is U+FEFF.
    ZeroWidth {
        /// Document length the padding stands for (a void's string length).
        length: usize,
        line_break: bool,
        mark_placeholder: bool,
    },
    /// Non-editable overlay text.
    Placeholder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub id: RunId,
    pub kind: RunKind,
    pub text: String,
    pub marks: Marks,
    pub decorations: Vec<DecorationKind>,
}

impl Run {
    pub fn host_text(&self) -> String {
        match &self.kind {
            RunKind::String { trailing_newline } => {
                let mut text = self.text.clone();
                if *trailing_newline {
                    text.push('\n');
                }
                text
            }
            RunKind::ZeroWidth { .. } => ZERO_WIDTH.to_string(),
            RunKind::Placeholder => self.text.clone(),
        }
    }

    pub fn host_len(&self) -> usize {
        match &self.kind {
            RunKind::String { trailing_newline } => {
                self.text.chars().count() + usize::from(*trailing_newline)
            }
            RunKind::ZeroWidth { .. } => 1,
            RunKind::Placeholder => self.text.chars().count(),
        }
    }

    /// Document characters the run accounts for when locating a point.
    pub fn doc_len(&self) -> usize {
        match &self.kind {
            RunKind::String { .. } => self.text.chars().count(),
            RunKind::ZeroWidth { length, .. } => *length,
            RunKind::Placeholder => 0,
        }
    }

    pub fn is_editable(&self) -> bool {
        !matches!(self.kind, RunKind::Placeholder)
    }

    pub fn is_zero_width(&self) -> bool {
        matches!(self.kind, RunKind::ZeroWidth { .. })
    }

    pub fn is_mark_placeholder(&self) -> bool {
        matches!(
            self.kind,
            RunKind::ZeroWidth {
                mark_placeholder: true,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementView {
    pub handle: HostHandle,
    pub key: Key,
    pub kind: String,
    pub tag: String,
    pub inline: bool,
    pub void: bool,
    pub attributes: Attrs,
    pub children: Vec<ViewNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextView {
    pub handle: HostHandle,
    pub key: Key,
    pub runs: Vec<Run>,
}

impl TextView {
    pub fn run(&self, index: usize) -> Option<&Run> {
        self.runs.get(index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewNode {
    Element(ElementView),
    Text(TextView),
}

impl ViewNode {
    pub fn handle(&self) -> HostHandle {
        match self {
            ViewNode::Element(el) => el.handle,
            ViewNode::Text(text) => text.handle,
        }
    }

    pub fn children(&self) -> &[ViewNode] {
        match self {
            ViewNode::Element(el) => &el.children,
            ViewNode::Text(_) => &[],
        }
    }

    pub fn as_text(&self) -> Option<&TextView> {
        match self {
            ViewNode::Text(text) => Some(text),
            ViewNode::Element(_) => None,
        }
    }

    pub fn as_element(&self) -> Option<&ElementView> {
        match self {
            ViewNode::Element(el) => Some(el),
            ViewNode::Text(_) => None,
        }
    }

    /// Pre-order walk over this node and its descendants.
    pub fn walk(&self, f: &mut impl FnMut(&ViewNode)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewTree {
    pub children: Vec<ViewNode>,
}

impl ViewTree {
    pub fn node(&self, path: &[usize]) -> Option<&ViewNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.children.get(*first)?;
        for ix in rest {
            node = node.children().get(*ix)?;
        }
        Some(node)
    }

    pub fn text(&self, path: &[usize]) -> Option<&TextView> {
        self.node(path)?.as_text()
    }

    pub fn walk(&self, f: &mut impl FnMut(&ViewNode)) {
        for child in &self.children {
            child.walk(f);
        }
    }

    /// Linear search by handle. Prefer [`AssociationTables::find_path`].
    pub fn find(&self, handle: HostHandle) -> Option<&ViewNode> {
        fn search(nodes: &[ViewNode], handle: HostHandle) -> Option<&ViewNode> {
            nodes.iter().find_map(|node| {
                if node.handle() == handle {
                    Some(node)
                } else {
                    search(node.children(), handle)
                }
            })
        }
        search(&self.children, handle)
    }
}

/// What a render pass changed on the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderPass {
    /// Roots of newly mounted subtrees, in document order.
    pub mounted: Vec<HostHandle>,
    pub unmounted: Vec<HostHandle>,
    /// Reused text views whose runs changed.
    pub updated: Vec<HostHandle>,
}

impl RenderPass {
    pub fn is_empty(&self) -> bool {
        self.mounted.is_empty() && self.unmounted.is_empty() && self.updated.is_empty()
    }
}

/// Node identity to view identity.
///
/// `key_to_handle` survives passes and is what lets a moved node keep its
/// view. Parent and index links are rebuilt on every pass and are never
/// authoritative: a path is always recovered by walking parent links.
#[derive(Debug, Default)]
pub struct AssociationTables {
    next_handle: u64,
    key_to_handle: HashMap<Key, HostHandle>,
    handle_to_key: HashMap<HostHandle, Key>,
    parent: HashMap<HostHandle, Option<HostHandle>>,
    index: HashMap<HostHandle, usize>,
}

impl AssociationTables {
    pub fn handle(&self, key: Key) -> Option<HostHandle> {
        self.key_to_handle.get(&key).copied()
    }

    pub fn key(&self, handle: HostHandle) -> Option<Key> {
        self.handle_to_key.get(&handle).copied()
    }

    pub fn parent(&self, handle: HostHandle) -> Option<HostHandle> {
        self.parent.get(&handle).copied().flatten()
    }

    pub fn is_mounted(&self, handle: HostHandle) -> bool {
        self.index.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.key_to_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_to_handle.is_empty()
    }

    /// The document path of a mounted view.
    pub fn find_path(&self, handle: HostHandle) -> Option<Path> {
        let mut path = Vec::new();
        let mut current = Some(handle);
        while let Some(h) = current {
            path.push(*self.index.get(&h)?);
            current = self.parent.get(&h).copied()?;
        }
        path.reverse();
        Some(path)
    }

    fn handle_for(&mut self, key: Key) -> (HostHandle, bool) {
        if let Some(handle) = self.key_to_handle.get(&key) {
            return (*handle, false);
        }
        self.next_handle += 1;
        let handle = HostHandle::new(self.next_handle);
        self.key_to_handle.insert(key, handle);
        self.handle_to_key.insert(handle, key);
        (handle, true)
    }

    fn link(&mut self, handle: HostHandle, parent: Option<HostHandle>, index: usize) {
        self.parent.insert(handle, parent);
        self.index.insert(handle, index);
    }

    fn begin_pass(&mut self) -> HashSet<HostHandle> {
        self.parent.clear();
        self.index.drain().map(|(handle, _)| handle).collect()
    }

    fn evict(&mut self, handle: HostHandle) {
        if let Some(key) = self.handle_to_key.remove(&handle) {
            self.key_to_handle.remove(&key);
        }
    }
}

#[derive(Debug, Default)]
pub struct ViewRenderer {
    tables: AssociationTables,
    elements: ElementRegistry,
    placeholder: Option<String>,
    tree: ViewTree,
}

impl ViewRenderer {
    pub fn new(elements: ElementRegistry, placeholder: Option<String>) -> Self {
        Self {
            elements,
            placeholder,
            ..Self::default()
        }
    }

    pub fn view(&self) -> &ViewTree {
        &self.tree
    }

    pub fn tables(&self) -> &AssociationTables {
        &self.tables
    }

    pub fn elements(&self) -> &ElementRegistry {
        &self.elements
    }

    /// The view handle of the node at `path`, if it is mounted.
    pub fn handle_at(&self, editor: &Editor, path: &[usize]) -> Option<HostHandle> {
        let handle = self.tables.handle(editor.keys().key(path)?)?;
        self.tables.is_mounted(handle).then_some(handle)
    }

    pub fn text_view(&self, handle: HostHandle) -> Option<&TextView> {
        let path = self.tables.find_path(handle)?;
        self.tree.text(&path).filter(|text| text.handle == handle)
    }

    pub fn render(&mut self, editor: &Editor, decorations: &DecorationSet) -> RenderPass {
        let previous = self.tables.begin_pass();
        let mut old_runs = HashMap::new();
        self.tree.walk(&mut |node| {
            if let ViewNode::Text(text) = node {
                old_runs.insert(text.handle, text.runs.clone());
            }
        });

        let mut cx = RenderCx {
            editor,
            decorations,
            tables: &mut self.tables,
            elements: &self.elements,
            placeholder: self.placeholder.as_deref(),
            old_runs: &old_runs,
            pass: RenderPass::default(),
        };
        let children = cx.render_children(&editor.doc().children, &[], None, None, false);
        let mut pass = cx.pass;

        let mut unmounted: Vec<HostHandle> = previous
            .into_iter()
            .filter(|handle| !self.tables.is_mounted(*handle))
            .collect();
        unmounted.sort();
        for handle in &unmounted {
            self.tables.evict(*handle);
        }
        pass.unmounted = unmounted;
        self.tree = ViewTree { children };

        debug!(
            mounted = pass.mounted.len(),
            unmounted = pass.unmounted.len(),
            updated = pass.updated.len(),
            "render pass"
        );
        pass
    }

    /// Unmounts everything.
    pub fn unmount_all(&mut self) -> RenderPass {
        let mut unmounted: Vec<HostHandle> = self.tables.begin_pass().into_iter().collect();
        unmounted.sort();
        for handle in &unmounted {
            self.tables.evict(*handle);
        }
        self.tree = ViewTree::default();
        RenderPass {
            unmounted,
            ..RenderPass::default()
        }
    }
}

struct RenderCx<'a> {
    editor: &'a Editor,
    decorations: &'a DecorationSet,
    tables: &'a mut AssociationTables,
    elements: &'a ElementRegistry,
    placeholder: Option<&'a str>,
    old_runs: &'a HashMap<HostHandle, Vec<Run>>,
    pass: RenderPass,
}

impl RenderCx<'_> {
    fn render_children(
        &mut self,
        children: &[Node],
        parent_path: &[usize],
        parent_handle: Option<HostHandle>,
        parent: Option<&ElementNode>,
        parent_fresh: bool,
    ) -> Vec<ViewNode> {
        children
            .iter()
            .enumerate()
            .map(|(ix, child)| {
                let mut path = parent_path.to_vec();
                path.push(ix);
                self.render_node(child, path, parent_handle, parent, parent_fresh)
            })
            .collect()
    }

    fn render_node(
        &mut self,
        node: &Node,
        path: Path,
        parent_handle: Option<HostHandle>,
        parent: Option<&ElementNode>,
        parent_fresh: bool,
    ) -> ViewNode {
        let key = self.editor.keys().key(&path).unwrap_or_else(|| {
            debug!(?path, "unkeyed node rendered with a fresh key");
            Key::fresh()
        });
        let (handle, fresh) = self.tables.handle_for(key);
        let index = path.last().copied().unwrap_or(0);
        self.tables.link(handle, parent_handle, index);
        if fresh && !parent_fresh {
            trace!(?path, ?handle, "mount");
            self.pass.mounted.push(handle);
        }

        match node {
            Node::Element(el) => {
                let inline = self.editor.is_inline(el);
                let shape = self.elements.render(el, inline);
                let children =
                    self.render_children(&el.children, &path, Some(handle), Some(el), fresh);
                ViewNode::Element(ElementView {
                    handle,
                    key,
                    kind: el.kind.clone(),
                    tag: shape.tag,
                    inline,
                    void: self.editor.is_void(el),
                    attributes: shape.attributes,
                    children,
                })
            }
            Node::Text(leaf) => {
                let runs = self.leaf_runs(&path, leaf, parent, handle);
                if !fresh && self.old_runs.get(&handle) != Some(&runs) {
                    self.pass.updated.push(handle);
                }
                ViewNode::Text(TextView { handle, key, runs })
            }
        }
    }

    fn leaf_runs(
        &self,
        path: &[usize],
        leaf: &TextNode,
        parent: Option<&ElementNode>,
        handle: HostHandle,
    ) -> Vec<Run> {
        let mut runs = Vec::new();
        let mut push = |kind: RunKind, text: String, marks: Marks, decorations: Vec<DecorationKind>| {
            let id = RunId {
                text: handle,
                index: runs.len(),
            };
            runs.push(Run {
                id,
                kind,
                text,
                marks,
                decorations,
            });
        };

        if let Some((_, void)) = self.editor.void_above(path) {
            let length = Node::Element(void.clone()).text_len();
            push(
                RunKind::ZeroWidth {
                    length,
                    line_break: false,
                    mark_placeholder: false,
                },
                String::new(),
                leaf.marks.clone(),
                Vec::new(),
            );
            return runs;
        }

        let is_last_leaf = parent
            .is_some_and(|el| path.last().copied() == el.children.len().checked_sub(1));
        let in_empty_block = parent.is_some_and(|el| {
            !self.editor.is_inline(el) && el.children.iter().all(|child| child.text_len() == 0)
        });

        let len = leaf.len();
        let decorations = self.decorations.for_text(path, len);
        let fragments = fragments(len, &decorations);
        let last = fragments.len().saturating_sub(1);

        for (ix, (start, end, kinds)) in fragments.into_iter().enumerate() {
            if kinds.contains(&DecorationKind::Placeholder) {
                if let Some(placeholder) = self.placeholder {
                    push(
                        RunKind::Placeholder,
                        placeholder.to_string(),
                        Marks::default(),
                        vec![DecorationKind::Placeholder],
                    );
                }
            }

            let text = canvas_plate_core::text::slice_chars(&leaf.text, start, end).to_string();
            let preview = kinds.iter().find_map(|kind| match kind {
                DecorationKind::PendingMarks(marks) => Some(marks.clone()),
                _ => None,
            });
            let kind = if text.is_empty() {
                RunKind::ZeroWidth {
                    length: 0,
                    line_break: is_last_leaf && in_empty_block && ix == last,
                    mark_placeholder: preview.is_some(),
                }
            } else {
                RunKind::String {
                    trailing_newline: is_last_leaf && ix == last && text.ends_with('\n'),
                }
            };
            let marks = preview.unwrap_or_else(|| leaf.marks.clone());
            push(kind, text, marks, kinds);
        }
        runs
    }
}

/// Splits `0..len` at every decoration edge. Each collapsed decoration adds
/// an empty fragment at its offset. An empty leaf is a single fragment.
fn fragments(
    len: usize,
    decorations: &[LeafDecoration<'_>],
) -> Vec<(usize, usize, Vec<DecorationKind>)> {
    if len == 0 {
        let kinds = decorations.iter().map(|d| d.kind.clone()).collect();
        return vec![(0, 0, kinds)];
    }

    let mut edges: BTreeSet<usize> = BTreeSet::from([0, len]);
    for decoration in decorations {
        edges.insert(decoration.start);
        edges.insert(decoration.end);
    }
    let edges: Vec<usize> = edges.into_iter().collect();

    let mut out = Vec::new();
    for (ix, &at) in edges.iter().enumerate() {
        let collapsed: Vec<DecorationKind> = decorations
            .iter()
            .filter(|d| d.is_collapsed() && d.start == at)
            .map(|d| d.kind.clone())
            .collect();
        if !collapsed.is_empty() {
            out.push((at, at, collapsed));
        }
        if let Some(&next) = edges.get(ix + 1) {
            let covering: Vec<DecorationKind> = decorations
                .iter()
                .filter(|d| !d.is_collapsed() && d.start <= at && d.end >= next)
                .map(|d| d.kind.clone())
                .collect();
            out.push((at, next, covering));
        }
    }
    out
}
