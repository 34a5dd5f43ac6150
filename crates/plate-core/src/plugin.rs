use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::core::Editor;
use crate::error::{ApplyError, CommandError, RegistryError};
use crate::node::{Document, ElementNode, MarkKind, Node};
use crate::ops::{NodeProperties, Op, Transaction};
use crate::path::{self, Path};
use crate::point::{Point, Range};
use crate::transforms::{Edge, MoveOptions, Unit};

type CommandHandler = dyn Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync;

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub hidden: bool,
    pub handler: Arc<CommandHandler>,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            hidden: false,
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Block,
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildConstraint {
    None,
    BlockOnly,
    InlineOnly,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: String,
    pub role: NodeRole,
    pub is_void: bool,
    pub children: ChildConstraint,
}

impl NodeSpec {
    fn block(kind: &str, children: ChildConstraint) -> Self {
        Self {
            kind: kind.to_string(),
            role: NodeRole::Block,
            is_void: false,
            children,
        }
    }
}

/// One invariant repair. `run` inspects the node at `path` (`[]` is the
/// document) and returns the ops that fix its first violation, in the order
/// they must be applied. An empty result means the node is valid.
pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document, path: &[usize], registry: &PluginRegistry) -> Vec<Op>;
}

pub trait PlatePlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    node_specs: HashMap<String, NodeSpec>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    commands: HashMap<String, CommandSpec>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("node_specs", &self.node_specs.len())
            .field("normalize_passes", &self.normalize_passes.len())
            .field("commands", &self.commands.len())
            .finish()
    }
}

impl PluginRegistry {
    pub fn new(
        plugins: impl IntoIterator<Item = Box<dyn PlatePlugin>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    pub fn core() -> Self {
        let plugins: Vec<Box<dyn PlatePlugin>> = vec![
            Box::new(CoreBlocksPlugin),
            Box::new(CoreDividerPlugin),
            Box::new(BlockquotePlugin),
            Box::new(LinkPlugin),
            Box::new(MentionPlugin),
            Box::new(CoreNormalizePlugin),
            Box::new(CoreCommandsPlugin),
            Box::new(MarksCommandsPlugin),
            Box::new(HistoryCommandsPlugin),
            Box::new(SelectionCommandsPlugin),
            Box::new(EditingCommandsPlugin),
        ];
        let mut registry = Self::default();
        for plugin in plugins {
            let id = plugin.id();
            if let Err(err) = registry.register_plugin(plugin) {
                warn!(plugin = id, %err, "core plugin skipped");
            }
        }
        registry
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn PlatePlugin>) -> Result<(), RegistryError> {
        let specs = plugin.node_specs();
        let commands = plugin.commands();
        if let Some(spec) = specs.iter().find(|s| self.node_specs.contains_key(&s.kind)) {
            return Err(RegistryError::DuplicateKind(spec.kind.clone()));
        }
        if let Some(cmd) = commands.iter().find(|c| self.commands.contains_key(&c.id)) {
            return Err(RegistryError::DuplicateCommand(cmd.id.clone()));
        }

        for spec in specs {
            self.node_specs.insert(spec.kind.clone(), spec);
        }
        self.normalize_passes.extend(plugin.normalize_passes());
        for cmd in commands {
            self.commands.insert(cmd.id.clone(), cmd);
        }
        Ok(())
    }

    pub fn node_specs(&self) -> &HashMap<String, NodeSpec> {
        &self.node_specs
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn is_known_kind(&self, kind: &str) -> bool {
        self.node_specs.contains_key(kind)
    }

    pub fn is_inline(&self, el: &ElementNode) -> bool {
        self.node_specs
            .get(&el.kind)
            .is_some_and(|spec| spec.role == NodeRole::Inline)
    }

    pub fn is_void(&self, el: &ElementNode) -> bool {
        self.node_specs.get(&el.kind).is_some_and(|spec| spec.is_void)
    }

    /// Block elements only; text leaves and inline elements are not blocks.
    pub fn is_block(&self, node: &Node) -> bool {
        matches!(node, Node::Element(el) if !self.is_inline(el))
    }

    /// True for text leaves and inline elements.
    pub fn is_inline_node(&self, node: &Node) -> bool {
        match node {
            Node::Text(_) => true,
            Node::Element(el) => self.is_inline(el),
        }
    }

    /// Whether `el`'s children should be inline content (text and inline
    /// elements) rather than blocks.
    pub fn has_inline_children(&self, el: &ElementNode) -> bool {
        match self.node_specs.get(&el.kind).map(|s| &s.children) {
            Some(ChildConstraint::InlineOnly) => true,
            Some(ChildConstraint::BlockOnly) => false,
            _ => {
                self.is_inline(el)
                    || el
                        .children
                        .first()
                        .is_none_or(|first| self.is_inline_node(first))
            }
        }
    }

    /// Ops repairing the first violation at `path`, from the first pass
    /// that finds one.
    pub fn normalize_node(&self, doc: &Document, path: &[usize]) -> Vec<Op> {
        self.normalize_passes
            .iter()
            .map(|pass| pass.run(doc, path, self))
            .find(|ops| !ops.is_empty())
            .unwrap_or_default()
    }

    /// Checks the invariants every normalized document must hold.
    pub fn check_invariants(&self, doc: &Document) -> Result<(), ApplyError> {
        if doc.children.is_empty() {
            return Err(ApplyError::InvariantViolation(
                "document has no blocks".to_string(),
            ));
        }
        if let Some(ix) = doc.children.iter().position(|n| !self.is_block(n)) {
            return Err(ApplyError::InvariantViolation(format!(
                "root child {ix} is not a block"
            )));
        }
        for (path, node) in doc.descendants() {
            if let Node::Element(el) = node
                && el.children.is_empty()
            {
                return Err(ApplyError::InvariantViolation(format!(
                    "element {:?} at {path:?} has no children",
                    el.kind
                )));
            }
        }
        Ok(())
    }
}

struct CoreBlocksPlugin;

impl PlatePlugin for CoreBlocksPlugin {
    fn id(&self) -> &'static str {
        "core.blocks"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec::block("paragraph", ChildConstraint::InlineOnly),
            NodeSpec::block("heading", ChildConstraint::InlineOnly),
        ]
    }
}

struct CoreDividerPlugin;

impl PlatePlugin for CoreDividerPlugin {
    fn id(&self) -> &'static str {
        "core.divider"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec {
            kind: "divider".to_string(),
            role: NodeRole::Block,
            is_void: true,
            children: ChildConstraint::None,
        }]
    }
}

struct BlockquotePlugin;

impl PlatePlugin for BlockquotePlugin {
    fn id(&self) -> &'static str {
        "blockquote"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::block("blockquote", ChildConstraint::BlockOnly)]
    }
}

struct LinkPlugin;

impl PlatePlugin for LinkPlugin {
    fn id(&self) -> &'static str {
        "link"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec {
            kind: "link".to_string(),
            role: NodeRole::Inline,
            is_void: false,
            children: ChildConstraint::InlineOnly,
        }]
    }
}

struct MentionPlugin;

impl PlatePlugin for MentionPlugin {
    fn id(&self) -> &'static str {
        "mention"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec {
            kind: "mention".to_string(),
            role: NodeRole::Inline,
            is_void: true,
            children: ChildConstraint::None,
        }]
    }
}

struct CoreNormalizePlugin;

impl PlatePlugin for CoreNormalizePlugin {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(RootChildrenAreBlocks),
            Box::new(EnsureElementHasChild),
            Box::new(VoidHasSingleEmptyText),
            Box::new(ChildrenKindConsistency),
            Box::new(InlinesSurroundedByText),
            Box::new(MergeAdjacentTextLeaves),
        ]
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document, path: &[usize], _registry: &PluginRegistry) -> Vec<Op> {
        if path.is_empty() && doc.children.is_empty() {
            return vec![Op::InsertNode {
                path: vec![0],
                node: Node::paragraph(""),
            }];
        }
        Vec::new()
    }
}

/// Text and inline elements at the root are wrapped in a paragraph.
struct RootChildrenAreBlocks;

impl NormalizePass for RootChildrenAreBlocks {
    fn id(&self) -> &'static str {
        "core.root_children_are_blocks"
    }

    fn run(&self, doc: &Document, path: &[usize], registry: &PluginRegistry) -> Vec<Op> {
        if !path.is_empty() {
            return Vec::new();
        }
        let Some(ix) = doc.children.iter().position(|n| !registry.is_block(n)) else {
            return Vec::new();
        };
        wrap_in_paragraph(vec![ix], &doc.children[ix])
    }
}

fn wrap_in_paragraph(at: Path, node: &Node) -> Vec<Op> {
    vec![
        Op::RemoveNode {
            path: at.clone(),
            node: node.clone(),
        },
        Op::InsertNode {
            path: at,
            node: Node::element("paragraph", vec![node.clone()]),
        },
    ]
}

struct EnsureElementHasChild;

impl NormalizePass for EnsureElementHasChild {
    fn id(&self) -> &'static str {
        "core.ensure_element_has_child"
    }

    fn run(&self, doc: &Document, path: &[usize], _registry: &PluginRegistry) -> Vec<Op> {
        match doc.element(path) {
            Some(el) if el.children.is_empty() => vec![Op::InsertNode {
                path: path::child(path, 0),
                node: Node::text(""),
            }],
            _ => Vec::new(),
        }
    }
}

/// Voids hold exactly one empty text leaf; their content lives in attrs.
struct VoidHasSingleEmptyText;

impl NormalizePass for VoidHasSingleEmptyText {
    fn id(&self) -> &'static str {
        "core.void_has_single_empty_text"
    }

    fn run(&self, doc: &Document, path: &[usize], registry: &PluginRegistry) -> Vec<Op> {
        let Some(el) = doc.element(path) else {
            return Vec::new();
        };
        if !registry.is_void(el) {
            return Vec::new();
        }
        if el.children.len() > 1 {
            let last = el.children.len() - 1;
            return vec![Op::RemoveNode {
                path: path::child(path, last),
                node: el.children[last].clone(),
            }];
        }
        match el.children.first() {
            Some(node @ Node::Element(_)) => vec![Op::RemoveNode {
                path: path::child(path, 0),
                node: node.clone(),
            }],
            Some(Node::Text(t)) if !t.text.is_empty() => vec![Op::RemoveText {
                path: path::child(path, 0),
                offset: 0,
                text: t.text.clone(),
            }],
            _ => Vec::new(),
        }
    }
}

/// Block children and inline children are never mixed under one element.
/// Misplaced blocks collapse to their plain text; misplaced inline content
/// gets wrapped in a paragraph.
struct ChildrenKindConsistency;

impl NormalizePass for ChildrenKindConsistency {
    fn id(&self) -> &'static str {
        "core.children_kind_consistency"
    }

    fn run(&self, doc: &Document, path: &[usize], registry: &PluginRegistry) -> Vec<Op> {
        let Some(el) = doc.element(path) else {
            return Vec::new();
        };
        if registry.is_void(el) {
            return Vec::new();
        }

        if registry.has_inline_children(el) {
            let Some(ix) = el.children.iter().position(|n| registry.is_block(n)) else {
                return Vec::new();
            };
            let block = &el.children[ix];
            let at = path::child(path, ix);
            return vec![
                Op::RemoveNode {
                    path: at.clone(),
                    node: block.clone(),
                },
                Op::InsertNode {
                    path: at,
                    node: Node::text(block.string()),
                },
            ];
        }

        match el.children.iter().position(|n| !registry.is_block(n)) {
            Some(ix) => wrap_in_paragraph(path::child(path, ix), &el.children[ix]),
            None => Vec::new(),
        }
    }
}

/// Inline elements always have a text leaf on each side so the caret can
/// sit before and after them.
struct InlinesSurroundedByText;

impl NormalizePass for InlinesSurroundedByText {
    fn id(&self) -> &'static str {
        "core.inlines_surrounded_by_text"
    }

    fn run(&self, doc: &Document, path: &[usize], registry: &PluginRegistry) -> Vec<Op> {
        let Some(el) = doc.element(path) else {
            return Vec::new();
        };
        if registry.is_void(el) || !registry.has_inline_children(el) {
            return Vec::new();
        }

        for (ix, node) in el.children.iter().enumerate() {
            let Node::Element(child) = node else {
                continue;
            };
            if !registry.is_inline(child) {
                continue;
            }
            let prev_is_text = ix > 0 && el.children[ix - 1].is_text();
            if !prev_is_text {
                return vec![Op::InsertNode {
                    path: path::child(path, ix),
                    node: Node::text(""),
                }];
            }
            if ix + 1 == el.children.len() {
                return vec![Op::InsertNode {
                    path: path::child(path, ix + 1),
                    node: Node::text(""),
                }];
            }
        }
        Vec::new()
    }
}

/// Adjacent leaves with equal marks merge; an empty leaf next to another
/// leaf is dropped.
struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_text_leaves"
    }

    fn run(&self, doc: &Document, path: &[usize], _registry: &PluginRegistry) -> Vec<Op> {
        let Some(el) = doc.element(path) else {
            return Vec::new();
        };

        for ix in 1..el.children.len() {
            let (Node::Text(prev), Node::Text(cur)) = (&el.children[ix - 1], &el.children[ix])
            else {
                continue;
            };
            if prev.marks == cur.marks {
                return vec![Op::MergeNode {
                    path: path::child(path, ix),
                    position: prev.len(),
                    properties: NodeProperties::marks(cur.marks.clone()),
                }];
            }
            if prev.text.is_empty() {
                return vec![Op::RemoveNode {
                    path: path::child(path, ix - 1),
                    node: el.children[ix - 1].clone(),
                }];
            }
            if cur.text.is_empty() {
                return vec![Op::RemoveNode {
                    path: path::child(path, ix),
                    node: el.children[ix].clone(),
                }];
            }
        }
        Vec::new()
    }
}

struct CoreCommandsPlugin;

impl PlatePlugin for CoreCommandsPlugin {
    fn id(&self) -> &'static str {
        "core.commands"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("core.insert_divider", "Insert divider", |editor, _args| {
                let Some(selection) = editor.selection() else {
                    return Err(CommandError::new("No selection"));
                };
                let Some((block_path, _)) = editor.block_above(&selection.focus.path) else {
                    return Err(CommandError::new("Selection is not inside a block"));
                };

                let divider_path = path::next(&block_path);
                let paragraph_path = path::next(&divider_path);
                let caret = Point::new(path::child(&paragraph_path, 0), 0);

                let tx = Transaction::new(vec![
                    Op::InsertNode {
                        path: divider_path,
                        node: Node::divider(),
                    },
                    Op::InsertNode {
                        path: paragraph_path,
                        node: Node::paragraph(""),
                    },
                ])
                .selection_after(Range::collapsed(caret))
                .source("command:core.insert_divider");

                editor.apply(tx).map_err(CommandError::from)
            })
            .description("Insert a divider block and a trailing paragraph.")
            .keywords(["divider", "separator", "hr", "horizontal rule"]),
        ]
    }
}

struct MarksCommandsPlugin;

impl PlatePlugin for MarksCommandsPlugin {
    fn id(&self) -> &'static str {
        "marks.commands"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        [
            ("marks.toggle_bold", "Bold", MarkKind::Bold),
            ("marks.toggle_italic", "Italic", MarkKind::Italic),
            ("marks.toggle_underline", "Underline", MarkKind::Underline),
            ("marks.toggle_strikethrough", "Strikethrough", MarkKind::Strikethrough),
            ("marks.toggle_code", "Code", MarkKind::Code),
        ]
        .into_iter()
        .map(|(id, label, kind)| {
            CommandSpec::new(id, label, move |editor, _args| {
                editor.toggle_mark(kind).map_err(CommandError::from)
            })
            .keywords(["mark", "format"])
        })
        .collect()
    }
}

struct HistoryCommandsPlugin;

impl PlatePlugin for HistoryCommandsPlugin {
    fn id(&self) -> &'static str {
        "history.commands"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("history.undo", "Undo", |editor, _args| {
                editor.undo();
                Ok(())
            }),
            CommandSpec::new("history.redo", "Redo", |editor, _args| {
                editor.redo();
                Ok(())
            }),
        ]
    }
}

/// Caret movement. Plain moves collapse an expanded selection towards the
/// direction of travel first; extends move only the focus.
struct SelectionCommandsPlugin;

impl PlatePlugin for SelectionCommandsPlugin {
    fn id(&self) -> &'static str {
        "selection.commands"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        let moves = [
            ("selection.move_backward", Unit::Character, true, false),
            ("selection.move_forward", Unit::Character, false, false),
            ("selection.move_word_backward", Unit::Word, true, false),
            ("selection.move_word_forward", Unit::Word, false, false),
            ("selection.move_line_backward", Unit::Line, true, false),
            ("selection.move_line_forward", Unit::Line, false, false),
            ("selection.extend_backward", Unit::Character, true, true),
            ("selection.extend_forward", Unit::Character, false, true),
            ("selection.extend_line_backward", Unit::Line, true, true),
            ("selection.extend_line_forward", Unit::Line, false, true),
        ];
        moves
            .into_iter()
            .map(|(id, unit, reverse, extend)| {
                CommandSpec::new(id, id, move |editor, _args| {
                    let expanded = editor.selection().is_some_and(Range::is_expanded);
                    if expanded && !extend && unit == Unit::Character {
                        let edge = if reverse { Edge::Start } else { Edge::End };
                        return editor.collapse(edge).map_err(CommandError::from);
                    }
                    if expanded && !extend {
                        editor.collapse(Edge::Focus)?;
                    }
                    editor
                        .move_selection(MoveOptions {
                            unit,
                            reverse,
                            extend,
                        })
                        .map_err(CommandError::from)
                })
                .hidden(true)
            })
            .collect()
    }
}

struct EditingCommandsPlugin;

impl PlatePlugin for EditingCommandsPlugin {
    fn id(&self) -> &'static str {
        "editing.commands"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        let mut commands = vec![
            CommandSpec::new("editing.insert_break", "Split block", |editor, _args| {
                editor.insert_break().map_err(CommandError::from)
            }),
            CommandSpec::new("editing.insert_soft_break", "Soft break", |editor, _args| {
                editor.insert_soft_break().map_err(CommandError::from)
            }),
        ];
        let deletes = [
            ("editing.delete_backward", Unit::Character, true),
            ("editing.delete_forward", Unit::Character, false),
            ("editing.delete_word_backward", Unit::Word, true),
            ("editing.delete_word_forward", Unit::Word, false),
            ("editing.delete_line_backward", Unit::Line, true),
            ("editing.delete_line_forward", Unit::Line, false),
        ];
        commands.extend(deletes.into_iter().map(|(id, unit, reverse)| {
            CommandSpec::new(id, id, move |editor, _args| {
                let result = if reverse {
                    editor.delete_backward(unit)
                } else {
                    editor.delete_forward(unit)
                };
                result.map_err(CommandError::from)
            })
            .hidden(true)
        }));
        commands
    }
}
