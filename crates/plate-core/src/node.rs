use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApplyError;
use crate::path::Path;

pub type Attrs = BTreeMap<String, Value>;
pub type ElementKind = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
}

impl Node {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::element("paragraph", vec![Node::text(text)])
    }

    pub fn heading(level: u64, text: impl Into<String>) -> Self {
        let mut attrs = Attrs::new();
        attrs.insert("level".to_string(), Value::from(level));
        Node::Element(ElementNode {
            kind: "heading".to_string(),
            attrs,
            children: vec![Node::text(text)],
        })
    }

    pub fn element(kind: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Element(ElementNode {
            kind: kind.into(),
            attrs: Attrs::default(),
            children,
        })
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks: Marks::default(),
        })
    }

    pub fn marked(text: impl Into<String>, marks: Marks) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks,
        })
    }

    pub fn divider() -> Self {
        Node::element("divider", vec![Node::text("")])
    }

    pub fn link(url: impl Into<String>, text: impl Into<String>) -> Self {
        let mut attrs = Attrs::new();
        attrs.insert("url".to_string(), Value::String(url.into()));
        Node::Element(ElementNode {
            kind: "link".to_string(),
            attrs,
            children: vec![Node::text(text)],
        })
    }

    pub fn mention(label: impl Into<String>) -> Self {
        let mut attrs = Attrs::new();
        attrs.insert("label".to_string(), Value::String(label.into()));
        Node::Element(ElementNode {
            kind: "mention".to_string(),
            attrs,
            children: vec![Node::text("")],
        })
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            Node::Text(text) => Some(text),
            Node::Element(_) => None,
        }
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text(_))
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element(el) => &el.children,
            Node::Text(_) => &[],
        }
    }

    /// Concatenated text of every leaf under this node.
    pub fn string(&self) -> String {
        let mut out = String::new();
        push_string(self, &mut out);
        out
    }

    /// Length of [`Node::string`] in chars.
    pub fn text_len(&self) -> usize {
        match self {
            Node::Text(t) => t.len(),
            Node::Element(el) => el.children.iter().map(Node::text_len).sum(),
        }
    }
}

fn push_string(node: &Node, out: &mut String) {
    match node {
        Node::Text(t) => out.push_str(&t.text),
        Node::Element(el) => {
            for child in &el.children {
                push_string(child, out);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

impl TextNode {
    pub fn new(text: impl Into<String>, marks: Marks) -> Self {
        Self {
            text: text.into(),
            marks,
        }
    }

    /// Length in chars. Offsets everywhere in the model count chars, not bytes.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_color: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
}

impl Marks {
    pub fn has(&self, kind: MarkKind) -> bool {
        match kind {
            MarkKind::Bold => self.bold,
            MarkKind::Italic => self.italic,
            MarkKind::Underline => self.underline,
            MarkKind::Strikethrough => self.strikethrough,
            MarkKind::Code => self.code,
        }
    }

    pub fn set(&mut self, kind: MarkKind, on: bool) {
        match kind {
            MarkKind::Bold => self.bold = on,
            MarkKind::Italic => self.italic = on,
            MarkKind::Underline => self.underline = on,
            MarkKind::Strikethrough => self.strikethrough = on,
            MarkKind::Code => self.code = on,
        }
    }

    pub fn with(mut self, kind: MarkKind) -> Self {
        self.set(kind, true);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Marks::default()
    }
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    pub fn node(&self, path: &[usize]) -> Option<&Node> {
        let (&last, parent) = path.split_last()?;
        self.children_at(parent)?.get(last)
    }

    pub fn node_mut(&mut self, path: &[usize]) -> Result<&mut Node, ApplyError> {
        let Some((&last, parent)) = path.split_last() else {
            return Err(ApplyError::invalid_path(path, "the root is not a node"));
        };
        let children = self.children_mut_at(parent)?;
        let len = children.len();
        children
            .get_mut(last)
            .ok_or_else(|| ApplyError::invalid_path(path, format!("index {last} >= {len}")))
    }

    pub fn text_mut(&mut self, path: &[usize]) -> Result<&mut TextNode, ApplyError> {
        match self.node_mut(path)? {
            Node::Text(t) => Ok(t),
            Node::Element(_) => Err(ApplyError::invalid_path(path, "expected a text leaf")),
        }
    }

    /// Children of the node at `parent`, where `[]` is the document itself.
    pub fn children_at(&self, parent: &[usize]) -> Option<&[Node]> {
        let mut children: &[Node] = &self.children;
        for &ix in parent {
            children = match children.get(ix)? {
                Node::Element(el) => &el.children,
                Node::Text(_) => return None,
            };
        }
        Some(children)
    }

    pub fn children_mut_at(&mut self, parent: &[usize]) -> Result<&mut Vec<Node>, ApplyError> {
        let mut children = &mut self.children;
        for (depth, &ix) in parent.iter().enumerate() {
            let len = children.len();
            children = match children.get_mut(ix) {
                Some(Node::Element(el)) => &mut el.children,
                Some(Node::Text(_)) => {
                    return Err(ApplyError::invalid_path(
                        parent,
                        format!("text leaf at depth {depth} has no children"),
                    ));
                }
                None => {
                    return Err(ApplyError::invalid_path(
                        parent,
                        format!("index {ix} >= {len} at depth {depth}"),
                    ));
                }
            };
        }
        Ok(children)
    }

    pub fn has_path(&self, path: &[usize]) -> bool {
        path.is_empty() || self.node(path).is_some()
    }

    pub fn leaf(&self, path: &[usize]) -> Option<&TextNode> {
        self.node(path)?.as_text()
    }

    pub fn element(&self, path: &[usize]) -> Option<&ElementNode> {
        self.node(path)?.as_element()
    }

    /// Every text leaf in document order.
    pub fn texts(&self) -> Vec<(Path, &TextNode)> {
        let mut out = Vec::new();
        collect_texts(&self.children, &mut Vec::new(), &mut out);
        out
    }

    /// Text leaves under `path` in document order.
    pub fn texts_under(&self, path: &[usize]) -> Vec<(Path, &TextNode)> {
        let mut out = Vec::new();
        match self.node(path) {
            Some(Node::Text(t)) => out.push((path.to_vec(), t)),
            Some(Node::Element(el)) => collect_texts(&el.children, &mut path.to_vec(), &mut out),
            None if path.is_empty() => collect_texts(&self.children, &mut Vec::new(), &mut out),
            None => {}
        }
        out
    }

    /// Every node in document order (pre-order), excluding the root.
    pub fn descendants(&self) -> Vec<(Path, &Node)> {
        fn walk<'a>(children: &'a [Node], path: &mut Path, out: &mut Vec<(Path, &'a Node)>) {
            for (ix, node) in children.iter().enumerate() {
                path.push(ix);
                out.push((path.clone(), node));
                walk(node.children(), path, out);
                path.pop();
            }
        }
        let mut out = Vec::new();
        walk(&self.children, &mut Vec::new(), &mut out);
        out
    }

    pub fn string(&self) -> String {
        self.children.iter().map(Node::string).collect()
    }
}

fn collect_texts<'a>(children: &'a [Node], path: &mut Path, out: &mut Vec<(Path, &'a TextNode)>) {
    for (ix, node) in children.iter().enumerate() {
        path.push(ix);
        match node {
            Node::Text(t) => out.push((path.clone(), t)),
            Node::Element(el) => collect_texts(&el.children, path, out),
        }
        path.pop();
    }
}
