use std::collections::HashMap;
use std::sync::Arc;

use canvas_plate_core::{Attrs, ElementNode};
use serde_json::Value;

/// How one element is presented to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementShape {
    pub tag: String,
    pub attributes: Attrs,
}

impl ElementShape {
    pub fn new(tag: impl Into<String>, attributes: Attrs) -> Self {
        Self {
            tag: tag.into(),
            attributes,
        }
    }
}

pub trait ElementRenderer: Send + Sync {
    fn render(&self, element: &ElementNode) -> ElementShape;
}

impl<F> ElementRenderer for F
where
    F: Fn(&ElementNode) -> ElementShape + Send + Sync,
{
    fn render(&self, element: &ElementNode) -> ElementShape {
        self(element)
    }
}

/// Element kind to renderer. Kinds without an entry fall back to a `div`
/// for blocks and a `span` for inlines, carrying the element's attributes.
#[derive(Clone, Default)]
pub struct ElementRegistry {
    renderers: HashMap<String, Arc<dyn ElementRenderer>>,
}

impl std::fmt::Debug for ElementRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&String> = self.renderers.keys().collect();
        kinds.sort();
        f.debug_struct("ElementRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderers for the element kinds the core plugins define.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("paragraph", |el: &ElementNode| {
            ElementShape::new("p", el.attrs.clone())
        });
        registry.register("heading", |el: &ElementNode| {
            let level = el
                .attrs
                .get("level")
                .and_then(Value::as_u64)
                .unwrap_or(1)
                .clamp(1, 6);
            ElementShape::new(format!("h{level}"), el.attrs.clone())
        });
        registry.register("blockquote", |el: &ElementNode| {
            ElementShape::new("blockquote", el.attrs.clone())
        });
        registry.register("divider", |el: &ElementNode| {
            ElementShape::new("hr", el.attrs.clone())
        });
        registry.register("link", |el: &ElementNode| {
            let mut attributes = el.attrs.clone();
            if let Some(url) = attributes.remove("url") {
                attributes.insert("href".to_string(), url);
            }
            ElementShape::new("a", attributes)
        });
        registry.register("mention", |el: &ElementNode| {
            let mut attributes = el.attrs.clone();
            attributes.insert("data-mention".to_string(), Value::Bool(true));
            ElementShape::new("span", attributes)
        });
        registry
    }

    pub fn register(&mut self, kind: impl Into<String>, renderer: impl ElementRenderer + 'static) {
        self.renderers.insert(kind.into(), Arc::new(renderer));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.renderers.contains_key(kind)
    }

    pub fn render(&self, element: &ElementNode, inline: bool) -> ElementShape {
        match self.renderers.get(&element.kind) {
            Some(renderer) => renderer.render(element),
            None => fallback(element, inline),
        }
    }
}

fn fallback(element: &ElementNode, inline: bool) -> ElementShape {
    let tag = if inline { "span" } else { "div" };
    ElementShape::new(tag, element.attrs.clone())
}

#[cfg(test)]
mod tests {
    use canvas_plate_core::Node;

    use super::*;

    fn element(node: Node) -> ElementNode {
        match node {
            Node::Element(el) => el,
            Node::Text(_) => panic!("expected an element"),
        }
    }

    #[test]
    fn unknown_kinds_use_the_fallback() {
        let registry = ElementRegistry::with_defaults();
        let callout = element(Node::element("callout", vec![Node::text("x")]));

        assert_eq!(registry.render(&callout, false).tag, "div");
        assert_eq!(registry.render(&callout, true).tag, "span");
    }

    #[test]
    fn headings_render_their_level() {
        let registry = ElementRegistry::with_defaults();

        let shape = registry.render(&element(Node::heading(3, "t")), false);

        assert_eq!(shape.tag, "h3");
    }

    #[test]
    fn link_url_becomes_href() {
        let registry = ElementRegistry::with_defaults();

        let shape = registry.render(&element(Node::link("https://a.test", "a")), true);

        assert_eq!(shape.tag, "a");
        assert_eq!(
            shape.attributes.get("href"),
            Some(&Value::from("https://a.test"))
        );
    }
}
