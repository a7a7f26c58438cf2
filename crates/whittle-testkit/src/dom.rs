//! Mutable element arena backing the fake document control
//!
//! Parsed from real markup with `scraper`, then mutated in place by the
//! control. Node ids are arena indices and stay stable across detach and
//! reattach, which is exactly the handle-identity behavior the rollback
//! protocol depends on.

use scraper::{Html, Node as ScraperNode};

/// Node payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Element with tag and ordered attributes
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    /// Text run
    Text(String),
}

/// One arena node
#[derive(Debug, Clone)]
pub struct FakeNode {
    pub kind: NodeKind,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// A mutable in-memory document
#[derive(Debug, Clone)]
pub struct FakeDom {
    nodes: Vec<FakeNode>,
    root: usize,
    has_doctype: bool,
}

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

impl FakeDom {
    /// Parse markup into an arena
    pub fn parse(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let has_doctype = html.trim_start().to_ascii_lowercase().starts_with("<!doctype");

        let mut dom = Self {
            nodes: Vec::new(),
            root: 0,
            has_doctype,
        };

        let root_element = parsed.root_element();
        let element = root_element.value();
        let root_id = dom.push(
            NodeKind::Element {
                tag: element.name().to_string(),
                attrs: element
                    .attrs()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
            },
            None,
        );
        dom.root = root_id;
        dom.build_children(root_id, *root_element);
        dom
    }

    fn build_children(&mut self, parent: usize, node: ego_tree::NodeRef<'_, ScraperNode>) {
        for child in node.children() {
            match child.value() {
                ScraperNode::Element(element) => {
                    let id = self.push(
                        NodeKind::Element {
                            tag: element.name().to_string(),
                            attrs: element
                                .attrs()
                                .map(|(name, value)| (name.to_string(), value.to_string()))
                                .collect(),
                        },
                        Some(parent),
                    );
                    self.build_children(id, child);
                }
                ScraperNode::Text(text) => {
                    self.push(NodeKind::Text(text.text.to_string()), Some(parent));
                }
                _ => {}
            }
        }
    }

    fn push(&mut self, kind: NodeKind, parent: Option<usize>) -> usize {
        let id = self.nodes.len();
        self.nodes.push(FakeNode {
            kind,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent].children.push(id);
        }
        id
    }

    /// Root element id
    #[inline]
    pub fn root(&self) -> usize {
        self.root
    }

    /// Is this id a live node?
    pub fn contains(&self, id: usize) -> bool {
        id < self.nodes.len()
    }

    pub fn node(&self, id: usize) -> &FakeNode {
        &self.nodes[id]
    }

    /// Element tag, `None` for text nodes
    pub fn tag(&self, id: usize) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    /// Child element ids, in order
    pub fn child_elements(&self, id: usize) -> Vec<usize> {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .filter(|child| matches!(self.nodes[*child].kind, NodeKind::Element { .. }))
            .collect()
    }

    /// Ordered attribute pairs of an element
    pub fn attributes(&self, id: usize) -> Vec<(String, String)> {
        match &self.nodes[id].kind {
            NodeKind::Element { attrs, .. } => attrs.clone(),
            NodeKind::Text(_) => Vec::new(),
        }
    }

    pub fn attribute(&self, id: usize, name: &str) -> Option<String> {
        match &self.nodes[id].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(attr, _)| attr == name)
                .map(|(_, value)| value.clone()),
            NodeKind::Text(_) => None,
        }
    }

    /// Whitespace-split class tokens of an element
    pub fn classes(&self, id: usize) -> Vec<String> {
        self.attribute(id, "class")
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn set_attribute(&mut self, id: usize, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id].kind {
            if let Some(slot) = attrs.iter_mut().find(|(attr, _)| attr == name) {
                slot.1 = value.to_string();
            } else {
                attrs.push((name.to_string(), value.to_string()));
            }
        }
    }

    pub fn remove_attribute(&mut self, id: usize, name: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id].kind {
            attrs.retain(|(attr, _)| attr != name);
        }
    }

    /// Detach a node; returns `(parent, next_sibling)` or `None` for the root
    pub fn detach(&mut self, id: usize) -> Option<(usize, Option<usize>)> {
        let parent = self.nodes[id].parent?;
        let position = self.nodes[parent]
            .children
            .iter()
            .position(|child| *child == id)?;
        let next = self.nodes[parent].children.get(position + 1).copied();
        self.nodes[parent].children.remove(position);
        self.nodes[id].parent = None;
        Some((parent, next))
    }

    /// Reinsert a detached node before `next`, or as the parent's last child
    pub fn reattach(&mut self, id: usize, parent: usize, next: Option<usize>) {
        let position = next
            .and_then(|sibling| {
                self.nodes[parent]
                    .children
                    .iter()
                    .position(|child| *child == sibling)
            })
            .unwrap_or(self.nodes[parent].children.len());
        self.nodes[parent].children.insert(position, id);
        self.nodes[id].parent = Some(parent);
    }

    /// Pre-order element ids matching a bare tag-name selector
    pub fn elements_by_tag(&self, tag: &str) -> Vec<usize> {
        let mut found = Vec::new();
        self.walk(self.root, &mut |dom, id| {
            if dom.tag(id).is_some_and(|t| t.eq_ignore_ascii_case(tag)) {
                found.push(id);
            }
            true
        });
        found
    }

    /// Concatenated descendant text of a node
    pub fn text_content(&self, id: usize) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: usize, out: &mut String) {
        match &self.nodes[id].kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { .. } => {
                for child in self.nodes[id].children.clone() {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Append a `<style injected="true">` element under head (or the root)
    pub fn append_style(&mut self, css: &str) -> usize {
        let parent = self
            .elements_by_tag("head")
            .first()
            .copied()
            .unwrap_or(self.root);
        let style = self.push(
            NodeKind::Element {
                tag: "style".to_string(),
                attrs: vec![("injected".to_string(), "true".to_string())],
            },
            Some(parent),
        );
        self.push(NodeKind::Text(css.to_string()), Some(style));
        style
    }

    /// Depth-first walk; the callback decides whether to descend
    pub fn walk(&self, id: usize, visit: &mut impl FnMut(&Self, usize) -> bool) {
        if !visit(self, id) {
            return;
        }
        for child in self.nodes[id].children.clone() {
            if matches!(self.nodes[child].kind, NodeKind::Element { .. }) {
                self.walk(child, visit);
            }
        }
    }

    /// Text visible under a per-element predicate
    ///
    /// An element that fails the predicate hides its entire subtree, the way
    /// `display: none` would.
    pub fn visible_text(&self, predicate: &dyn Fn(&Self, usize) -> bool) -> String {
        let mut out = String::new();
        self.visible_text_into(self.root, predicate, &mut out);
        out
    }

    fn visible_text_into(
        &self,
        id: usize,
        predicate: &dyn Fn(&Self, usize) -> bool,
        out: &mut String,
    ) {
        match &self.nodes[id].kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { .. } => {
                if !predicate(self, id) {
                    return;
                }
                for child in self.nodes[id].children.clone() {
                    self.visible_text_into(child, predicate, out);
                }
            }
        }
    }

    /// Serialize back to markup
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        if self.has_doctype {
            out.push_str("<!DOCTYPE html>");
        }
        self.serialize_node(self.root, &mut out);
        out
    }

    fn serialize_node(&self, id: usize, out: &mut String) {
        match &self.nodes[id].kind {
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
                out.push('>');
                if tag == "style" || tag == "script" {
                    for child in &self.nodes[id].children {
                        if let NodeKind::Text(text) = &self.nodes[*child].kind {
                            out.push_str(text);
                        }
                    }
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                    return;
                }
                if VOID_TAGS.contains(&tag.as_str()) {
                    return;
                }
                for child in &self.nodes[id].children {
                    self.serialize_node(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
