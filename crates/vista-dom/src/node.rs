//! Reference-counted document nodes.
//!
//! A [`Node`] is a cheap handle: cloning it yields another handle to the
//! same node, and [`Node::ptr_eq`] compares identity. Children are owned
//! strongly by their parent while parent links are weak, so dropping the
//! last handle to a detached subtree frees it.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::event::{Event, EventTarget, Listener};

enum NodeKind {
    Element {
        tag: String,
        attributes: RefCell<IndexMap<String, String>>,
    },
    Text(RefCell<String>),
}

struct NodeInner {
    kind: NodeKind,
    parent: RefCell<Weak<NodeInner>>,
    children: RefCell<Vec<Node>>,
    listeners: EventTarget,
    annotation: RefCell<Option<Rc<dyn Any>>>,
}

#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

/// Non-owning handle to a [`Node`].
#[derive(Clone, Default)]
pub struct WeakNode {
    inner: Weak<NodeInner>,
}

impl WeakNode {
    pub fn upgrade(&self) -> Option<Node> {
        self.inner.upgrade().map(|inner| Node { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(node) => write!(f, "WeakNode({node:?})"),
            None => f.write_str("WeakNode(<dropped>)"),
        }
    }
}

impl Node {
    pub fn element(tag: impl Into<String>) -> Self {
        Self::from_kind(NodeKind::Element {
            tag: tag.into(),
            attributes: RefCell::new(IndexMap::new()),
        })
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::from_kind(NodeKind::Text(RefCell::new(content.into())))
    }

    fn from_kind(kind: NodeKind) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                kind,
                parent: RefCell::new(Weak::new()),
                children: RefCell::new(Vec::new()),
                listeners: EventTarget::new(),
                annotation: RefCell::new(None),
            }),
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.inner.kind, NodeKind::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.inner.kind, NodeKind::Text(_))
    }

    /// Element tag, `None` for text nodes.
    pub fn tag(&self) -> Option<&str> {
        match &self.inner.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    /// True when both handles point at the same node.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakNode {
        WeakNode {
            inner: Rc::downgrade(&self.inner),
        }
    }

    // ---------------------------------------------------------------------
    // Attributes
    // ---------------------------------------------------------------------

    pub fn attribute(&self, name: &str) -> Option<String> {
        match &self.inner.kind {
            NodeKind::Element { attributes, .. } => attributes.borrow().get(name).cloned(),
            NodeKind::Text(_) => None,
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        match &self.inner.kind {
            NodeKind::Element { attributes, .. } => attributes.borrow().contains_key(name),
            NodeKind::Text(_) => false,
        }
    }

    /// Sets an attribute, returning whether the stored value changed.
    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let NodeKind::Element { attributes, .. } = &self.inner.kind else {
            return false;
        };
        let name = name.into();
        let value = value.into();
        let mut attributes = attributes.borrow_mut();
        if attributes.get(&name) == Some(&value) {
            return false;
        }
        attributes.insert(name, value);
        true
    }

    pub fn remove_attribute(&self, name: &str) -> bool {
        match &self.inner.kind {
            NodeKind::Element { attributes, .. } => {
                attributes.borrow_mut().shift_remove(name).is_some()
            }
            NodeKind::Text(_) => false,
        }
    }

    pub fn attributes(&self) -> Vec<(String, String)> {
        match &self.inner.kind {
            NodeKind::Element { attributes, .. } => attributes
                .borrow()
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            NodeKind::Text(_) => Vec::new(),
        }
    }

    pub fn id(&self) -> Option<String> {
        self.attribute("id")
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .map(|classes| classes.split_whitespace().any(|candidate| candidate == class))
            .unwrap_or(false)
    }

    // ---------------------------------------------------------------------
    // Text
    // ---------------------------------------------------------------------

    /// Contents of a text node, `None` for elements.
    pub fn text_value(&self) -> Option<String> {
        match &self.inner.kind {
            NodeKind::Text(content) => Some(content.borrow().clone()),
            NodeKind::Element { .. } => None,
        }
    }

    /// Replaces the contents of a text node, returning whether it changed.
    pub fn set_text(&self, content: impl Into<String>) -> bool {
        let NodeKind::Text(current) = &self.inner.kind else {
            return false;
        };
        let content = content.into();
        let mut current = current.borrow_mut();
        if *current == content {
            return false;
        }
        *current = content;
        true
    }

    /// Concatenated text of this node and all of its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match &self.inner.kind {
            NodeKind::Text(content) => out.push_str(&content.borrow()),
            NodeKind::Element { .. } => {
                for child in self.inner.children.borrow().iter() {
                    child.collect_text(out);
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Tree structure
    // ---------------------------------------------------------------------

    pub fn parent(&self) -> Option<Node> {
        self.inner.parent.borrow().upgrade().map(|inner| Node { inner })
    }

    pub fn children(&self) -> Vec<Node> {
        self.inner.children.borrow().clone()
    }

    pub fn child_at(&self, index: usize) -> Option<Node> {
        self.inner.children.borrow().get(index).cloned()
    }

    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    pub fn has_child_nodes(&self) -> bool {
        !self.inner.children.borrow().is_empty()
    }

    /// True if `other` is this node or one of its descendants.
    pub fn contains(&self, other: &Node) -> bool {
        let mut current = Some(other.clone());
        while let Some(node) = current {
            if node.ptr_eq(self) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// All descendants in document order, excluding `self`.
    pub fn descendants(&self) -> Vec<Node> {
        let mut out = Vec::new();
        self.collect_descendants(&mut out);
        out
    }

    fn collect_descendants(&self, out: &mut Vec<Node>) {
        for child in self.inner.children.borrow().iter() {
            out.push(child.clone());
            child.collect_descendants(out);
        }
    }

    pub fn append_child(&self, child: &Node) {
        self.insert_before(child, None);
    }

    /// Inserts `child` before `reference`, or at the end when `reference`
    /// is `None` or not a child of `self`. The child is detached from its
    /// previous parent first.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) {
        if child.contains(self) {
            log::warn!("refusing to insert a node into its own subtree");
            return;
        }
        if reference.is_some_and(|reference| reference.ptr_eq(child)) {
            return;
        }
        child.remove();
        let mut children = self.inner.children.borrow_mut();
        let index = reference
            .and_then(|reference| children.iter().position(|c| c.ptr_eq(reference)))
            .unwrap_or(children.len());
        children.insert(index, child.clone());
        *child.inner.parent.borrow_mut() = Rc::downgrade(&self.inner);
    }

    pub fn remove_child(&self, child: &Node) -> bool {
        let mut children = self.inner.children.borrow_mut();
        let Some(index) = children.iter().position(|c| c.ptr_eq(child)) else {
            return false;
        };
        let removed = children.remove(index);
        *removed.inner.parent.borrow_mut() = Weak::new();
        true
    }

    /// Detaches this node from its parent, if any.
    pub fn remove(&self) {
        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
    }

    /// Puts `other` in this node's position under its parent. Does nothing
    /// for a detached node.
    pub fn replace_with(&self, other: &Node) {
        if self.ptr_eq(other) {
            return;
        }
        let Some(parent) = self.parent() else {
            return;
        };
        if other.contains(&parent) {
            log::warn!("refusing to replace a node with one of its ancestors");
            return;
        }
        other.remove();
        let mut children = parent.inner.children.borrow_mut();
        if let Some(index) = children.iter().position(|c| c.ptr_eq(self)) {
            children[index] = other.clone();
            *other.inner.parent.borrow_mut() = Rc::downgrade(&parent.inner);
            *self.inner.parent.borrow_mut() = Weak::new();
        }
    }

    // ---------------------------------------------------------------------
    // Comparison & cloning
    // ---------------------------------------------------------------------

    /// Deep structural equality: same kind, tag, attribute set, text and
    /// pairwise-equal children. Listeners and annotations are ignored.
    pub fn is_equal_node(&self, other: &Node) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if !self.is_equal_shallow(other) {
            return false;
        }
        let ours = self.inner.children.borrow();
        let theirs = other.inner.children.borrow();
        ours.len() == theirs.len()
            && ours
                .iter()
                .zip(theirs.iter())
                .all(|(a, b)| a.is_equal_node(b))
    }

    /// Compares kind, tag, attributes and text without looking at children.
    pub fn is_equal_shallow(&self, other: &Node) -> bool {
        match (&self.inner.kind, &other.inner.kind) {
            (NodeKind::Text(a), NodeKind::Text(b)) => *a.borrow() == *b.borrow(),
            (
                NodeKind::Element {
                    tag: tag_a,
                    attributes: attrs_a,
                },
                NodeKind::Element {
                    tag: tag_b,
                    attributes: attrs_b,
                },
            ) => {
                let attrs_a = attrs_a.borrow();
                let attrs_b = attrs_b.borrow();
                tag_a == tag_b
                    && attrs_a.len() == attrs_b.len()
                    && attrs_a
                        .iter()
                        .all(|(name, value)| attrs_b.get(name) == Some(value))
            }
            _ => false,
        }
    }

    /// Copies the node (and with `deep`, its subtree). The copy is detached,
    /// has no listeners and shares annotations with the source.
    pub fn clone_node(&self, deep: bool) -> Node {
        let copy = match &self.inner.kind {
            NodeKind::Element { tag, attributes } => Self::from_kind(NodeKind::Element {
                tag: tag.clone(),
                attributes: RefCell::new(attributes.borrow().clone()),
            }),
            NodeKind::Text(content) => Self::text(content.borrow().clone()),
        };
        copy.set_annotation(self.annotation());
        if deep {
            for child in self.inner.children.borrow().iter() {
                copy.append_child(&child.clone_node(true));
            }
        }
        copy
    }

    /// Opaque per-node data owned by whoever stamped it.
    pub fn annotation(&self) -> Option<Rc<dyn Any>> {
        self.inner.annotation.borrow().clone()
    }

    pub fn set_annotation(&self, annotation: Option<Rc<dyn Any>>) {
        *self.inner.annotation.borrow_mut() = annotation;
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    pub fn add_event_listener(&self, kind: &str, listener: &Listener) {
        self.inner.listeners.add_event_listener(kind, listener);
    }

    pub fn remove_event_listener(&self, kind: &str, listener: &Listener) {
        self.inner.listeners.remove_event_listener(kind, listener);
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.listener_count()
    }

    /// Dispatches `event` at this node and bubbles it through the
    /// ancestors. Returns `false` when a listener prevented the default.
    pub fn dispatch_event(&self, event: &Event) -> bool {
        event.set_target(self);
        let mut current = Some(self.clone());
        while let Some(node) = current {
            node.inner.listeners.invoke(event);
            if event.propagation_stopped() {
                break;
            }
            current = node.parent();
        }
        !event.default_prevented()
    }

    // ---------------------------------------------------------------------
    // Serialization
    // ---------------------------------------------------------------------

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match &self.inner.kind {
            NodeKind::Text(content) => escape_into(out, &content.borrow(), false),
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes.borrow().iter() {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(out, value, true);
                    out.push('"');
                }
                out.push('>');
                for child in self.inner.children.borrow().iter() {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

fn escape_into(out: &mut String, raw: &str, attribute: bool) {
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_html())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str) -> Node {
        let node = Node::element("span");
        node.append_child(&Node::text(text));
        node
    }

    #[test]
    fn append_moves_child_between_parents() {
        let a = Node::element("div");
        let b = Node::element("div");
        let child = span("x");
        a.append_child(&child);
        b.append_child(&child);
        assert!(!a.has_child_nodes());
        assert!(child.parent().is_some_and(|p| p.ptr_eq(&b)));
    }

    #[test]
    fn insert_before_places_child_at_reference() {
        let list = Node::element("ul");
        let first = Node::element("li");
        let last = Node::element("li");
        list.append_child(&last);
        list.insert_before(&first, Some(&last));
        let children = list.children();
        assert!(children[0].ptr_eq(&first));
        assert!(children[1].ptr_eq(&last));
    }

    #[test]
    fn insert_into_own_subtree_is_refused() {
        let outer = Node::element("div");
        let inner = Node::element("div");
        outer.append_child(&inner);
        inner.append_child(&outer);
        assert!(outer.parent().is_none());
        assert_eq!(outer.child_count(), 1);
    }

    #[test]
    fn replace_with_swaps_position() {
        let parent = Node::element("div");
        let old = span("old");
        let tail = span("tail");
        parent.append_child(&old);
        parent.append_child(&tail);
        let new = Node::element("p");
        old.replace_with(&new);
        assert!(parent.child_at(0).is_some_and(|n| n.ptr_eq(&new)));
        assert!(old.parent().is_none());
        assert_eq!(parent.to_html(), "<div><p></p><span>tail</span></div>");
    }

    #[test]
    fn equality_ignores_attribute_order_but_not_values() {
        let a = Node::element("div");
        a.set_attribute("id", "x");
        a.set_attribute("class", "c");
        let b = Node::element("div");
        b.set_attribute("class", "c");
        b.set_attribute("id", "x");
        assert!(a.is_equal_node(&b));
        b.set_attribute("class", "d");
        assert!(!a.is_equal_node(&b));
    }

    #[test]
    fn deep_clone_is_equal_but_distinct() {
        let root = Node::element("section");
        root.set_attribute("id", "s");
        root.append_child(&span("hello"));
        let copy = root.clone_node(true);
        assert!(copy.is_equal_node(&root));
        assert!(!copy.ptr_eq(&root));
        assert!(copy.parent().is_none());
        assert_eq!(root.clone_node(false).child_count(), 0);
    }

    #[test]
    fn dropping_last_handle_frees_detached_subtree() {
        let parent = Node::element("div");
        let child = span("x");
        let weak = child.downgrade();
        parent.append_child(&child);
        drop(child);
        assert!(weak.is_alive());
        let child = weak.upgrade().expect("still attached");
        child.remove();
        drop(child);
        assert!(!weak.is_alive());
    }

    #[test]
    fn html_serialization_escapes_text_and_attributes() {
        let node = Node::element("a");
        node.set_attribute("title", "\"q\" & co");
        node.append_child(&Node::text("1 < 2"));
        assert_eq!(
            node.to_html(),
            "<a title=\"&quot;q&quot; &amp; co\">1 &lt; 2</a>"
        );
    }
}
