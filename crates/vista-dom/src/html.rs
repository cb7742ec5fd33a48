//! Element construction helper.
//!
//! ```
//! use vista_dom::{h, text};
//!
//! let node = h("p").class("greeting").child(text("hi")).build();
//! assert_eq!(node.to_html(), r#"<p class="greeting">hi</p>"#);
//! ```

use crate::node::Node;

pub fn h(tag: &str) -> ElementBuilder {
    ElementBuilder {
        node: Node::element(tag),
    }
}

pub fn text(content: impl Into<String>) -> Node {
    Node::text(content)
}

#[must_use]
pub struct ElementBuilder {
    node: Node,
}

impl ElementBuilder {
    pub fn attr(self, name: &str, value: impl ToString) -> Self {
        self.node.set_attribute(name, value.to_string());
        self
    }

    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    pub fn class(self, class: &str) -> Self {
        let classes = match self.node.attribute("class") {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_owned(),
        };
        self.attr("class", classes)
    }

    pub fn key(self, key: impl ToString) -> Self {
        self.attr("key", key)
    }

    pub fn text(self, content: impl ToString) -> Self {
        self.node.append_child(&Node::text(content.to_string()));
        self
    }

    pub fn child(self, child: impl Into<Node>) -> Self {
        self.node.append_child(&child.into());
        self
    }

    pub fn children<I>(self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        for child in children {
            self.node.append_child(&child.into());
        }
        self
    }

    pub fn build(self) -> Node {
        self.node
    }
}

impl From<ElementBuilder> for Node {
    fn from(builder: ElementBuilder) -> Self {
        builder.build()
    }
}
