use std::fmt;
use std::rc::Rc;

use crate::event::EventTarget;
use crate::node::Node;

struct DocumentInner {
    window: EventTarget,
    document: EventTarget,
    body: Node,
}

/// The single mutable tree a runtime renders into, plus the two global
/// event targets (`window` and `document`).
#[derive(Clone)]
pub struct Document {
    inner: Rc<DocumentInner>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(DocumentInner {
                window: EventTarget::new(),
                document: EventTarget::new(),
                body: Node::element("body"),
            }),
        }
    }

    pub fn window(&self) -> &EventTarget {
        &self.inner.window
    }

    pub fn document(&self) -> &EventTarget {
        &self.inner.document
    }

    pub fn body(&self) -> &Node {
        &self.inner.body
    }

    /// First node under `body` carrying `id`, in document order.
    pub fn get_element_by_id(&self, id: &str) -> Option<Node> {
        self.inner
            .body
            .descendants()
            .into_iter()
            .find(|node| node.id().as_deref() == Some(id))
    }

    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("body", &self.inner.body)
            .field("window", &self.inner.window)
            .field("document", &self.inner.document)
            .finish()
    }
}
