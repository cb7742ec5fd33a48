//! Events and event targets.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::node::{Node, WeakNode};

/// Callback attached to an [`EventTarget`]. Identity (the `Rc` allocation)
/// is what [`EventTarget::remove_event_listener`] matches on.
pub type Listener = Rc<dyn Fn(&Event)>;

pub struct Event {
    kind: String,
    detail: Option<Rc<dyn Any>>,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
    immediate_propagation_stopped: Cell<bool>,
    target: RefCell<WeakNode>,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            detail: None,
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
            immediate_propagation_stopped: Cell::new(false),
            target: RefCell::new(WeakNode::default()),
        }
    }

    /// Attaches a typed payload, readable through [`Event::detail`].
    pub fn with_detail<T: Any>(mut self, detail: T) -> Self {
        self.detail = Some(Rc::new(detail));
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn detail<T: Any>(&self) -> Option<&T> {
        self.detail.as_deref().and_then(|detail| detail.downcast_ref())
    }

    /// Node the event was dispatched at; `None` for window/document
    /// dispatches or once that node is gone.
    pub fn target(&self) -> Option<Node> {
        self.target.borrow().upgrade()
    }

    pub(crate) fn set_target(&self, node: &Node) {
        *self.target.borrow_mut() = node.downgrade();
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn stop_immediate_propagation(&self) {
        self.propagation_stopped.set(true);
        self.immediate_propagation_stopped.set(true);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub fn immediate_propagation_stopped(&self) -> bool {
        self.immediate_propagation_stopped.get()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("has_detail", &self.detail.is_some())
            .field("default_prevented", &self.default_prevented.get())
            .field("propagation_stopped", &self.propagation_stopped.get())
            .finish()
    }
}

fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Listener table keyed by event name. Nodes embed one; the window and
/// document singletons of a [`crate::Document`] are standalone targets.
#[derive(Default)]
pub struct EventTarget {
    listeners: RefCell<Vec<(String, Listener)>>,
}

impl EventTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for `kind`. Adding the same listener twice for
    /// the same event name has no effect.
    pub fn add_event_listener(&self, kind: &str, listener: &Listener) {
        let mut listeners = self.listeners.borrow_mut();
        let present = listeners
            .iter()
            .any(|(name, existing)| name == kind && same_listener(existing, listener));
        if !present {
            listeners.push((kind.to_owned(), Rc::clone(listener)));
        }
    }

    pub fn remove_event_listener(&self, kind: &str, listener: &Listener) {
        self.listeners
            .borrow_mut()
            .retain(|(name, existing)| !(name == kind && same_listener(existing, listener)));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Invokes the listeners registered for `event.kind()` in registration
    /// order. Returns `false` when a listener prevented the default.
    pub fn dispatch_event(&self, event: &Event) -> bool {
        self.invoke(event);
        !event.default_prevented()
    }

    pub(crate) fn invoke(&self, event: &Event) {
        let matching: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(name, _)| name == event.kind())
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in matching {
            if event.immediate_propagation_stopped() {
                break;
            }
            listener(event);
        }
    }
}

impl fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .listeners
            .borrow()
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        f.debug_struct("EventTarget").field("listeners", &names).finish()
    }
}
