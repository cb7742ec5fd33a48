//! Component definitions.
//!
//! A [`Component`] is an immutable description: initial state, a render
//! function, event handlers bound per [`EventScope`], the shared cells it
//! reads, and the rules it applies after every state transition. It is
//! built once, registered under a viewport id and instantiated by the
//! runtime for every mount point carrying that id.

use std::fmt;
use std::rc::Rc;

use vista_dom::{Event, Node};

use crate::instance::Instance;
use crate::memo::RenderContext;
use crate::registry::MountedInstance;
use crate::runtime::Runtime;
use crate::shared_state::{SharedState, SharedStates};
use crate::RuntimeError;

/// Where an event handler listens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventScope {
    /// The instance's own root. Events are stopped there, so enclosing
    /// instances never see them.
    Local,
    Window,
    Document,
}

impl fmt::Display for EventScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventScope::Local => "local",
            EventScope::Window => "window",
            EventScope::Document => "document",
        })
    }
}

/// Where a derived event is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitTarget {
    /// The instance root; the event bubbles to enclosing instances.
    Root,
    Window,
}

/// Decides whether a handler's result counts as a state change.
pub trait RedrawPolicy<S>: 'static {
    fn is_change(&self, old: &Rc<S>, new: &Rc<S>) -> bool;
}

/// A change is a different allocation. Handlers signal "nothing happened"
/// by returning the state they were given.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferentialChange;

impl<S> RedrawPolicy<S> for ReferentialChange {
    fn is_change(&self, old: &Rc<S>, new: &Rc<S>) -> bool {
        !Rc::ptr_eq(old, new)
    }
}

/// A change is an unequal value.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralChange;

impl<S: PartialEq> RedrawPolicy<S> for StructuralChange {
    fn is_change(&self, old: &Rc<S>, new: &Rc<S>) -> bool {
        **old != **new
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysRedraw;

impl<S> RedrawPolicy<S> for AlwaysRedraw {
    fn is_change(&self, _old: &Rc<S>, _new: &Rc<S>) -> bool {
        true
    }
}

pub(crate) type RenderFn<S, V> = Box<dyn Fn(&RenderContext, &S, &V) -> Node>;
pub(crate) type Handler<S, V> = Rc<dyn Fn(&Rc<S>, &Event, &V) -> Rc<S>>;
pub(crate) type Transition<S> = Box<dyn Fn(&S, &S) -> bool>;

pub(crate) struct EventBinding<S, V> {
    pub(crate) scope: EventScope,
    pub(crate) name: String,
    pub(crate) handler: Handler<S, V>,
}

pub(crate) struct DeriveRule<S> {
    pub(crate) when: Transition<S>,
    pub(crate) apply: Box<dyn Fn(&S)>,
}

pub(crate) struct EmitRule<S> {
    pub(crate) target: EmitTarget,
    pub(crate) when: Transition<S>,
    pub(crate) build: Box<dyn Fn(&S, &S) -> Event>,
}

pub struct Component<S: 'static, D: SharedStates = ()> {
    pub(crate) initial_state: Rc<S>,
    pub(crate) render: RenderFn<S, D::Values>,
    pub(crate) events: Vec<EventBinding<S, D::Values>>,
    pub(crate) shared: D,
    pub(crate) derives: Vec<DeriveRule<S>>,
    pub(crate) emits: Vec<EmitRule<S>>,
    pub(crate) tag: Option<String>,
    pub(crate) policy: Box<dyn RedrawPolicy<S>>,
}

impl<S: 'static> Component<S, ()> {
    pub fn new(initial: S, render: impl Fn(&RenderContext, &S) -> Node + 'static) -> Self {
        Self::with_shared((), initial, move |cx, state, _: &()| render(cx, state))
    }
}

impl<S: 'static, D: SharedStates> Component<S, D> {
    /// A component whose render function and handlers also read `shared`.
    /// Every instance redraws when any of those cells is written.
    pub fn with_shared(
        shared: D,
        initial: S,
        render: impl Fn(&RenderContext, &S, &D::Values) -> Node + 'static,
    ) -> Self {
        Self {
            initial_state: Rc::new(initial),
            render: Box::new(render),
            events: Vec::new(),
            shared,
            derives: Vec::new(),
            emits: Vec::new(),
            tag: None,
            policy: Box::new(ReferentialChange),
        }
    }

    /// Handles `name` events in `scope`, replacing any earlier handler for
    /// the same pair.
    pub fn on(
        mut self,
        scope: EventScope,
        name: &str,
        handler: impl Fn(&Rc<S>, &Event, &D::Values) -> Rc<S> + 'static,
    ) -> Self {
        self.events
            .retain(|binding| !(binding.scope == scope && binding.name == name));
        self.events.push(EventBinding {
            scope,
            name: name.to_owned(),
            handler: Rc::new(handler),
        });
        self
    }

    pub fn on_local(
        self,
        name: &str,
        handler: impl Fn(&Rc<S>, &Event, &D::Values) -> Rc<S> + 'static,
    ) -> Self {
        self.on(EventScope::Local, name, handler)
    }

    pub fn on_window(
        self,
        name: &str,
        handler: impl Fn(&Rc<S>, &Event, &D::Values) -> Rc<S> + 'static,
    ) -> Self {
        self.on(EventScope::Window, name, handler)
    }

    pub fn on_document(
        self,
        name: &str,
        handler: impl Fn(&Rc<S>, &Event, &D::Values) -> Rc<S> + 'static,
    ) -> Self {
        self.on(EventScope::Document, name, handler)
    }

    /// After a transition `old -> new` for which `when` holds, writes
    /// `value(new)` into `cell`.
    pub fn derive<T: 'static>(
        mut self,
        cell: SharedState<T>,
        when: impl Fn(&S, &S) -> bool + 'static,
        value: impl Fn(&S) -> T + 'static,
    ) -> Self {
        self.derives.push(DeriveRule {
            when: Box::new(when),
            apply: Box::new(move |state| cell.write(value(state))),
        });
        self
    }

    /// After a transition `old -> new` for which `when` holds, dispatches
    /// `build(old, new)` at `target`.
    pub fn emit(
        mut self,
        target: EmitTarget,
        when: impl Fn(&S, &S) -> bool + 'static,
        build: impl Fn(&S, &S) -> Event + 'static,
    ) -> Self {
        self.emits.push(EmitRule {
            target,
            when: Box::new(when),
            build: Box::new(build),
        });
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_owned());
        self
    }

    pub fn redraw_policy(mut self, policy: impl RedrawPolicy<S>) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn into_definition(self) -> Rc<dyn ComponentDefinition> {
        Rc::new(self)
    }

    pub(crate) fn handler(&self, scope: EventScope, name: &str) -> Option<Handler<S, D::Values>> {
        self.events
            .iter()
            .find(|binding| binding.scope == scope && binding.name == name)
            .map(|binding| Rc::clone(&binding.handler))
    }
}

/// Type-erased view of a [`Component`], so components with different state
/// types share one registry.
pub trait ComponentDefinition: 'static {
    fn tag(&self) -> Option<&str>;

    /// Creates, draws and registers an instance inside `viewport`.
    fn instantiate(
        self: Rc<Self>,
        runtime: &Runtime,
        viewport: &Node,
    ) -> Result<Rc<dyn MountedInstance>, RuntimeError>;
}

impl<S: 'static, D: SharedStates> ComponentDefinition for Component<S, D> {
    fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    fn instantiate(
        self: Rc<Self>,
        runtime: &Runtime,
        viewport: &Node,
    ) -> Result<Rc<dyn MountedInstance>, RuntimeError> {
        let instance: Rc<dyn MountedInstance> = Instance::mount(self, runtime, viewport)?;
        Ok(instance)
    }
}

impl<S: 'static, D: SharedStates> fmt::Debug for Component<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let events: Vec<String> = self
            .events
            .iter()
            .map(|binding| format!("{}:{}", binding.scope, binding.name))
            .collect();
        f.debug_struct("Component")
            .field("tag", &self.tag)
            .field("events", &events)
            .field("derives", &self.derives.len())
            .field("emits", &self.emits.len())
            .finish()
    }
}
