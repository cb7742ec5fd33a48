//! The lifecycle engine behind every mounted component.
//!
//! An [`Instance`] moves through
//! `Mounting -> Idle -> (RedrawScheduled -> Idle)* -> Destroyed`.
//! State changes never redraw inline: the first change while `Idle` queues
//! one deferred task on the runtime and every further change before that
//! task runs is folded into it. Destroying an instance cannot cancel the
//! queued task, so the task checks the phase and the registry entry
//! before doing anything.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use vista_dom::{Document, Event, Listener, Node};

use crate::component::{Component, EmitTarget, EventScope};
use crate::memo::RenderContext;
use crate::patch::{patch, structurally_equal};
use crate::registry::MountedInstance;
use crate::runtime::{Runtime, RuntimeHandle, RuntimeOptions};
use crate::shared_state::{SharedStates, StateListener};
use crate::viewport::{discover, ViewportResolver};
use crate::RuntimeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstancePhase {
    Mounting,
    Idle,
    RedrawScheduled,
    Destroyed,
}

/// Per-instance redraw counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedrawStats {
    /// Render function invocations after the initial one.
    pub renders: usize,
    /// Redraws that mutated the live tree.
    pub redraws: usize,
    pub patches: usize,
    pub replacements: usize,
}

struct BoundListener {
    scope: EventScope,
    name: String,
    listener: Listener,
}

pub struct Instance<S: 'static, D: SharedStates = ()> {
    id: String,
    component: Rc<Component<S, D>>,
    runtime: RuntimeHandle,
    document: Document,
    render_context: RenderContext,
    options: RuntimeOptions,
    state: RefCell<Rc<S>>,
    root: RefCell<Node>,
    phase: Cell<InstancePhase>,
    listeners: RefCell<Vec<BoundListener>>,
    subscription: StateListener,
    stats: Cell<RedrawStats>,
    weak_self: Weak<Self>,
}

impl<S: 'static, D: SharedStates> Instance<S, D> {
    /// Draws `component` into `viewport`, mounts the nested viewports of
    /// that first draw, binds listeners and subscriptions, and registers
    /// the instance under the viewport's id.
    pub fn mount(
        component: Rc<Component<S, D>>,
        runtime: &Runtime,
        viewport: &Node,
    ) -> Result<Rc<Self>, RuntimeError> {
        let id = viewport.id().ok_or(RuntimeError::MissingViewportId)?;
        if runtime.is_mounted(&id) {
            return Err(RuntimeError::DuplicateMountPoint { id });
        }

        let render_context = runtime.render_context().clone();
        let state = Rc::clone(&component.initial_state);
        let root = (component.render)(&render_context, &state, &component.shared.values());

        let instance = Rc::new_cyclic(|weak: &Weak<Self>| {
            let subscriber = weak.clone();
            let subscription: StateListener = Rc::new(move || {
                if let Some(instance) = subscriber.upgrade() {
                    instance.schedule_redraw();
                }
            });
            Instance {
                id: id.clone(),
                component: Rc::clone(&component),
                runtime: runtime.handle(),
                document: runtime.document().clone(),
                render_context,
                options: runtime.options().clone(),
                state: RefCell::new(state),
                root: RefCell::new(root.clone()),
                phase: Cell::new(InstancePhase::Mounting),
                listeners: RefCell::new(Vec::new()),
                subscription,
                stats: Cell::new(RedrawStats::default()),
                weak_self: weak.clone(),
            }
        });
        log::debug!("mounting `{id}`");

        ViewportResolver::new(runtime).mount_all(&discover(&root, &instance.options.viewport_marker));
        instance.bind_listeners();
        component.shared.subscribe_all(&instance.subscription);
        viewport.append_child(&root);

        let entry: Rc<dyn MountedInstance> = instance.clone();
        if let Err(err) = runtime.register_instance(id, entry) {
            instance.destroy();
            root.remove();
            return Err(err);
        }
        instance.phase.set(InstancePhase::Idle);
        Ok(instance)
    }

    pub fn current_state(&self) -> Rc<S> {
        Rc::clone(&self.state.borrow())
    }

    fn component_name(&self) -> String {
        self.component
            .tag
            .clone()
            .unwrap_or_else(|| self.id.clone())
    }

    fn listener_for(&self, scope: EventScope) -> Listener {
        let weak = self.weak_self.clone();
        Rc::new(move |event: &Event| {
            let Some(instance) = weak.upgrade() else {
                return;
            };
            if let Err(err) = instance.dispatch(scope, event) {
                panic!("{err}");
            }
        })
    }

    fn bind_listeners(&self) {
        let root = self.root.borrow().clone();
        let mut bound = self.listeners.borrow_mut();
        for binding in &self.component.events {
            let listener = self.listener_for(binding.scope);
            match binding.scope {
                EventScope::Local => root.add_event_listener(&binding.name, &listener),
                EventScope::Window => self
                    .document
                    .window()
                    .add_event_listener(&binding.name, &listener),
                EventScope::Document => self
                    .document
                    .document()
                    .add_event_listener(&binding.name, &listener),
            }
            bound.push(BoundListener {
                scope: binding.scope,
                name: binding.name.clone(),
                listener,
            });
        }
    }

    fn unbind_listeners(&self, only: Option<EventScope>) {
        let root = self.root.borrow().clone();
        let bound = self.listeners.borrow();
        for entry in bound.iter() {
            if only.is_some_and(|scope| scope != entry.scope) {
                continue;
            }
            match entry.scope {
                EventScope::Local => root.remove_event_listener(&entry.name, &entry.listener),
                EventScope::Window => self
                    .document
                    .window()
                    .remove_event_listener(&entry.name, &entry.listener),
                EventScope::Document => self
                    .document
                    .document()
                    .remove_event_listener(&entry.name, &entry.listener),
            }
        }
    }

    fn rebind_local_listeners(&self, new_root: &Node) {
        for entry in self.listeners.borrow().iter() {
            if entry.scope == EventScope::Local {
                new_root.add_event_listener(&entry.name, &entry.listener);
            }
        }
    }

    fn dispatch(&self, scope: EventScope, event: &Event) -> Result<(), RuntimeError> {
        if self.phase.get() == InstancePhase::Destroyed {
            return Ok(());
        }
        let handler = self
            .component
            .handler(scope, event.kind())
            .ok_or_else(|| RuntimeError::MissingHandler {
                component: self.component_name(),
                scope,
                event: event.kind().to_owned(),
            })?;
        if scope == EventScope::Local {
            if self
                .options
                .prevent_default_events
                .iter()
                .any(|name| name == event.kind())
            {
                event.prevent_default();
            }
            event.stop_immediate_propagation();
        }
        let current = self.current_state();
        let next = handler(&current, event, &self.component.shared.values());
        self.change_state(current, next);
        Ok(())
    }

    fn change_state(&self, old: Rc<S>, new: Rc<S>) {
        if !self.component.policy.is_change(&old, &new) {
            log::trace!("`{}`: handler kept the state", self.id);
            return;
        }
        *self.state.borrow_mut() = Rc::clone(&new);
        for rule in &self.component.derives {
            if (rule.when)(&old, &new) {
                (rule.apply)(&new);
            }
        }
        self.schedule_redraw();
        for rule in &self.component.emits {
            if !(rule.when)(&old, &new) {
                continue;
            }
            let event = (rule.build)(&old, &new);
            match rule.target {
                EmitTarget::Root => {
                    let root = self.root.borrow().clone();
                    root.dispatch_event(&event);
                }
                EmitTarget::Window => {
                    self.document.window().dispatch_event(&event);
                }
            }
        }
    }

    fn schedule_redraw(&self) {
        if self.phase.get() != InstancePhase::Idle {
            return;
        }
        self.phase.set(InstancePhase::RedrawScheduled);
        let weak = self.weak_self.clone();
        self.runtime.spawn_task(Box::new(move || {
            if let Some(instance) = weak.upgrade() {
                instance.run_scheduled_redraw();
            }
        }));
    }

    fn run_scheduled_redraw(&self) {
        if self.phase.get() != InstancePhase::RedrawScheduled {
            log::trace!("`{}`: scheduled redraw dropped", self.id);
            return;
        }
        let Some(runtime) = self.runtime.upgrade() else {
            return;
        };
        let address = (self as *const Self).cast::<()>();
        if !runtime.holds_instance(&self.id, address) {
            log::trace!("`{}`: no longer registered, skipping redraw", self.id);
            return;
        }
        self.phase.set(InstancePhase::Idle);
        self.redraw_with(&runtime);
    }

    fn redraw_with(&self, runtime: &Runtime) -> bool {
        let state = self.current_state();
        let rendered = (self.component.render)(
            &self.render_context,
            &state,
            &self.component.shared.values(),
        );
        let mut stats = self.stats.get();
        stats.renders += 1;

        let marker = self.options.viewport_marker.as_str();
        let live = self.root.borrow().clone();
        if structurally_equal(&live, &rendered, marker) {
            self.stats.set(stats);
            log::trace!("`{}`: render unchanged", self.id);
            return false;
        }

        let old = discover(&live, marker);
        if live.tag() != rendered.tag() {
            self.unbind_listeners(Some(EventScope::Local));
            live.replace_with(&rendered);
            *self.root.borrow_mut() = rendered.clone();
            self.rebind_local_listeners(&rendered);
            stats.replacements += 1;
            log::debug!(
                "`{}`: root changed from {:?} to {:?}, replaced",
                self.id,
                live.tag(),
                rendered.tag()
            );
        } else {
            let mutations = patch(&live, &rendered, &self.options);
            stats.patches += 1;
            log::debug!("`{}`: patched {mutations:?}", self.id);
        }
        stats.redraws += 1;
        self.stats.set(stats);

        let current_root = self.root.borrow().clone();
        let new = discover(&current_root, marker);
        ViewportResolver::new(runtime).reconcile(old, &new);
        true
    }
}

impl<S: 'static, D: SharedStates> MountedInstance for Instance<S, D> {
    fn id(&self) -> &str {
        &self.id
    }

    fn root(&self) -> Node {
        self.root.borrow().clone()
    }

    fn phase(&self) -> InstancePhase {
        self.phase.get()
    }

    fn stats(&self) -> RedrawStats {
        self.stats.get()
    }

    fn state(&self) -> Rc<dyn Any> {
        self.current_state()
    }

    fn handle_event(&self, scope: EventScope, event: &Event) -> Result<(), RuntimeError> {
        self.dispatch(scope, event)
    }

    fn redraw(&self) -> bool {
        if self.phase.get() == InstancePhase::Destroyed {
            return false;
        }
        match self.runtime.upgrade() {
            Some(runtime) => self.redraw_with(&runtime),
            None => false,
        }
    }

    fn destroy(&self) {
        if self.phase.replace(InstancePhase::Destroyed) == InstancePhase::Destroyed {
            return;
        }
        self.unbind_listeners(None);
        self.listeners.borrow_mut().clear();
        self.component.shared.unsubscribe_all(&self.subscription);
        log::debug!("destroyed `{}`", self.id);
    }
}

impl<S: 'static, D: SharedStates> fmt::Debug for Instance<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("phase", &self.phase.get())
            .field("root", &self.root.borrow().tag())
            .field("stats", &self.stats.get())
            .finish()
    }
}
