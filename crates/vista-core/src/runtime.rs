use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use vista_dom::{Document, Node};

use crate::component::ComponentDefinition;
use crate::memo::RenderContext;
use crate::platform::RuntimeScheduler;
use crate::registry::{ComponentRegistry, InstanceRegistry, MountedInstance};
use crate::viewport::{discover, DEFAULT_VIEWPORT_MARKER};
use crate::RuntimeError;

type Task = Box<dyn FnOnce() + 'static>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Class that marks an element as a mount point.
    pub viewport_marker: String,
    /// Attribute used to match children across a patch; `id` is the fallback.
    pub key_attribute: String,
    /// Local events whose default action is prevented before the handler runs.
    pub prevent_default_events: Vec<String>,
    /// Upper bound on turns for [`Runtime::run_until_idle`].
    pub max_turns: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            viewport_marker: DEFAULT_VIEWPORT_MARKER.to_owned(),
            key_attribute: "key".to_owned(),
            prevent_default_events: vec!["submit".to_owned()],
            max_turns: 1024,
        }
    }
}

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    document: Document,
    options: RuntimeOptions,
    components: RefCell<ComponentRegistry>,
    instances: RefCell<InstanceRegistry>,
    render_context: RenderContext,
    pending_tasks: RefCell<VecDeque<Task>>,
    turns: Cell<u64>,
}

impl RuntimeInner {
    fn enqueue_task(&self, task: Task) {
        self.pending_tasks.borrow_mut().push_back(task);
        self.scheduler.schedule_turn();
    }

    fn has_tasks(&self) -> bool {
        !self.pending_tasks.borrow().is_empty()
    }
}

/// Owns the document, both registries, the render cache and the queue of
/// deferred tasks. Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// Creates a runtime over an empty document with default options.
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self::with_document(scheduler, Document::new(), RuntimeOptions::default())
    }

    /// Creates a runtime drawing into `document`.
    pub fn with_document(
        scheduler: Arc<dyn RuntimeScheduler>,
        document: Document,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                scheduler,
                document,
                options,
                components: RefCell::new(ComponentRegistry::new()),
                instances: RefCell::new(InstanceRegistry::new()),
                render_context: RenderContext::new(),
                pending_tasks: RefCell::new(VecDeque::new()),
                turns: Cell::new(0),
            }),
        }
    }

    /// Returns a weak handle that can outlive the runtime.
    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    /// The document instances are mounted into.
    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    /// Options the runtime was created with.
    pub fn options(&self) -> &RuntimeOptions {
        &self.inner.options
    }

    /// Render cache and identity registry shared by every instance.
    pub fn render_context(&self) -> &RenderContext {
        &self.inner.render_context
    }

    /// Replaces every registered component definition.
    pub fn register_components<I, K>(&self, definitions: I)
    where
        I: IntoIterator<Item = (K, Rc<dyn ComponentDefinition>)>,
        K: Into<String>,
    {
        let mut components = self.inner.components.borrow_mut();
        components.replace_all(
            definitions
                .into_iter()
                .map(|(id, definition)| (id.into(), definition)),
        );
        log::debug!("registered {} component(s)", components.len());
    }

    /// Definition registered under viewport `id`.
    pub fn component(&self, id: &str) -> Option<Rc<dyn ComponentDefinition>> {
        self.inner.components.borrow().get(id)
    }

    /// Registered viewport ids, in registration order.
    pub fn components(&self) -> Vec<String> {
        self.inner.components.borrow().ids()
    }

    /// Mounts the component registered under `viewport`'s id.
    pub fn mount(&self, viewport: &Node) -> Result<Rc<dyn MountedInstance>, RuntimeError> {
        let id = viewport.id().ok_or(RuntimeError::MissingViewportId)?;
        let definition = self
            .component(&id)
            .ok_or(RuntimeError::UnknownComponent { id })?;
        self.mount_component(definition, viewport)
    }

    /// Mounts `definition` into `viewport` regardless of what is registered
    /// under its id.
    pub fn mount_component(
        &self,
        definition: Rc<dyn ComponentDefinition>,
        viewport: &Node,
    ) -> Result<Rc<dyn MountedInstance>, RuntimeError> {
        definition.instantiate(self, viewport)
    }

    /// Mounts every registered viewport found below the document body.
    /// Returns the ids that were mounted.
    pub fn mount_document(&self) -> Result<Vec<String>, RuntimeError> {
        let found = discover(self.inner.document.body(), &self.inner.options.viewport_marker);
        let mut mounted = Vec::new();
        for (id, node) in found {
            if self.is_mounted(&id) {
                continue;
            }
            if let Some(definition) = self.component(&id) {
                self.mount_component(definition, &node)?;
                mounted.push(id);
            }
        }
        Ok(mounted)
    }

    /// Deregisters and destroys the instance under `id` together with every
    /// registered instance drawn inside it, and detaches its root. Returns
    /// `false` when nothing was mounted there.
    pub fn unmount(&self, id: &str) -> bool {
        let Some(instance) = self.deregister(id) else {
            return false;
        };
        let root = instance.root();
        for nested in discover(&root, &self.inner.options.viewport_marker).keys() {
            self.unmount(nested);
        }
        instance.destroy();
        root.remove();
        true
    }

    /// Live instance mounted at `id`.
    pub fn instance(&self, id: &str) -> Option<Rc<dyn MountedInstance>> {
        self.inner.instances.borrow().get(id)
    }

    /// Whether an instance is mounted at `id`.
    pub fn is_mounted(&self, id: &str) -> bool {
        self.inner.instances.borrow().contains(id)
    }

    /// Ids of every live instance, in mount order.
    pub fn mounted_ids(&self) -> Vec<String> {
        self.inner.instances.borrow().ids()
    }

    /// Queues `task` for the next turn and asks the scheduler for one.
    pub fn spawn_task(&self, task: Box<dyn FnOnce() + 'static>) {
        self.inner.enqueue_task(task);
    }

    /// Runs the tasks queued before this call. Tasks they queue wait for
    /// the next turn. Returns how many tasks ran.
    pub fn run_turn(&self) -> usize {
        let tasks: Vec<Task> = self.inner.pending_tasks.borrow_mut().drain(..).collect();
        self.inner.turns.set(self.inner.turns.get() + 1);
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }

    /// Runs turns until no task is pending or `max_turns` is reached.
    /// Returns how many turns ran.
    pub fn run_until_idle(&self) -> usize {
        let mut turns = 0;
        while self.inner.has_tasks() {
            if turns >= self.inner.options.max_turns {
                log::warn!("still busy after {turns} turns; giving up");
                break;
            }
            self.run_turn();
            turns += 1;
        }
        turns
    }

    /// Whether any task is waiting for a turn.
    pub fn has_pending_tasks(&self) -> bool {
        self.inner.has_tasks()
    }

    /// Number of turns run so far.
    pub fn turns(&self) -> u64 {
        self.inner.turns.get()
    }

    pub(crate) fn register_instance(
        &self,
        id: String,
        instance: Rc<dyn MountedInstance>,
    ) -> Result<(), RuntimeError> {
        self.inner.instances.borrow_mut().insert(id, instance)
    }

    pub(crate) fn deregister(&self, id: &str) -> Option<Rc<dyn MountedInstance>> {
        self.inner.instances.borrow_mut().remove(id)
    }

    pub(crate) fn holds_instance(&self, id: &str, address: *const ()) -> bool {
        self.inner.instances.borrow().holds(id, address)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("components", &*self.inner.components.borrow())
            .field("instances", &*self.inner.instances.borrow())
            .field("pending_tasks", &self.inner.pending_tasks.borrow().len())
            .field("turns", &self.inner.turns.get())
            .finish()
    }
}

/// Scheduler that ignores turn requests; the host runs turns on its own.
#[derive(Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_turn(&self) {}
}

#[cfg(test)]
#[derive(Default)]
pub(crate) struct TestScheduler {
    requests: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl TestScheduler {
    pub(crate) fn requests(&self) -> usize {
        self.requests.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl RuntimeScheduler for TestScheduler {
    fn schedule_turn(&self) {
        self.requests
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

/// Weak reference to a [`Runtime`]. Every method does nothing once the
/// runtime is gone.
#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    pub fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }

    pub fn spawn_task(&self, task: Box<dyn FnOnce() + 'static>) {
        if let Some(inner) = self.0.upgrade() {
            inner.enqueue_task(task);
        }
    }

    pub fn has_pending_tasks(&self) -> bool {
        self.0.upgrade().is_some_and(|inner| inner.has_tasks())
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RuntimeHandle").field(&self.is_alive()).finish()
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
