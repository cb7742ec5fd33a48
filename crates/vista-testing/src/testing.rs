use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vista_core::{
    viewport, ComponentDefinition, Document, Event, MountedInstance, Runtime, RuntimeError,
    RuntimeOptions, RuntimeScheduler,
};
use vista_dom::Node;

/// Scheduler that only counts how often a turn was requested. Turns are
/// driven explicitly by the test.
#[derive(Debug, Default)]
pub struct CountingScheduler {
    requests: AtomicUsize,
}

impl CountingScheduler {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl RuntimeScheduler for CountingScheduler {
    fn schedule_turn(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Headless harness owning one runtime and its document.
///
/// Nothing runs on its own: state changes queue redraws, and the test
/// decides when the next cooperative turn happens with
/// [`VistaTestRule::advance_turn`] or [`VistaTestRule::pump_until_idle`].
pub struct VistaTestRule {
    runtime: Runtime,
    scheduler: Arc<CountingScheduler>,
}

impl VistaTestRule {
    pub fn new() -> Self {
        Self::with_options(RuntimeOptions::default())
    }

    pub fn with_options(options: RuntimeOptions) -> Self {
        let scheduler = Arc::new(CountingScheduler::default());
        let runtime = Runtime::with_document(scheduler.clone(), Document::new(), options);
        Self { runtime, scheduler }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn document(&self) -> &Document {
        self.runtime.document()
    }

    pub fn body(&self) -> &Node {
        self.runtime.document().body()
    }

    /// Replaces the registered components.
    pub fn register<I, K>(&self, components: I)
    where
        I: IntoIterator<Item = (K, Rc<dyn ComponentDefinition>)>,
        K: Into<String>,
    {
        self.runtime.register_components(components);
    }

    /// Appends an empty viewport for `id` to the body and returns it.
    pub fn add_viewport(&self, id: &str) -> Node {
        let node = viewport(id);
        self.body().append_child(&node);
        node
    }

    /// Adds a viewport for `id` to the body and mounts it.
    pub fn mount(&self, id: &str) -> Result<Rc<dyn MountedInstance>, RuntimeError> {
        let node = self.add_viewport(id);
        self.runtime.mount(&node)
    }

    pub fn instance(&self, id: &str) -> Option<Rc<dyn MountedInstance>> {
        self.runtime.instance(id)
    }

    /// Current drawn root of the instance mounted at `id`.
    pub fn root(&self, id: &str) -> Option<Node> {
        self.instance(id).map(|instance| instance.root())
    }

    /// Text content of the viewport element `id`, wherever it lives.
    pub fn text(&self, id: &str) -> Option<String> {
        self.find(id).map(|node| node.text_content())
    }

    /// Looks up an element by id anywhere in the document.
    pub fn find(&self, id: &str) -> Option<Node> {
        self.document().get_element_by_id(id)
    }

    /// Dispatches a fresh `kind` event at the root of instance `id`.
    /// Returns `false` when the default was prevented, `None` when nothing
    /// is mounted there.
    pub fn dispatch(&self, id: &str, kind: &str) -> Option<bool> {
        self.root(id).map(|root| root.dispatch_event(&Event::new(kind)))
    }

    pub fn dispatch_at(&self, node: &Node, event: &Event) -> bool {
        node.dispatch_event(event)
    }

    pub fn dispatch_window(&self, event: &Event) -> bool {
        self.document().window().dispatch_event(event)
    }

    pub fn dispatch_document(&self, event: &Event) -> bool {
        self.document().document().dispatch_event(event)
    }

    /// Runs exactly one cooperative turn. Returns how many tasks ran.
    pub fn advance_turn(&self) -> usize {
        self.runtime.run_turn()
    }

    /// Runs turns until nothing is pending. Returns how many turns ran.
    pub fn pump_until_idle(&self) -> usize {
        self.runtime.run_until_idle()
    }

    pub fn has_pending_work(&self) -> bool {
        self.runtime.has_pending_tasks()
    }

    /// How many times the runtime asked the host for a turn.
    pub fn turn_requests(&self) -> usize {
        self.scheduler.requests()
    }
}

impl Default for VistaTestRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `f` against a fresh [`VistaTestRule`].
pub fn run_test_runtime<R>(f: impl FnOnce(&VistaTestRule) -> R) -> R {
    let rule = VistaTestRule::new();
    f(&rule)
}
