use std::any::Any;
use std::fmt;
use std::rc::Rc;

use vista_dom::{Event, Node};

use crate::collections::IdMap;
use crate::component::{ComponentDefinition, EventScope};
use crate::instance::{InstancePhase, RedrawStats};
use crate::RuntimeError;

/// Handle the runtime keeps for every live instance.
pub trait MountedInstance {
    /// Id of the mount point the instance is bound to.
    fn id(&self) -> &str;

    /// The currently drawn root.
    fn root(&self) -> Node;

    fn phase(&self) -> InstancePhase;

    fn stats(&self) -> RedrawStats;

    /// Current state, for inspection; downcast to the component's state type.
    fn state(&self) -> Rc<dyn Any>;

    /// Runs the handler registered for `event` in `scope`, as a bound
    /// listener would, minus the propagation handling.
    fn handle_event(&self, scope: EventScope, event: &Event) -> Result<(), RuntimeError>;

    /// Renders and patches synchronously. Returns whether the live tree
    /// was touched.
    fn redraw(&self) -> bool;

    /// Unbinds every listener and shared-state subscription. Idempotent.
    fn destroy(&self);
}

/// Live instances by mount point id.
#[derive(Default)]
pub struct InstanceRegistry {
    instances: IdMap<Rc<dyn MountedInstance>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        id: String,
        instance: Rc<dyn MountedInstance>,
    ) -> Result<(), RuntimeError> {
        if self.instances.contains_key(&id) {
            return Err(RuntimeError::DuplicateMountPoint { id });
        }
        self.instances.insert(id, instance);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Rc<dyn MountedInstance>> {
        self.instances.get(id).cloned()
    }

    pub fn remove(&mut self, id: &str) -> Option<Rc<dyn MountedInstance>> {
        self.instances.shift_remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.instances.contains_key(id)
    }

    /// Whether the entry under `id` is the instance living at `address`.
    pub fn holds(&self, id: &str, address: *const ()) -> bool {
        self.instances
            .get(id)
            .is_some_and(|instance| std::ptr::addr_eq(Rc::as_ptr(instance), address))
    }

    pub fn ids(&self) -> Vec<String> {
        self.instances.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.instances.keys()).finish()
    }
}

/// Component definitions by viewport id. Loaded wholesale.
#[derive(Default)]
pub struct ComponentRegistry {
    definitions: IdMap<Rc<dyn ComponentDefinition>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards every previous definition and loads `definitions`.
    pub fn replace_all<I>(&mut self, definitions: I)
    where
        I: IntoIterator<Item = (String, Rc<dyn ComponentDefinition>)>,
    {
        self.definitions = definitions.into_iter().collect();
    }

    pub fn get(&self, id: &str) -> Option<Rc<dyn ComponentDefinition>> {
        self.definitions.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.definitions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<(&String, Option<&str>)> = self
            .definitions
            .iter()
            .map(|(id, definition)| (id, definition.tag()))
            .collect();
        f.debug_map().entries(entries).finish()
    }
}
