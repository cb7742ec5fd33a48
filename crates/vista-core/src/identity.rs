//! Stable integer identities for reference-counted values.
//!
//! Memoization fingerprints treat every non-primitive input by identity.
//! The registry hands out a number per live allocation and remembers it
//! through a weak reference only, so a dropped value frees its number and
//! the entry is swept on a later allocation.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::collections::HashMap;

pub type ObjectId = u64;

const MIN_SWEEP_THRESHOLD: usize = 64;

struct TrackedObject {
    id: ObjectId,
    alive: Box<dyn Fn() -> bool>,
}

impl TrackedObject {
    fn is_alive(&self) -> bool {
        (self.alive)()
    }
}

pub struct IdentityRegistry {
    by_address: HashMap<usize, TrackedObject>,
    by_id: HashMap<ObjectId, usize>,
    next_id: ObjectId,
    sweep_at: usize,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self {
            by_address: HashMap::new(),
            by_id: HashMap::new(),
            next_id: 1,
            sweep_at: MIN_SWEEP_THRESHOLD,
        }
    }

    /// Returns the identity of the allocation behind `value`, assigning a
    /// fresh one on first sight.
    pub fn object_id<T: ?Sized + 'static>(&mut self, value: &Rc<T>) -> ObjectId {
        let address = Rc::as_ptr(value).cast::<()>() as usize;
        if let Some(tracked) = self.by_address.get(&address) {
            if tracked.is_alive() {
                return tracked.id;
            }
            // A new allocation landed on a freed address.
            let stale = tracked.id;
            self.by_address.remove(&address);
            self.by_id.remove(&stale);
        }

        if self.by_address.len() >= self.sweep_at {
            self.prune();
            self.sweep_at = (self.by_address.len() * 2).max(MIN_SWEEP_THRESHOLD);
        }

        let id = self.allocate();
        let weak: Weak<T> = Rc::downgrade(value);
        self.by_address.insert(
            address,
            TrackedObject {
                id,
                alive: Box::new(move || weak.strong_count() > 0),
            },
        );
        self.by_id.insert(id, address);
        id
    }

    /// Whether `id` currently belongs to a live value.
    pub fn is_used(&self, id: ObjectId) -> bool {
        self.by_id
            .get(&id)
            .and_then(|address| self.by_address.get(address))
            .is_some_and(|tracked| tracked.id == id && tracked.is_alive())
    }

    /// Drops every entry whose value has been freed. Returns how many were
    /// removed.
    pub fn prune(&mut self) -> usize {
        let before = self.by_address.len();
        self.by_address.retain(|_, tracked| tracked.is_alive());
        let by_address = &self.by_address;
        self.by_id.retain(|id, address| {
            by_address
                .get(address)
                .is_some_and(|tracked| tracked.id == *id)
        });
        before - self.by_address.len()
    }

    /// Number of tracked entries, including ones not yet swept.
    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }

    fn allocate(&mut self) -> ObjectId {
        let mut candidate = self.next_id;
        while self.is_used(candidate) {
            candidate = successor(candidate);
        }
        if let Some(address) = self.by_id.remove(&candidate) {
            self.by_address.remove(&address);
        }
        self.next_id = successor(candidate);
        candidate
    }

    #[cfg(test)]
    pub(crate) fn set_next_id(&mut self, id: ObjectId) {
        self.next_id = id;
    }
}

fn successor(id: ObjectId) -> ObjectId {
    match id.wrapping_add(1) {
        0 => 1,
        next => next,
    }
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdentityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityRegistry")
            .field("tracked", &self.by_address.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
