//! Shared state cells.
//!
//! A [`SharedState`] holds one value and a list of zero-argument listeners.
//! Every write notifies all listeners synchronously, in registration order,
//! even when the new value equals the old one; callers that want
//! deduplication gate their writes themselves.
//!
//! A listener that writes to a cell re-enters notification for that cell
//! before the outer write returns. Chains of such writes can recurse
//! without bound, so notification stops nesting at [`MAX_NOTIFY_DEPTH`]:
//! the value is still stored but listeners are not invoked again.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

pub const MAX_NOTIFY_DEPTH: usize = 64;

pub type StateListener = Rc<dyn Fn()>;

fn same_listener(a: &StateListener, b: &StateListener) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

struct SharedStateInner<T> {
    value: RefCell<T>,
    listeners: RefCell<Vec<StateListener>>,
    depth: Cell<usize>,
}

pub struct SharedState<T> {
    inner: Rc<SharedStateInner<T>>,
}

impl<T> Clone for SharedState<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for SharedState<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for SharedState<T> {}

struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

impl<T: 'static> SharedState<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(SharedStateInner {
                value: RefCell::new(value),
                listeners: RefCell::new(Vec::new()),
                depth: Cell::new(0),
            }),
        }
    }

    pub fn read(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Replaces the value, then notifies every listener.
    pub fn write(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
        self.notify();
    }

    /// Mutates the value in place, then notifies every listener.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = f(&mut self.inner.value.borrow_mut());
        self.notify();
        result
    }

    /// Adds `listener` unless it is already subscribed.
    pub fn subscribe(&self, listener: &StateListener) {
        let mut listeners = self.inner.listeners.borrow_mut();
        if !listeners.iter().any(|existing| same_listener(existing, listener)) {
            listeners.push(Rc::clone(listener));
        }
    }

    pub fn unsubscribe(&self, listener: &StateListener) {
        self.inner
            .listeners
            .borrow_mut()
            .retain(|existing| !same_listener(existing, listener));
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    fn notify(&self) {
        let depth = self.inner.depth.get();
        if depth >= MAX_NOTIFY_DEPTH {
            log::error!(
                "shared state notification nested {depth} levels deep; skipping listeners"
            );
            return;
        }
        self.inner.depth.set(depth + 1);
        let _guard = DepthGuard(&self.inner.depth);
        let listeners: Vec<StateListener> = self.inner.listeners.borrow().clone();
        for listener in listeners {
            listener();
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedState")
            .field("value", &*self.inner.value.borrow())
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}

/// A fixed set of shared cells a component reads while rendering.
///
/// Implemented for `()` and for tuples of [`SharedState`]s; `Values` is the
/// matching tuple of current values handed to render and event handlers.
pub trait SharedStates: 'static {
    type Values;

    fn values(&self) -> Self::Values;

    fn subscribe_all(&self, listener: &StateListener);

    fn unsubscribe_all(&self, listener: &StateListener);
}

impl SharedStates for () {
    type Values = ();

    fn values(&self) -> Self::Values {}

    fn subscribe_all(&self, _listener: &StateListener) {}

    fn unsubscribe_all(&self, _listener: &StateListener) {}
}

macro_rules! impl_shared_states {
    ($($ty:ident : $index:tt),+) => {
        impl<$($ty: Clone + 'static),+> SharedStates for ($(SharedState<$ty>,)+) {
            type Values = ($($ty,)+);

            fn values(&self) -> Self::Values {
                ($(self.$index.read(),)+)
            }

            fn subscribe_all(&self, listener: &StateListener) {
                $(self.$index.subscribe(listener);)+
            }

            fn unsubscribe_all(&self, listener: &StateListener) {
                $(self.$index.unsubscribe(listener);)+
            }
        }
    };
}

impl_shared_states!(A: 0);
impl_shared_states!(A: 0, B: 1);
impl_shared_states!(A: 0, B: 1, C: 2);
impl_shared_states!(A: 0, B: 1, C: 2, D: 3);
impl_shared_states!(A: 0, B: 1, C: 2, D: 3, E: 4);
impl_shared_states!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
