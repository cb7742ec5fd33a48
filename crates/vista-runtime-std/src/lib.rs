//! Standard runtime services backed by Rust's `std` library.
//!
//! [`StdScheduler`] answers the runtime's turn requests by raising a
//! pending flag and waking the host loop once per owed turn, so the loop
//! can sleep until deferred work exists. [`StdRuntime`] bundles it with a
//! [`Runtime`] and claims the owed turn when polled.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use vista_core::{Document, Runtime, RuntimeHandle, RuntimeOptions, RuntimeScheduler};

type Waker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Turn requests folded into one pending flag.
///
/// The runtime asks for a turn every time it queues a task; the host only
/// cares whether at least one turn is owed. The waker therefore fires on
/// the transition from "nothing owed" to "turn owed" and stays quiet for
/// the requests that follow until the host claims the turn.
pub struct StdScheduler {
    waker: Mutex<Option<Waker>>,
    pending: AtomicBool,
    requests: AtomicUsize,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            waker: Mutex::new(None),
            pending: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
        }
    }

    /// Claims the owed turn, if any. The next request wakes the host again.
    pub fn take_turn_request(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Whether a turn is owed and not yet claimed.
    pub fn is_turn_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Total requests received, including coalesced ones.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    /// Installs the callback that tells the host loop a turn is owed.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.waker_slot() = Some(Arc::new(waker));
    }

    pub fn clear_waker(&self) {
        *self.waker_slot() = None;
    }

    fn waker_slot(&self) -> std::sync::MutexGuard<'_, Option<Waker>> {
        self.waker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field("pending", &self.is_turn_pending())
            .field("requests", &self.requests())
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_turn(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if self.pending.swap(true, Ordering::AcqRel) {
            return;
        }
        // Cloned out so the waker may call back into the scheduler.
        let waker = self.waker_slot().clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

/// A [`Runtime`] driven by a [`StdScheduler`].
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    runtime: Runtime,
}

impl StdRuntime {
    pub fn new() -> Self {
        Self::with_document(Document::new(), RuntimeOptions::default())
    }

    pub fn with_document(document: Document, options: RuntimeOptions) -> Self {
        let scheduler = Arc::new(StdScheduler::default());
        let runtime = Runtime::with_document(scheduler.clone(), document, options);
        Self { scheduler, runtime }
    }

    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn take_turn_request(&self) -> bool {
        self.scheduler.take_turn_request()
    }

    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_waker(waker);
    }

    pub fn clear_waker(&self) {
        self.scheduler.clear_waker();
    }

    /// Runs one turn if one was requested. Returns how many tasks ran.
    pub fn poll(&self) -> usize {
        if !self.take_turn_request() {
            return 0;
        }
        let ran = self.runtime.run_turn();
        log::trace!("turn {} ran {ran} task(s)", self.runtime.turns());
        ran
    }

    /// Polls until no further turn is requested.
    pub fn run_until_idle(&self) -> usize {
        let turns = self.runtime.run_until_idle();
        self.scheduler.take_turn_request();
        turns
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("runtime", &self.runtime)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}
