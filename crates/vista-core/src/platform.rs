//! Platform abstraction traits for the Vista runtime.
//!
//! The runtime never executes deferred work by itself. It queues tasks and
//! asks the host, through [`RuntimeScheduler`], to run a cooperative turn
//! soon; the host then calls [`crate::Runtime::run_turn`].

/// Requests cooperative turns from the host event loop.
pub trait RuntimeScheduler: Send + Sync {
    /// Called whenever a task is queued. Implementations typically wake
    /// the host loop; calling it repeatedly before the turn runs is fine.
    fn schedule_turn(&self);
}
