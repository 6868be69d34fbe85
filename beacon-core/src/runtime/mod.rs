//! Runtime Support
//!
//! The pieces of the host environment a beacon relies on but does not own:
//!
//! - `queue`: the per-thread micro-task queue that deferred notifications
//!   run on. Hosts call [`queue::drain`] at the end of each synchronous span.
//! - `finalizer`: the reclamation registry that runs a hook some time after
//!   an observer has been dropped.
//! - [`Scheduler`]: the seam between a beacon and whatever queue it defers
//!   onto. [`Microtasks`] is the default.

pub mod finalizer;
pub mod queue;

pub use finalizer::HookId;

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Schedules deferred tasks for a beacon.
///
/// Implementations must run every task they accept exactly once, strictly
/// after the call to `schedule` returns. A pending notification cannot be
/// cancelled, so a scheduler that drops tasks leaves its beacons stuck in
/// the scheduled state.
pub trait Scheduler: Send + Sync {
    /// Queue `task` to run later.
    fn schedule(&self, task: Task);
}

/// The default scheduler: the calling thread's micro-task queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct Microtasks;

impl Scheduler for Microtasks {
    fn schedule(&self, task: Task) {
        queue::enqueue(task);
    }
}

/// Run every deferred task queued on this thread, then one reclamation pass.
///
/// Shorthand for [`queue::drain`].
pub fn drain() -> usize {
    queue::drain()
}
