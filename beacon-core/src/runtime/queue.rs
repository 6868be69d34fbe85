//! Micro-task Queue
//!
//! A cooperative, per-thread FIFO of deferred tasks. Nothing enqueued here
//! runs until the host calls [`drain`], which marks the end of the current
//! synchronous span.
//!
//! # Draining
//!
//! [`drain`] keeps popping tasks until the queue is empty, so tasks that
//! enqueue more tasks are picked up by the same drain. After the queue is
//! empty, one reclamation pass runs (see [`super::finalizer::collect`]), the
//! way a collector gets a chance to run between event-loop turns.
//!
//! A `drain` issued from inside a running task returns immediately; the
//! outer drain is already going to run whatever was queued.
//!
//! # Implementation
//!
//! The queue lives in thread-local storage. Each thread that schedules work
//! drains its own queue, which keeps the common single-threaded case free of
//! locking. Tasks still queued when their thread exits are dropped without
//! running.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use super::finalizer;
use super::Task;

thread_local! {
    static QUEUE: RefCell<VecDeque<Task>> = RefCell::new(VecDeque::new());
    static DRAINING: Cell<bool> = const { Cell::new(false) };
}

/// Append a task to the current thread's queue.
///
/// The task never runs synchronously inside this call.
pub fn enqueue(task: Task) {
    QUEUE.with(|queue| queue.borrow_mut().push_back(task));
}

/// Run every queued task, including tasks queued while draining, then run
/// one reclamation pass.
///
/// Returns the number of tasks that ran. Returns 0 without doing anything
/// when called re-entrantly from inside a task.
pub fn drain() -> usize {
    if DRAINING.with(|draining| draining.replace(true)) {
        return 0;
    }
    let _reset = DrainGuard;

    let mut ran = 0;
    // The borrow must end before the task runs; tasks enqueue more work.
    while let Some(task) = QUEUE.with(|queue| queue.borrow_mut().pop_front()) {
        task();
        ran += 1;
    }

    let reclaimed = finalizer::collect();
    if ran > 0 || reclaimed > 0 {
        tracing::trace!(ran, reclaimed, "micro-task queue drained");
    }
    ran
}

/// Number of tasks waiting on the current thread's queue.
pub fn len() -> usize {
    QUEUE.with(|queue| queue.borrow().len())
}

/// True when nothing is waiting on the current thread's queue.
pub fn is_empty() -> bool {
    len() == 0
}

/// Clears the draining flag even if a task panics out of `drain`.
struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        DRAINING.with(|draining| draining.set(false));
    }
}
