//! Reclamation Registry
//!
//! Rust has no tracing collector to tell us when an observer became
//! unreachable, but a `Weak` can always answer whether its target is gone.
//! This registry turns that into a finalization hook: each record pairs a
//! weak target with a one-shot hook, and [`collect`] fires the hook of every
//! record whose target has no strong references left.
//!
//! # Timing
//!
//! Hooks run at an unspecified point after the target is dropped: at the end
//! of every micro-task drain, or whenever a host calls [`collect`] itself.
//! Callers must not assume any ordering relative to delivery cycles.
//!
//! # Cost
//!
//! [`collect`] checks every record in the registry, so each pass is linear
//! in the number of live subscriptions across the whole process. Records
//! leave the registry when their hook runs or when they are detached; a
//! beacon detaches the hooks of its remaining entries when it is dropped, so
//! only subscriptions that can still fire are ever scanned.
//!
//! # Thread Safety
//!
//! The registry is process-wide and guarded by a single lock. Hooks are
//! always run after that lock is released, so a hook may register or detach
//! other records.
//!
//! Collection passes are serialized by a separate reentrant lock: when
//! [`collect`] returns, every hook whose target was already gone when it was
//! called has finished running, whichever thread picked it up.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{OnceLock, Weak};

use parking_lot::{const_reentrant_mutex, Mutex, ReentrantMutex};

/// Identifies one registered reclamation hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

impl HookId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A hook waiting for its target to be dropped.
struct Record {
    target: Weak<dyn Any + Send + Sync>,
    hook: Box<dyn FnOnce() + Send>,
}

// Global registry of pending hooks.
static REGISTRY: OnceLock<Mutex<HashMap<HookId, Record>>> = OnceLock::new();

// Held for the whole of a collection pass, hooks included.
static COLLECTING: ReentrantMutex<()> = const_reentrant_mutex(());

fn get_registry() -> &'static Mutex<HashMap<HookId, Record>> {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Register `hook` to run once after `target` has been dropped.
///
/// The registry only holds a weak reference, so registering never extends
/// the target's lifetime.
pub fn register<F>(target: Weak<dyn Any + Send + Sync>, hook: F) -> HookId
where
    F: FnOnce() + Send + 'static,
{
    let id = HookId::next();
    get_registry().lock().insert(
        id,
        Record {
            target,
            hook: Box::new(hook),
        },
    );
    id
}

/// Remove a hook without running it.
///
/// Returns false if the hook already ran or was already detached.
pub fn detach(id: HookId) -> bool {
    get_registry().lock().remove(&id).is_some()
}

/// Run the hook of every record whose target is gone.
///
/// Each hook runs at most once; its record is removed before it runs.
/// Returns the number of hooks that ran.
pub fn collect() -> usize {
    let _pass = COLLECTING.lock();

    let due: Vec<Box<dyn FnOnce() + Send>> = {
        let mut registry = get_registry().lock();
        let dead: Vec<HookId> = registry
            .iter()
            .filter(|(_, record)| record.target.strong_count() == 0)
            .map(|(id, _)| *id)
            .collect();

        dead.into_iter()
            .filter_map(|id| registry.remove(&id))
            .map(|record| record.hook)
            .collect()
    };

    // Release the registry lock before running hooks
    let count = due.len();
    for hook in due {
        hook();
    }
    count
}

/// Number of hooks still waiting in the registry.
pub fn pending() -> usize {
    get_registry().lock().len()
}
