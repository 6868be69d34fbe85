//! Beacon Implementation
//!
//! A Beacon is the registry at the heart of the crate: it remembers who is
//! listening and tells them when its host changed.
//!
//! # How Beacons Work
//!
//! 1. `subscribe` stores a weak reference to the observer, its callback,
//!    and a fresh id, and registers a reclamation hook for the observer.
//!
//! 2. `request_notification` schedules one deferred delivery cycle. Further
//!    requests made before that cycle runs are absorbed by it.
//!
//! 3. A delivery cycle prunes entries whose observer is gone, snapshots the
//!    rest, and invokes each callback in subscription order. A failing
//!    callback is reported and delivery moves on to the next one.
//!
//! Entries leave the registry through whichever of these happens first:
//! an explicit unsubscribe, the prune at the start of a cycle, or the
//! reclamation hook firing after the observer was dropped. The other two
//! paths then find nothing to do.
//!
//! # Thread Safety
//!
//! All state of one beacon sits behind a single mutex. The lock is released
//! before any callback runs, so callbacks may subscribe, unsubscribe or
//! request notifications on the beacon that is calling them.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::subscriber::{self, address_of, Callback, Entry, Subscriber, SubscriberId};
use crate::error::{BoxError, CallbackError};
use crate::report::{self, ReportContext};
use crate::runtime::{finalizer, HookId, Microtasks, Scheduler};

/// Unique identifier of a beacon, derived from its shared state's address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BeaconId(usize);

impl BeaconId {
    /// Build an id from a raw value.
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for BeaconId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Mutable state of a beacon.
struct State {
    /// Entries in subscription order, indexed by id.
    entries: IndexMap<SubscriberId, Arc<dyn Entry>>,

    /// Next id to hand out.
    next_id: u64,

    /// True while a deferred delivery cycle is outstanding.
    pending: bool,
}

struct Inner {
    state: Mutex<State>,
    scheduler: Arc<dyn Scheduler>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Observers may outlive the beacon; their hooks have nothing left to
        // clean up.
        for entry in self.state.get_mut().entries.values() {
            detach(entry.hook());
        }
    }
}

/// A subscriber registry with coalesced, deferred delivery.
///
/// Cloning a `Beacon` creates a new handle to the same registry.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use beacon_core::{runtime, Beacon};
///
/// struct View { renders: AtomicUsize }
///
/// let beacon = Beacon::new();
/// let view = Arc::new(View { renders: AtomicUsize::new(0) });
///
/// beacon.subscribe(&view, |view: &View| {
///     view.renders.fetch_add(1, Ordering::SeqCst);
/// });
///
/// beacon.request_notification();
/// beacon.request_notification();
/// runtime::drain();
///
/// assert_eq!(view.renders.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct Beacon {
    inner: Arc<Inner>,
}

impl Beacon {
    /// Create an empty beacon that defers onto the micro-task queue.
    pub fn new() -> Self {
        Self::with_scheduler(Arc::new(Microtasks))
    }

    /// Create an empty beacon that defers through `scheduler`.
    pub fn with_scheduler(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    entries: IndexMap::new(),
                    next_id: 0,
                    pending: false,
                }),
                scheduler,
            }),
        }
    }

    /// Get the beacon's unique ID.
    pub fn id(&self) -> BeaconId {
        BeaconId(Arc::as_ptr(&self.inner) as usize)
    }

    /// Subscribe `observer` with an infallible callback.
    ///
    /// The beacon keeps only a weak reference to `observer`. Subscribing the
    /// same observer twice creates two independent entries.
    pub fn subscribe<O, F>(&self, observer: &Arc<O>, callback: F) -> SubscriberId
    where
        O: Send + Sync + 'static,
        F: Fn(&O) + Send + Sync + 'static,
    {
        self.insert(observer, subscriber::infallible(callback))
    }

    /// Subscribe `observer` with a callback whose errors are reported as
    /// callback failures.
    pub fn subscribe_fallible<O, F, E>(&self, observer: &Arc<O>, callback: F) -> SubscriberId
    where
        O: Send + Sync + 'static,
        F: Fn(&O) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.insert(observer, subscriber::fallible(callback))
    }

    /// Subscribe `observer` and return a guard that removes this entry when
    /// dropped.
    ///
    /// The guard does not keep the beacon alive.
    pub fn subscribe_guarded<O, F>(&self, observer: &Arc<O>, callback: F) -> SubscriptionGuard
    where
        O: Send + Sync + 'static,
        F: Fn(&O) + Send + Sync + 'static,
    {
        let id = self.subscribe(observer, callback);
        SubscriptionGuard {
            beacon: Arc::downgrade(&self.inner),
            id,
        }
    }

    fn insert<O>(&self, observer: &Arc<O>, callback: Callback<O>) -> SubscriberId
    where
        O: Send + Sync + 'static,
    {
        let id = {
            let mut state = self.inner.state.lock();
            let id = SubscriberId::from(state.next_id);
            state.next_id += 1;
            id
        };

        // The hook only holds the beacon weakly.
        let beacon = Arc::downgrade(&self.inner);
        let target = Arc::downgrade(observer) as Weak<dyn Any + Send + Sync>;
        let hook = finalizer::register(target, move || {
            if let Some(inner) = beacon.upgrade() {
                Beacon { inner }.on_reclaimed(id);
            }
        });

        let entry: Arc<dyn Entry> = Arc::new(Subscriber::new(id, observer, callback).with_hook(hook));
        self.inner.state.lock().entries.insert(id, entry);

        tracing::trace!(beacon = %self.id(), subscriber = %id, "subscribed");
        id
    }

    /// Remove the first entry, in subscription order, whose observer is
    /// `observer`.
    ///
    /// Later entries for the same observer stay. Returns false if nothing
    /// matched.
    pub fn unsubscribe<O>(&self, observer: &Arc<O>) -> bool {
        let addr = address_of(observer);
        let removed = {
            let mut state = self.inner.state.lock();
            let index = state.entries.values().position(|entry| entry.observes(addr));
            index.and_then(|index| state.entries.shift_remove_index(index))
        };

        match removed {
            Some((id, entry)) => {
                detach(entry.hook());
                tracing::trace!(beacon = %self.id(), subscriber = %id, "unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Remove the entry with the given id. Returns false if it is already
    /// gone.
    pub fn unsubscribe_id(&self, id: SubscriberId) -> bool {
        let removed = self.inner.state.lock().entries.shift_remove(&id);
        match removed {
            Some(entry) => {
                detach(entry.hook());
                tracing::trace!(beacon = %self.id(), subscriber = %id, "unsubscribed");
                true
            }
            None => false,
        }
    }

    /// True if some live entry observes `observer`.
    pub fn is_subscribed<O>(&self, observer: &Arc<O>) -> bool {
        let addr = address_of(observer);
        self.inner
            .state
            .lock()
            .entries
            .values()
            .any(|entry| entry.observes(addr))
    }

    /// Number of entries, including ones whose observer is gone but which
    /// have not been pruned yet.
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    /// True while a deferred delivery cycle is outstanding.
    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().pending
    }

    /// Schedule a deferred delivery cycle, unless one is already pending.
    ///
    /// Any number of requests made before the cycle runs result in exactly
    /// one cycle. A scheduled cycle cannot be cancelled. If the scheduler
    /// drops the task without running it, the request is forgotten and the
    /// next one schedules a new cycle.
    pub fn request_notification(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.pending {
                tracing::debug!(beacon = %self.id(), "notification already pending");
                return;
            }
            state.pending = true;
        }

        tracing::trace!(beacon = %self.id(), "notification scheduled");
        let cycle = ScheduledCycle {
            beacon: Some(self.clone()),
        };
        self.inner.scheduler.schedule(Box::new(move || cycle.run()));
    }

    /// Deliver to every live subscriber right now.
    ///
    /// This path neither checks nor clears the pending flag: if a deferred
    /// cycle is already scheduled, it still runs afterwards and subscribers
    /// are called twice.
    pub fn notify_now(&self) {
        self.deliver();
    }

    /// Body of a scheduled cycle.
    fn execute_notification(&self) {
        self.inner.state.lock().pending = false;
        self.deliver();
    }

    /// Prune dead entries, snapshot the rest, and invoke them in order.
    fn deliver(&self) {
        // Removed entries are dropped after the lock is released; dropping a
        // callback may run code that touches this beacon.
        let (snapshot, swept) = {
            let mut state = self.inner.state.lock();
            let dead: SmallVec<[SubscriberId; 4]> = state
                .entries
                .values()
                .filter(|entry| !entry.is_alive())
                .map(|entry| entry.id())
                .collect();
            let swept: SmallVec<[Arc<dyn Entry>; 4]> = dead
                .iter()
                .filter_map(|id| state.entries.shift_remove(id))
                .collect();
            let snapshot: SmallVec<[Arc<dyn Entry>; 8]> = state.entries.values().cloned().collect();
            (snapshot, swept)
        };

        if !swept.is_empty() {
            tracing::debug!(beacon = %self.id(), swept = swept.len(), "pruned dead subscribers");
            for entry in swept {
                detach(entry.hook());
            }
        }

        tracing::trace!(beacon = %self.id(), subscribers = snapshot.len(), "delivering");
        for entry in snapshot {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| entry.try_invoke())) {
                Ok(result) => result,
                Err(payload) => Err(CallbackError::from_panic(payload)),
            };

            if let Err(error) = outcome {
                let context = ReportContext {
                    beacon: self.id(),
                    subscriber: entry.id(),
                };
                report::report(&error, &context);
            }
        }
    }

    /// Drop the entry of an observer that has been reclaimed.
    fn on_reclaimed(&self, id: SubscriberId) {
        let removed = self.inner.state.lock().entries.shift_remove(&id);
        if removed.is_some() {
            tracing::debug!(beacon = %self.id(), subscriber = %id, "reclaimed subscriber");
        }
    }
}

/// A delivery cycle handed to the scheduler.
///
/// If the task is dropped without running (its queue went away with its
/// thread, or a custom scheduler discarded it), the pending flag is released
/// so later requests schedule a fresh cycle.
struct ScheduledCycle {
    beacon: Option<Beacon>,
}

impl ScheduledCycle {
    fn run(mut self) {
        if let Some(beacon) = self.beacon.take() {
            beacon.execute_notification();
        }
    }
}

impl Drop for ScheduledCycle {
    fn drop(&mut self) {
        if let Some(beacon) = self.beacon.take() {
            beacon.inner.state.lock().pending = false;
            tracing::debug!(beacon = %beacon.id(), "scheduled notification dropped before it ran");
        }
    }
}

fn detach(hook: Option<HookId>) {
    if let Some(hook) = hook {
        finalizer::detach(hook);
    }
}

impl Default for Beacon {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Beacon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Beacon")
            .field("id", &self.id())
            .field("subscriber_count", &state.entries.len())
            .field("pending", &state.pending)
            .finish()
    }
}

/// Removes one subscription when dropped.
///
/// Returned by [`Beacon::subscribe_guarded`]. Holding the guard inside the
/// observer ties the subscription to the observer's own destruction.
#[must_use = "dropping the guard unsubscribes immediately"]
pub struct SubscriptionGuard {
    beacon: Weak<Inner>,
    id: SubscriberId,
}

impl SubscriptionGuard {
    /// Id of the guarded subscription.
    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.beacon.upgrade() {
            Beacon { inner }.unsubscribe_id(self.id);
        }
    }
}

impl std::fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionGuard").field("id", &self.id).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
