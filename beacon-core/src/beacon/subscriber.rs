//! Subscription entries.
//!
//! A [`Subscriber`] pairs a non-owning reference to one observer with the
//! callback to run for it. It never upgrades that reference for longer than
//! a single invocation, so an entry on its own cannot keep an observer
//! alive.

use std::sync::{Arc, Weak};

use crate::error::{BoxError, CallbackError};
use crate::runtime::HookId;

/// Identifier of one subscription within a beacon.
///
/// Ids are handed out by each beacon from a counter starting at 0 and are
/// never reused by that beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for SubscriberId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Callback invoked with the resolved observer.
pub(crate) type Callback<O> = Box<dyn Fn(&O) -> Result<(), CallbackError> + Send + Sync>;

/// Adapt an infallible callback.
pub(crate) fn infallible<O, F>(callback: F) -> Callback<O>
where
    F: Fn(&O) + Send + Sync + 'static,
{
    Box::new(move |observer| {
        callback(observer);
        Ok(())
    })
}

/// Adapt a callback whose errors count as callback failures.
pub(crate) fn fallible<O, F, E>(callback: F) -> Callback<O>
where
    F: Fn(&O) -> Result<(), E> + Send + Sync + 'static,
    E: Into<BoxError>,
{
    Box::new(move |observer| callback(observer).map_err(CallbackError::failed))
}

/// A subscription to a beacon.
///
/// Holds a weak reference to the observer. The callback receives the
/// observer as a parameter on each invocation; it should not capture its
/// own strong reference to the observer, or the observer can never be
/// reclaimed.
pub(crate) struct Subscriber<O> {
    id: SubscriberId,
    observer: Weak<O>,
    callback: Callback<O>,
    hook: Option<HookId>,
}

impl<O> Subscriber<O> {
    pub(crate) fn new(id: SubscriberId, observer: &Arc<O>, callback: Callback<O>) -> Self {
        Self {
            id,
            observer: Arc::downgrade(observer),
            callback,
            hook: None,
        }
    }

    pub(crate) fn with_hook(mut self, hook: HookId) -> Self {
        self.hook = Some(hook);
        self
    }

    /// True while the observer is still alive.
    pub fn is_alive(&self) -> bool {
        self.observer.strong_count() > 0
    }

    /// Invoke the callback if the observer is still alive.
    ///
    /// Returns `Ok(false)` without doing anything when the observer is gone.
    /// Errors and panics from the callback pass straight through.
    pub fn try_invoke(&self) -> Result<bool, CallbackError> {
        match self.observer.upgrade() {
            Some(observer) => {
                (self.callback)(&observer)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl<O> std::fmt::Debug for Subscriber<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .field("hook", &self.hook)
            .finish()
    }
}

/// Type-erased view of a [`Subscriber`], so one beacon can hold observers of
/// different types.
pub(crate) trait Entry: Send + Sync {
    fn id(&self) -> SubscriberId;

    fn hook(&self) -> Option<HookId>;

    fn is_alive(&self) -> bool;

    fn try_invoke(&self) -> Result<bool, CallbackError>;

    /// True if the observer is alive and lives at `addr`.
    fn observes(&self, addr: usize) -> bool;
}

impl<O> Entry for Subscriber<O>
where
    O: Send + Sync + 'static,
{
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn hook(&self) -> Option<HookId> {
        self.hook
    }

    fn is_alive(&self) -> bool {
        Subscriber::is_alive(self)
    }

    fn try_invoke(&self) -> Result<bool, CallbackError> {
        Subscriber::try_invoke(self)
    }

    fn observes(&self, addr: usize) -> bool {
        // A live weak keeps its allocation, so the address cannot be reused.
        self.is_alive() && address_of_weak(&self.observer) == addr
    }
}

/// Identity of an observer: the address of its allocation.
pub(crate) fn address_of<O>(observer: &Arc<O>) -> usize {
    Arc::as_ptr(observer) as *const () as usize
}

fn address_of_weak<O>(observer: &Weak<O>) -> usize {
    Weak::as_ptr(observer) as *const () as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Watcher {
        hits: AtomicUsize,
    }

    fn watcher() -> Arc<Watcher> {
        Arc::new(Watcher {
            hits: AtomicUsize::new(0),
        })
    }

    #[test]
    fn try_invoke_passes_resolved_observer() {
        let observer = watcher();
        let subscriber = Subscriber::new(
            SubscriberId::from(0),
            &observer,
            infallible(|p: &Watcher| {
                p.hits.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(subscriber.is_alive());
        assert!(subscriber.try_invoke().unwrap());
        assert_eq!(observer.hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dead_observer_is_skipped() {
        let observer = watcher();
        let subscriber = Subscriber::new(
            SubscriberId::from(1),
            &observer,
            infallible(|_: &Watcher| panic!("must not run")),
        );

        drop(observer);
        assert!(!subscriber.is_alive());
        assert!(!subscriber.try_invoke().unwrap());
    }

    #[test]
    fn subscriber_does_not_keep_observer_alive() {
        let observer = watcher();
        let _subscriber = Subscriber::new(SubscriberId::from(2), &observer, infallible(|_: &Watcher| {}));

        assert_eq!(Arc::strong_count(&observer), 1);
    }

    #[test]
    fn callback_error_propagates() {
        let observer = watcher();
        let subscriber = Subscriber::new(
            SubscriberId::from(3),
            &observer,
            fallible(|_: &Watcher| Err::<(), _>("nope")),
        );

        let err = subscriber.try_invoke().unwrap_err();
        assert_eq!(err.to_string(), "observer callback failed: nope");
    }

    #[test]
    fn observes_matches_identity_only() {
        let observer = watcher();
        let other = watcher();
        let subscriber = Subscriber::new(SubscriberId::from(4), &observer, infallible(|_: &Watcher| {}));

        assert!(Entry::observes(&subscriber, address_of(&observer)));
        assert!(!Entry::observes(&subscriber, address_of(&other)));
    }
}
