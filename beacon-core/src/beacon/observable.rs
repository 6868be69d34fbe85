//! Observable Implementation
//!
//! An Observable holds one value and a [`Beacon`]. Writing a value that
//! differs from the current one stores it and requests a notification;
//! writing an equal value does nothing at all.
//!
//! # How Observables Work
//!
//! 1. `set` compares the candidate with the stored value using the value
//!    type's own `PartialEq`.
//!
//! 2. If they are equal, the stored value is kept (the candidate is
//!    dropped) and no notification is requested.
//!
//! 3. Otherwise the candidate replaces the stored value and the beacon is
//!    asked for a deferred notification. Several writes in one synchronous
//!    span produce one cycle, in which observers read the final value.
//!
//! Subscription and notification go through [`Broadcaster`], forwarded to
//! the embedded beacon.
//!
//! # Thread Safety
//!
//! The value is protected by a RwLock. It is released before the
//! notification is requested.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::host::Broadcaster;
use super::subject::Beacon;

/// A value container that notifies observers when the value changes.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use beacon_core::{runtime, Broadcaster, Observable};
///
/// struct Label;
///
/// let title = Observable::new(String::from("draft"));
/// let label = Arc::new(Label);
///
/// let reader = title.clone();
/// title.subscribe(&label, move |_: &Label| {
///     assert_eq!(reader.get(), "final");
/// });
///
/// title.set(String::from("edited"));
/// title.set(String::from("final"));
/// runtime::drain();
/// ```
pub struct Observable<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    /// The current value, protected by RwLock for thread safety.
    value: Arc<RwLock<T>>,

    /// Registry of observers.
    beacon: Beacon,
}

impl<T> Observable<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    /// Create a new observable with the given initial value.
    pub fn new(value: T) -> Self {
        Self::with_beacon(value, Beacon::new())
    }

    /// Create a new observable that notifies through `beacon`.
    ///
    /// Use this to pick a scheduler via [`Beacon::with_scheduler`].
    pub fn with_beacon(value: T, beacon: Beacon) -> Self {
        Self {
            value: Arc::new(RwLock::new(value)),
            beacon,
        }
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.value.read().clone()
    }

    /// Access the current value by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.value.read())
    }

    /// Store `value` if it differs from the current one, then request a
    /// notification.
    ///
    /// Returns true if the value changed. An equal candidate is dropped and
    /// the stored instance stays in place.
    pub fn set(&self, value: T) -> bool {
        {
            let mut guard = self.value.write();
            if *guard == value {
                return false;
            }
            *guard = value;
        }

        self.beacon.request_notification();
        true
    }

    /// Update the value using a function of the current one.
    ///
    /// The result goes through [`set`](Self::set), so an unchanged result
    /// requests nothing.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let candidate = {
            let guard = self.value.read();
            f(&*guard)
        };
        self.set(candidate)
    }
}

impl<T> Broadcaster for Observable<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    fn beacon(&self) -> &Beacon {
        &self.beacon
    }
}

impl<T> Clone for Observable<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            beacon: self.beacon.clone(),
        }
    }
}

impl<T> Default for Observable<T>
where
    T: Default + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Debug for Observable<T>
where
    T: Debug + PartialEq + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*self.value.read())
            .field("beacon", &self.beacon)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
