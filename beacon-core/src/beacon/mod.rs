//! Notification Primitives
//!
//! This module implements the beacon: a registry that lets any host type
//! broadcast "something changed" to a dynamic set of observers.
//!
//! # Concepts
//!
//! ## Beacons
//!
//! A [`Beacon`] keeps an ordered list of subscriptions. Each subscription
//! holds a weak reference to its observer, so subscribing never extends an
//! observer's lifetime. Notification requests are deferred and coalesced:
//! however many arrive within one synchronous span, observers are called
//! once, after that span ends.
//!
//! ## Hosts
//!
//! Any type gains the same API by holding a `Beacon` field and implementing
//! [`Broadcaster`]. The host is responsible for requesting a notification
//! after each change.
//!
//! ## Observables
//!
//! An [`Observable`] is the simplest host: one value, compared on write,
//! with a notification requested only when the value actually changed.
//!
//! # Implementation Notes
//!
//! Observers are `Arc`s and subscriptions keep `Weak`s. An observer that
//! goes away is cleaned up by whichever comes first: the prune at the start
//! of the next delivery cycle, or its reclamation hook (see
//! [`crate::runtime::finalizer`]). Callbacks receive the observer as a
//! parameter; a callback that captures its own `Arc` of the observer keeps
//! it alive forever.

mod host;
mod observable;
mod subject;
mod subscriber;

pub use host::Broadcaster;
pub use observable::Observable;
pub use subject::{Beacon, BeaconId, SubscriptionGuard};
pub use subscriber::SubscriberId;
