//! Broadcast capability for host types.
//!
//! A host gains subscribe/notify methods by holding a [`Beacon`] field and
//! implementing [`Broadcaster`]; every method forwards to that beacon.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use beacon_core::{Beacon, Broadcaster};
//!
//! #[derive(Default)]
//! struct Inbox {
//!     unread: AtomicU32,
//!     beacon: Beacon,
//! }
//!
//! impl Broadcaster for Inbox {
//!     fn beacon(&self) -> &Beacon {
//!         &self.beacon
//!     }
//! }
//!
//! impl Inbox {
//!     fn deliver(&self) {
//!         self.unread.fetch_add(1, Ordering::SeqCst);
//!         self.request_notification();
//!     }
//! }
//! ```

use std::sync::Arc;

use super::subject::{Beacon, SubscriptionGuard};
use super::subscriber::SubscriberId;
use crate::error::BoxError;

/// A type that can broadcast changes to observers.
///
/// Mutators of the host must call [`request_notification`] after every
/// change observers should hear about; nothing detects changes on its own.
///
/// [`request_notification`]: Broadcaster::request_notification
pub trait Broadcaster {
    /// The beacon this host delegates to.
    fn beacon(&self) -> &Beacon;

    /// See [`Beacon::subscribe`].
    fn subscribe<O, F>(&self, observer: &Arc<O>, callback: F) -> SubscriberId
    where
        O: Send + Sync + 'static,
        F: Fn(&O) + Send + Sync + 'static,
    {
        self.beacon().subscribe(observer, callback)
    }

    /// See [`Beacon::subscribe_fallible`].
    fn subscribe_fallible<O, F, E>(&self, observer: &Arc<O>, callback: F) -> SubscriberId
    where
        O: Send + Sync + 'static,
        F: Fn(&O) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.beacon().subscribe_fallible(observer, callback)
    }

    /// See [`Beacon::subscribe_guarded`].
    fn subscribe_guarded<O, F>(&self, observer: &Arc<O>, callback: F) -> SubscriptionGuard
    where
        O: Send + Sync + 'static,
        F: Fn(&O) + Send + Sync + 'static,
    {
        self.beacon().subscribe_guarded(observer, callback)
    }

    /// See [`Beacon::unsubscribe`].
    fn unsubscribe<O>(&self, observer: &Arc<O>) -> bool {
        self.beacon().unsubscribe(observer)
    }

    /// See [`Beacon::unsubscribe_id`].
    fn unsubscribe_id(&self, id: SubscriberId) -> bool {
        self.beacon().unsubscribe_id(id)
    }

    /// See [`Beacon::is_subscribed`].
    fn is_subscribed<O>(&self, observer: &Arc<O>) -> bool {
        self.beacon().is_subscribed(observer)
    }

    /// See [`Beacon::request_notification`].
    fn request_notification(&self) {
        self.beacon().request_notification()
    }

    /// See [`Beacon::notify_now`].
    fn notify_now(&self) {
        self.beacon().notify_now()
    }

    /// See [`Beacon::is_pending`].
    fn is_pending(&self) -> bool {
        self.beacon().is_pending()
    }

    /// See [`Beacon::subscriber_count`].
    fn subscriber_count(&self) -> usize {
        self.beacon().subscriber_count()
    }
}

impl Broadcaster for Beacon {
    fn beacon(&self) -> &Beacon {
        self
    }
}
