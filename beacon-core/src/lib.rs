//! Beacon Core
//!
//! This crate provides a safe observer-notification engine. It implements:
//!
//! - A subscriber registry that holds observers weakly
//! - Coalesced, deferred delivery on a cooperative micro-task queue
//! - Per-observer failure isolation with a process-wide reporting channel
//! - An observable value cell built on top of the registry
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `beacon`: the registry, the host trait and the observable cell
//! - `runtime`: the micro-task queue, scheduler seam and reclamation registry
//! - `report`: the failure-reporting channel
//! - `error`: error types
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use beacon_core::{runtime, Broadcaster, Observable};
//!
//! struct Widget {
//!     renders: AtomicUsize,
//! }
//!
//! let count = Observable::new(0);
//! let widget = Arc::new(Widget { renders: AtomicUsize::new(0) });
//!
//! // The callback gets the widget as a parameter; it does not capture it.
//! count.subscribe(&widget, |w: &Widget| {
//!     w.renders.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! count.set(1);
//! count.set(2);
//! runtime::drain();
//! assert_eq!(widget.renders.load(Ordering::SeqCst), 1);
//!
//! // Dropping the widget is enough to end its subscription.
//! drop(widget);
//! runtime::drain();
//! assert_eq!(count.subscriber_count(), 0);
//! ```

pub mod beacon;
pub mod error;
pub mod report;
pub mod runtime;

pub use beacon::{Beacon, BeaconId, Broadcaster, Observable, SubscriberId, SubscriptionGuard};
pub use error::{BeaconError, BoxError, CallbackError, Result};
pub use report::{ReportContext, Reporter, TracingReporter};
