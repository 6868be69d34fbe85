//! Failure Reporting
//!
//! Callback failures caught during delivery are forwarded to a single
//! process-wide sink. The host installs its own [`Reporter`] once, at
//! startup, with [`install`]; until then (or if it never does) failures go
//! to [`TracingReporter`], which logs them through `tracing`.
//!
//! # Lifecycle
//!
//! The reporter is installed at most once and is never replaced for the
//! rest of the process. Tests substitute a capturing reporter the same way a
//! host would install its real one.
//!
//! Reporting is fire-and-forget: the core does not look at what the
//! reporter does with the failure. A reporter that panics is not contained.

use std::sync::OnceLock;

use crate::beacon::{BeaconId, SubscriberId};
use crate::error::{BeaconError, CallbackError, Result};

/// Where a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReportContext {
    /// The beacon that was delivering.
    pub beacon: BeaconId,
    /// The subscription whose callback failed.
    pub subscriber: SubscriberId,
}

/// A sink for callback failures.
pub trait Reporter: Send + Sync {
    /// Receive one failure.
    fn report(&self, error: &CallbackError, context: &ReportContext);
}

impl<F> Reporter for F
where
    F: Fn(&CallbackError, &ReportContext) + Send + Sync,
{
    fn report(&self, error: &CallbackError, context: &ReportContext) {
        self(error, context)
    }
}

/// Default reporter: logs each failure at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, error: &CallbackError, context: &ReportContext) {
        tracing::error!(
            beacon = %context.beacon,
            subscriber = %context.subscriber,
            panicked = error.is_panic(),
            "{error}"
        );
    }
}

static REPORTER: OnceLock<Box<dyn Reporter>> = OnceLock::new();

/// Install the process-wide reporter.
///
/// Fails with [`BeaconError::ReporterInstalled`] if one is already in place;
/// the existing reporter is kept.
pub fn install<R>(reporter: R) -> Result<()>
where
    R: Reporter + 'static,
{
    REPORTER
        .set(Box::new(reporter))
        .map_err(|_| BeaconError::ReporterInstalled)
}

/// True once a reporter has been installed.
pub fn is_installed() -> bool {
    REPORTER.get().is_some()
}

/// Forward a failure to the installed reporter, or to [`TracingReporter`].
pub fn report(error: &CallbackError, context: &ReportContext) {
    match REPORTER.get() {
        Some(reporter) => reporter.report(error, context),
        None => TracingReporter.report(error, context),
    }
}
