//! Error types.
//!
//! Two kinds of failure exist in this crate:
//!
//! - [`CallbackError`]: an observer callback failed during a delivery cycle.
//!   These never surface to the code that requested the notification; they
//!   are contained per subscriber and forwarded to the reporting channel
//!   (see [`crate::report`]).
//! - [`BeaconError`]: misuse of the process-wide setup API.
//!
//! Dead observers, duplicate subscriptions and redundant notification
//! requests are not errors and have no variant here.

use std::any::Any;
use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error type accepted from fallible observer callbacks.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result alias for setup operations.
pub type Result<T, E = BeaconError> = std::result::Result<T, E>;

/// Failure of a single observer callback during delivery.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// A fallible callback returned an error.
    #[error("observer callback failed: {0}")]
    Failed(#[source] BoxError),

    /// A callback panicked. The payload is rendered to a message when it is
    /// a string, otherwise a placeholder is used.
    #[error("observer callback panicked: {0}")]
    Panicked(String),
}

impl CallbackError {
    /// Wrap any error returned by a fallible callback.
    pub fn failed<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Failed(error.into())
    }

    /// Convert a panic payload caught by `catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "<non-string panic payload>".to_string()
        };
        Self::Panicked(message)
    }

    /// True if the callback panicked rather than returning an error.
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}

/// Errors from the process-wide setup API.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BeaconError {
    /// A failure reporter was already installed for this process.
    #[error("a failure reporter is already installed")]
    ReporterInstalled,
}
