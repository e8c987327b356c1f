use std::result;
use std::sync::PoisonError;

use thiserror::Error;

/// A specialized `Result` type for metric operations.
pub type Result<T> = result::Result<T, MetricError>;

/// Errors returned by the metrics API.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MetricError {
    /// Other errors not covered by specific cases.
    #[error("metrics error: {0}")]
    Other(String),

    /// Asynchronous (observable) instrument kinds are not supported.
    ///
    /// The backend's pull model collects whatever has been recorded at
    /// scrape time; it provides no hook to invoke observation callbacks
    /// during collection.
    #[error("asynchronous instruments are not supported: {0}")]
    AsyncNotSupported(&'static str),

    /// Two instruments with different raw names sanitize to the same
    /// backend series name.
    #[error("metric name conflict: `{0}` is already registered with the backend")]
    NameConflict(String),

    /// The backend metrics library rejected an operation.
    #[error(transparent)]
    Backend(#[from] prometheus::Error),
}

impl<T> From<PoisonError<T>> for MetricError {
    fn from(err: PoisonError<T>) -> Self {
        MetricError::Other(err.to_string())
    }
}
