use core::fmt;
use std::sync::Arc;

use crate::common::KeyValue;
use crate::family::ShardedFamily;
use crate::instruments::{AsyncInstrument, SyncInstrument};

/// An instrument that records increasing values.
#[derive(Clone)]
pub struct Counter(pub(crate) Arc<dyn SyncInstrument>);

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Counter")
    }
}

impl Counter {
    /// Create a new counter from a backend implementation.
    #[doc(hidden)]
    pub fn new(inner: Arc<dyn SyncInstrument>) -> Self {
        Counter(inner)
    }

    /// Records an increment to the counter.
    ///
    /// Negative amounts are discarded with a warning; a counter only goes
    /// up.
    pub fn add(&self, value: f64, attributes: &[KeyValue]) {
        self.0.measure(value, attributes)
    }
}

pub(crate) struct BackendCounter {
    family: Arc<ShardedFamily<prometheus::Counter>>,
}

impl BackendCounter {
    pub(crate) fn new(family: Arc<ShardedFamily<prometheus::Counter>>) -> Self {
        BackendCounter { family }
    }
}

impl SyncInstrument for BackendCounter {
    fn measure(&self, value: f64, attributes: &[KeyValue]) {
        if value < 0.0 {
            tracing::warn!(
                name: "CounterAddNegative",
                metric = self.family.name(),
                value,
                "counter add amount must be non-negative, dropping measurement"
            );
            return;
        }
        match self.family.child(attributes) {
            Ok(child) => child.inc_by(value),
            Err(err) => tracing::warn!(
                name: "CounterChildFailed",
                metric = self.family.name(),
                error = %err,
                "failed to resolve counter child, dropping measurement"
            ),
        }
    }
}

/// An async instrument that records increasing values via callback.
///
/// This backend cannot drive observation callbacks at collection time, so
/// creating one always fails; the type exists so callers can hold the
/// builder API without conditional compilation.
#[derive(Clone)]
pub struct ObservableCounter(Arc<dyn AsyncInstrument>);

impl fmt::Debug for ObservableCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ObservableCounter")
    }
}

impl ObservableCounter {
    /// Create a new observable counter from a backend implementation.
    #[doc(hidden)]
    pub fn new(inner: Arc<dyn AsyncInstrument>) -> Self {
        ObservableCounter(inner)
    }

    /// Records an increment to the counter.
    pub fn observe(&self, value: f64, attributes: &[KeyValue]) {
        self.0.observe(value, attributes)
    }
}
