use core::fmt;
use std::sync::Arc;

use crate::common::KeyValue;
use crate::family::ShardedFamily;
use crate::instruments::{AsyncInstrument, SyncInstrument};

/// An instrument that records increasing or decreasing values.
#[derive(Clone)]
pub struct UpDownCounter(pub(crate) Arc<dyn SyncInstrument>);

impl fmt::Debug for UpDownCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UpDownCounter")
    }
}

impl UpDownCounter {
    /// Create a new up-down counter from a backend implementation.
    #[doc(hidden)]
    pub fn new(inner: Arc<dyn SyncInstrument>) -> Self {
        UpDownCounter(inner)
    }

    /// Records a positive, negative or zero delta.
    pub fn add(&self, value: f64, attributes: &[KeyValue]) {
        self.0.measure(value, attributes)
    }
}

// Stored as a gauge: the backend's counter type rejects decrements.
pub(crate) struct BackendUpDownCounter {
    family: Arc<ShardedFamily<prometheus::Gauge>>,
}

impl BackendUpDownCounter {
    pub(crate) fn new(family: Arc<ShardedFamily<prometheus::Gauge>>) -> Self {
        BackendUpDownCounter { family }
    }
}

impl SyncInstrument for BackendUpDownCounter {
    fn measure(&self, value: f64, attributes: &[KeyValue]) {
        match self.family.child(attributes) {
            Ok(child) => child.add(value),
            Err(err) => tracing::warn!(
                name: "UpDownCounterChildFailed",
                metric = self.family.name(),
                error = %err,
                "failed to resolve up-down counter child, dropping measurement"
            ),
        }
    }
}

/// An async instrument that records increasing or decreasing values via
/// callback. Creating one always fails with this backend.
#[derive(Clone)]
pub struct ObservableUpDownCounter(Arc<dyn AsyncInstrument>);

impl fmt::Debug for ObservableUpDownCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ObservableUpDownCounter")
    }
}

impl ObservableUpDownCounter {
    /// Create a new observable up-down counter from a backend
    /// implementation.
    #[doc(hidden)]
    pub fn new(inner: Arc<dyn AsyncInstrument>) -> Self {
        ObservableUpDownCounter(inner)
    }

    /// Records a delta.
    pub fn observe(&self, value: f64, attributes: &[KeyValue]) {
        self.0.observe(value, attributes)
    }
}
