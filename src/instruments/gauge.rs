use core::fmt;
use std::sync::Arc;

use crate::common::KeyValue;
use crate::family::ShardedFamily;
use crate::instruments::{AsyncInstrument, SyncInstrument};

/// An instrument that records the latest value set.
#[derive(Clone)]
pub struct Gauge(pub(crate) Arc<dyn SyncInstrument>);

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Gauge")
    }
}

impl Gauge {
    /// Create a new gauge from a backend implementation.
    #[doc(hidden)]
    pub fn new(inner: Arc<dyn SyncInstrument>) -> Self {
        Gauge(inner)
    }

    /// Records the current value, replacing whatever was there before.
    pub fn set(&self, value: f64, attributes: &[KeyValue]) {
        self.0.measure(value, attributes)
    }
}

pub(crate) struct BackendGauge {
    family: Arc<ShardedFamily<prometheus::Gauge>>,
}

impl BackendGauge {
    pub(crate) fn new(family: Arc<ShardedFamily<prometheus::Gauge>>) -> Self {
        BackendGauge { family }
    }
}

impl SyncInstrument for BackendGauge {
    fn measure(&self, value: f64, attributes: &[KeyValue]) {
        match self.family.child(attributes) {
            Ok(child) => child.set(value),
            Err(err) => tracing::warn!(
                name: "GaugeChildFailed",
                metric = self.family.name(),
                error = %err,
                "failed to resolve gauge child, dropping measurement"
            ),
        }
    }
}

/// An async instrument that records the current value via callback.
/// Creating one always fails with this backend.
#[derive(Clone)]
pub struct ObservableGauge(Arc<dyn AsyncInstrument>);

impl fmt::Debug for ObservableGauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ObservableGauge")
    }
}

impl ObservableGauge {
    /// Create a new observable gauge from a backend implementation.
    #[doc(hidden)]
    pub fn new(inner: Arc<dyn AsyncInstrument>) -> Self {
        ObservableGauge(inner)
    }

    /// Records the current value.
    pub fn observe(&self, value: f64, attributes: &[KeyValue]) {
        self.0.observe(value, attributes)
    }
}
