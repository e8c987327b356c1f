use core::fmt;
use std::sync::Arc;

use crate::common::KeyValue;
use crate::family::ShardedFamily;
use crate::instruments::SyncInstrument;

/// Bucket boundaries used when the provider is not configured with custom
/// ones.
pub(crate) const DEFAULT_HISTOGRAM_BOUNDARIES: [f64; 15] = [
    0.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 750.0, 1000.0, 2500.0, 5000.0, 7500.0,
    10000.0,
];

/// An instrument that records a distribution of values.
#[derive(Clone)]
pub struct Histogram(pub(crate) Arc<dyn SyncInstrument>);

impl fmt::Debug for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Histogram")
    }
}

impl Histogram {
    /// Create a new histogram from a backend implementation.
    #[doc(hidden)]
    pub fn new(inner: Arc<dyn SyncInstrument>) -> Self {
        Histogram(inner)
    }

    /// Adds a value to the distribution.
    ///
    /// Negative values are discarded with a warning.
    pub fn record(&self, value: f64, attributes: &[KeyValue]) {
        self.0.measure(value, attributes)
    }
}

pub(crate) struct BackendHistogram {
    family: Arc<ShardedFamily<prometheus::Histogram>>,
}

impl BackendHistogram {
    pub(crate) fn new(family: Arc<ShardedFamily<prometheus::Histogram>>) -> Self {
        BackendHistogram { family }
    }
}

impl SyncInstrument for BackendHistogram {
    fn measure(&self, value: f64, attributes: &[KeyValue]) {
        if value < 0.0 {
            tracing::warn!(
                name: "HistogramRecordNegative",
                metric = self.family.name(),
                value,
                "histogram amounts must be non-negative, dropping measurement"
            );
            return;
        }
        match self.family.child(attributes) {
            Ok(child) => child.observe(value),
            Err(err) => tracing::warn!(
                name: "HistogramChildFailed",
                metric = self.family.name(),
                error = %err,
                "failed to resolve histogram child, dropping measurement"
            ),
        }
    }
}
