use core::fmt;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::exposition::Sample;
use crate::instruments::histogram::DEFAULT_HISTOGRAM_BOUNDARIES;
use crate::meter::{BackendMeter, Meter, NoopMeter};
use crate::registry::SharedRegistry;
use crate::scope::InstrumentationScope;

/// Entry point of the metrics API, handing out [`Meter`]s backed by one
/// shared backend registry.
///
/// Cheap to clone; clones share the same meters and registry. There is one
/// live meter per [`InstrumentationScope`], created on first request.
#[derive(Clone)]
pub struct MeterProvider {
    inner: Arc<MeterProviderInner>,
}

struct MeterProviderInner {
    meters: Mutex<HashMap<InstrumentationScope, Arc<BackendMeter>>>,
    shared: Arc<SharedRegistry>,
}

impl Default for MeterProvider {
    fn default() -> Self {
        MeterProvider::builder().build()
    }
}

impl MeterProvider {
    /// Returns a builder for configuring a new provider.
    pub fn builder() -> MeterProviderBuilder {
        MeterProviderBuilder::default()
    }

    /// Returns a meter identified by `name` alone.
    ///
    /// An empty name yields a no-op meter along with a warning. Use
    /// [`meter_with_scope`](MeterProvider::meter_with_scope) when version
    /// or schema URL should be part of the meter's identity.
    pub fn meter(&self, name: impl Into<Cow<'static, str>>) -> Meter {
        self.meter_with_scope(InstrumentationScope::builder(name).build())
    }

    /// Returns the meter for `scope`, creating it on first request.
    pub fn meter_with_scope(&self, scope: InstrumentationScope) -> Meter {
        if scope.name().is_empty() {
            tracing::warn!(
                name: "MeterNameEmpty",
                "meter name must not be empty, returning a no-op meter"
            );
            return Meter::new(Arc::new(NoopMeter::new()));
        }
        match self.inner.meters.lock() {
            Ok(mut meters) => {
                if let Some(meter) = meters.get(&scope) {
                    tracing::debug!(
                        name: "MeterProvider.ExistingMeterReturned",
                        meter = scope.name(),
                    );
                    Meter::new(meter.clone())
                } else {
                    let meter =
                        Arc::new(BackendMeter::new(scope.clone(), self.inner.shared.clone()));
                    meters.insert(scope.clone(), meter.clone());
                    tracing::debug!(
                        name: "MeterProvider.NewMeterCreated",
                        meter = scope.name(),
                    );
                    Meter::new(meter)
                }
            }
            Err(err) => {
                tracing::error!(
                    name: "MeterProvider.LockPoisoned",
                    meter = scope.name(),
                    error = %err,
                    "meter map lock poisoned, returning a no-op meter"
                );
                Meter::new(Arc::new(NoopMeter::new()))
            }
        }
    }

    /// The backend registry instruments register with. Gathering from it
    /// yields the grouped family view; see
    /// [`samples`](MeterProvider::samples) for the flat one.
    pub fn registry(&self) -> &prometheus::Registry {
        self.inner.shared.registry()
    }

    /// The flat sample sequence merged across every instrument created
    /// through this provider, family by family in creation order.
    ///
    /// Each call snapshots the current state; the iterator does not
    /// observe instruments or measurements added after the call.
    pub fn samples(&self) -> impl Iterator<Item = Sample> + Send {
        self.inner.shared.samples()
    }
}

impl fmt::Debug for MeterProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MeterProvider")
    }
}

/// Configuration for a [`MeterProvider`].
#[derive(Debug, Default)]
pub struct MeterProviderBuilder {
    registry: Option<prometheus::Registry>,
    histogram_boundaries: Option<Vec<f64>>,
}

impl MeterProviderBuilder {
    /// Uses the given backend registry instead of a fresh one, e.g. to
    /// expose these instruments next to metrics registered elsewhere.
    pub fn with_registry(mut self, registry: prometheus::Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the bucket boundaries every histogram is created with.
    ///
    /// Defaults to
    /// `[0, 5, 10, 25, 50, 75, 100, 250, 500, 750, 1000, 2500, 5000, 7500, 10000]`.
    pub fn with_default_histogram_boundaries(mut self, boundaries: Vec<f64>) -> Self {
        self.histogram_boundaries = Some(boundaries);
        self
    }

    /// Creates the configured provider.
    pub fn build(self) -> MeterProvider {
        let shared = Arc::new(SharedRegistry::new(
            self.registry.unwrap_or_default(),
            self.histogram_boundaries
                .unwrap_or_else(|| DEFAULT_HISTOGRAM_BOUNDARIES.to_vec()),
        ));
        MeterProvider {
            inner: Arc::new(MeterProviderInner {
                meters: Mutex::new(HashMap::new()),
                shared,
            }),
        }
    }
}
