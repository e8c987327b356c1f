//! Meter front-end and the instrument registry behind it.
//!
//! A [`Meter`] hands out instruments; the backend meter behind it
//! guarantees one live instrument per identity (name, kind, unit,
//! description) and wires each new instrument into the shared registry.

use core::fmt;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::common::KeyValue;
use crate::error::{MetricError, Result};
use crate::family::{ChildMetric, FamilySpec, ShardedFamily};
use crate::instruments::counter::BackendCounter;
use crate::instruments::gauge::BackendGauge;
use crate::instruments::histogram::BackendHistogram;
use crate::instruments::up_down_counter::BackendUpDownCounter;
use crate::instruments::{
    AsyncInstrumentBuilder, Callback, Counter, Gauge, Histogram, InstrumentBuilder,
    InstrumentKind, ObservableCounter, ObservableGauge, ObservableUpDownCounter, SyncInstrument,
    UpDownCounter,
};
use crate::registry::SharedRegistry;
use crate::sanitize::sanitize_metric_name;
use crate::scope::InstrumentationScope;

pub(crate) const ASYNC_UNSUPPORTED: &str =
    "the backend collects on scrape and cannot drive observation callbacks";

/// Provides access to instruments for recording measurements.
///
/// Cheap to clone; clones share the underlying instrument registry.
#[derive(Clone)]
pub struct Meter {
    pub(crate) instrument_provider: Arc<dyn InstrumentProvider + Send + Sync>,
}

impl Meter {
    pub(crate) fn new(instrument_provider: Arc<dyn InstrumentProvider + Send + Sync>) -> Self {
        Meter {
            instrument_provider,
        }
    }

    /// Creates a builder for an instrument recording increasing values.
    pub fn create_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<Counter> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for an instrument recording changes of a value.
    pub fn create_up_down_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<UpDownCounter> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for an instrument recording the latest value.
    pub fn create_gauge(&self, name: impl Into<Cow<'static, str>>) -> InstrumentBuilder<Gauge> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for an instrument recording a distribution of
    /// values.
    pub fn create_histogram(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<Histogram> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for an instrument observing increasing values via
    /// callback. Initializing it always fails; see
    /// [`MetricError::AsyncNotSupported`].
    pub fn create_observable_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> AsyncInstrumentBuilder<'_, ObservableCounter> {
        AsyncInstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for an instrument observing changes of a value
    /// via callback. Initializing it always fails; see
    /// [`MetricError::AsyncNotSupported`].
    pub fn create_observable_up_down_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> AsyncInstrumentBuilder<'_, ObservableUpDownCounter> {
        AsyncInstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for an instrument observing the latest value via
    /// callback. Initializing it always fails; see
    /// [`MetricError::AsyncNotSupported`].
    pub fn create_observable_gauge(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> AsyncInstrumentBuilder<'_, ObservableGauge> {
        AsyncInstrumentBuilder::new(self, name.into())
    }
}

impl fmt::Debug for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Meter")
    }
}

/// The interface a [`Meter`] delegates instrument creation to.
///
/// Every method has a default that succeeds with a no-op instrument (sync
/// kinds) or fails with [`MetricError::AsyncNotSupported`] (observable
/// kinds), so an implementation only overrides what its backend supports.
pub trait InstrumentProvider {
    /// Creates an instrument for recording increasing values.
    fn create_counter(
        &self,
        _name: Cow<'static, str>,
        _unit: Option<Cow<'static, str>>,
        _description: Option<Cow<'static, str>>,
    ) -> Result<Counter> {
        Ok(Counter::new(Arc::new(NoopSyncInstrument::new())))
    }

    /// Creates an instrument for recording changes of a value.
    fn create_up_down_counter(
        &self,
        _name: Cow<'static, str>,
        _unit: Option<Cow<'static, str>>,
        _description: Option<Cow<'static, str>>,
    ) -> Result<UpDownCounter> {
        Ok(UpDownCounter::new(Arc::new(NoopSyncInstrument::new())))
    }

    /// Creates an instrument for recording the latest value.
    fn create_gauge(
        &self,
        _name: Cow<'static, str>,
        _unit: Option<Cow<'static, str>>,
        _description: Option<Cow<'static, str>>,
    ) -> Result<Gauge> {
        Ok(Gauge::new(Arc::new(NoopSyncInstrument::new())))
    }

    /// Creates an instrument for recording a distribution of values.
    fn create_histogram(
        &self,
        _name: Cow<'static, str>,
        _unit: Option<Cow<'static, str>>,
        _description: Option<Cow<'static, str>>,
    ) -> Result<Histogram> {
        Ok(Histogram::new(Arc::new(NoopSyncInstrument::new())))
    }

    /// Creates an instrument for observing increasing values via callback.
    fn create_observable_counter(
        &self,
        _name: Cow<'static, str>,
        _unit: Option<Cow<'static, str>>,
        _description: Option<Cow<'static, str>>,
        _callbacks: Vec<Callback>,
    ) -> Result<ObservableCounter> {
        Err(MetricError::AsyncNotSupported(ASYNC_UNSUPPORTED))
    }

    /// Creates an instrument for observing changes of a value via
    /// callback.
    fn create_observable_up_down_counter(
        &self,
        _name: Cow<'static, str>,
        _unit: Option<Cow<'static, str>>,
        _description: Option<Cow<'static, str>>,
        _callbacks: Vec<Callback>,
    ) -> Result<ObservableUpDownCounter> {
        Err(MetricError::AsyncNotSupported(ASYNC_UNSUPPORTED))
    }

    /// Creates an instrument for observing the latest value via callback.
    fn create_observable_gauge(
        &self,
        _name: Cow<'static, str>,
        _unit: Option<Cow<'static, str>>,
        _description: Option<Cow<'static, str>>,
        _callbacks: Vec<Callback>,
    ) -> Result<ObservableGauge> {
        Err(MetricError::AsyncNotSupported(ASYNC_UNSUPPORTED))
    }
}

impl TryFrom<InstrumentBuilder<Counter>> for Counter {
    type Error = MetricError;

    fn try_from(builder: InstrumentBuilder<Counter>) -> Result<Self> {
        builder
            .instrument_provider
            .create_counter(builder.name, builder.unit, builder.description)
    }
}

impl TryFrom<InstrumentBuilder<UpDownCounter>> for UpDownCounter {
    type Error = MetricError;

    fn try_from(builder: InstrumentBuilder<UpDownCounter>) -> Result<Self> {
        builder
            .instrument_provider
            .create_up_down_counter(builder.name, builder.unit, builder.description)
    }
}

impl TryFrom<InstrumentBuilder<Gauge>> for Gauge {
    type Error = MetricError;

    fn try_from(builder: InstrumentBuilder<Gauge>) -> Result<Self> {
        builder
            .instrument_provider
            .create_gauge(builder.name, builder.unit, builder.description)
    }
}

impl TryFrom<InstrumentBuilder<Histogram>> for Histogram {
    type Error = MetricError;

    fn try_from(builder: InstrumentBuilder<Histogram>) -> Result<Self> {
        builder
            .instrument_provider
            .create_histogram(builder.name, builder.unit, builder.description)
    }
}

impl TryFrom<AsyncInstrumentBuilder<'_, ObservableCounter>> for ObservableCounter {
    type Error = MetricError;

    fn try_from(builder: AsyncInstrumentBuilder<'_, ObservableCounter>) -> Result<Self> {
        builder.meter.instrument_provider.create_observable_counter(
            builder.name,
            builder.unit,
            builder.description,
            builder.callbacks,
        )
    }
}

impl TryFrom<AsyncInstrumentBuilder<'_, ObservableUpDownCounter>> for ObservableUpDownCounter {
    type Error = MetricError;

    fn try_from(builder: AsyncInstrumentBuilder<'_, ObservableUpDownCounter>) -> Result<Self> {
        builder
            .meter
            .instrument_provider
            .create_observable_up_down_counter(
                builder.name,
                builder.unit,
                builder.description,
                builder.callbacks,
            )
    }
}

impl TryFrom<AsyncInstrumentBuilder<'_, ObservableGauge>> for ObservableGauge {
    type Error = MetricError;

    fn try_from(builder: AsyncInstrumentBuilder<'_, ObservableGauge>) -> Result<Self> {
        builder.meter.instrument_provider.create_observable_gauge(
            builder.name,
            builder.unit,
            builder.description,
            builder.callbacks,
        )
    }
}

/// What makes an instrument unique within a meter.
///
/// Names are compared verbatim, before sanitization and case sensitive.
#[derive(Debug, PartialEq, Eq, Hash)]
struct InstrumentId {
    name: Cow<'static, str>,
    kind: InstrumentKind,
    unit: Cow<'static, str>,
    description: Cow<'static, str>,
}

impl InstrumentId {
    fn new(
        name: Cow<'static, str>,
        kind: InstrumentKind,
        unit: Option<Cow<'static, str>>,
        description: Option<Cow<'static, str>>,
    ) -> Self {
        InstrumentId {
            name,
            kind,
            unit: unit.unwrap_or_default(),
            description: description.unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
enum RegisteredInstrument {
    Counter(Counter),
    UpDownCounter(UpDownCounter),
    Gauge(Gauge),
    Histogram(Histogram),
}

/// A meter backed by the shared registry.
pub(crate) struct BackendMeter {
    scope: InstrumentationScope,
    shared: Arc<SharedRegistry>,
    instruments: Mutex<HashMap<InstrumentId, RegisteredInstrument>>,
}

impl BackendMeter {
    pub(crate) fn new(scope: InstrumentationScope, shared: Arc<SharedRegistry>) -> Self {
        BackendMeter {
            scope,
            shared,
            instruments: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the instrument registered under `id`, creating and
    /// installing it on first call.
    ///
    /// The family is built before taking the instrument lock; when a
    /// concurrent call wins the race the loser's family is dropped without
    /// ever having been installed, so the backend sees exactly one
    /// registration per identity. Reservation, backend registration and
    /// the map insert form one critical section: a creation that the
    /// backend rejects leaves no trace behind, and retries fail the same
    /// way instead of finding a half-registered instrument.
    fn get_or_create<C, T, E, R>(&self, id: InstrumentId, extract: E, register: R) -> Result<T>
    where
        C: ChildMetric,
        E: Fn(&RegisteredInstrument) -> Option<T>,
        R: FnOnce(Arc<ShardedFamily<C>>) -> (T, RegisteredInstrument),
    {
        {
            let instruments = self.instruments.lock()?;
            if let Some(existing) = instruments.get(&id).and_then(&extract) {
                drop(instruments);
                self.log_duplicate(&id);
                return Ok(existing);
            }
        }

        let name = sanitize_metric_name(&id.name);
        let help = if id.description.is_empty() {
            // the backend refuses empty help strings
            name.clone()
        } else {
            id.description.to_string()
        };
        let buckets = if id.kind == InstrumentKind::Histogram {
            self.shared.default_buckets().to_vec()
        } else {
            Vec::new()
        };
        let family = Arc::new(ShardedFamily::<C>::new(FamilySpec {
            name,
            help,
            kind: id.kind,
            buckets,
        })?);
        let (handle, registered) = register(family.clone());

        let mut instruments = self.instruments.lock()?;
        if let Some(existing) = instruments.get(&id).and_then(&extract) {
            drop(instruments);
            self.log_duplicate(&id);
            return Ok(existing);
        }
        let series = family.series_names();
        self.shared.reserve(&series)?;
        if let Err(err) = self.shared.install(family) {
            self.shared.release(&series);
            return Err(err);
        }
        instruments.insert(id, registered);
        Ok(handle)
    }

    fn log_duplicate(&self, id: &InstrumentId) {
        tracing::warn!(
            name: "InstrumentAlreadyCreated",
            meter = self.scope.name(),
            instrument = %id.name,
            kind = ?id.kind,
            unit = %id.unit,
            description = %id.description,
            "an instrument with this identity already exists, returning the existing instrument"
        );
    }
}

impl InstrumentProvider for BackendMeter {
    fn create_counter(
        &self,
        name: Cow<'static, str>,
        unit: Option<Cow<'static, str>>,
        description: Option<Cow<'static, str>>,
    ) -> Result<Counter> {
        let id = InstrumentId::new(name, InstrumentKind::Counter, unit, description);
        self.get_or_create(
            id,
            |existing| match existing {
                RegisteredInstrument::Counter(counter) => Some(counter.clone()),
                _ => None,
            },
            |family: Arc<ShardedFamily<prometheus::Counter>>| {
                let handle = Counter::new(Arc::new(BackendCounter::new(family)));
                (handle.clone(), RegisteredInstrument::Counter(handle))
            },
        )
    }

    fn create_up_down_counter(
        &self,
        name: Cow<'static, str>,
        unit: Option<Cow<'static, str>>,
        description: Option<Cow<'static, str>>,
    ) -> Result<UpDownCounter> {
        let id = InstrumentId::new(name, InstrumentKind::UpDownCounter, unit, description);
        self.get_or_create(
            id,
            |existing| match existing {
                RegisteredInstrument::UpDownCounter(counter) => Some(counter.clone()),
                _ => None,
            },
            |family: Arc<ShardedFamily<prometheus::Gauge>>| {
                let handle = UpDownCounter::new(Arc::new(BackendUpDownCounter::new(family)));
                (handle.clone(), RegisteredInstrument::UpDownCounter(handle))
            },
        )
    }

    fn create_gauge(
        &self,
        name: Cow<'static, str>,
        unit: Option<Cow<'static, str>>,
        description: Option<Cow<'static, str>>,
    ) -> Result<Gauge> {
        let id = InstrumentId::new(name, InstrumentKind::Gauge, unit, description);
        self.get_or_create(
            id,
            |existing| match existing {
                RegisteredInstrument::Gauge(gauge) => Some(gauge.clone()),
                _ => None,
            },
            |family: Arc<ShardedFamily<prometheus::Gauge>>| {
                let handle = Gauge::new(Arc::new(BackendGauge::new(family)));
                (handle.clone(), RegisteredInstrument::Gauge(handle))
            },
        )
    }

    fn create_histogram(
        &self,
        name: Cow<'static, str>,
        unit: Option<Cow<'static, str>>,
        description: Option<Cow<'static, str>>,
    ) -> Result<Histogram> {
        let id = InstrumentId::new(name, InstrumentKind::Histogram, unit, description);
        self.get_or_create(
            id,
            |existing| match existing {
                RegisteredInstrument::Histogram(histogram) => Some(histogram.clone()),
                _ => None,
            },
            |family: Arc<ShardedFamily<prometheus::Histogram>>| {
                let handle = Histogram::new(Arc::new(BackendHistogram::new(family)));
                (handle.clone(), RegisteredInstrument::Histogram(handle))
            },
        )
    }
}

/// A meter that creates no-op instruments, handed out when a usable meter
/// cannot be (empty meter name, poisoned provider state).
#[derive(Debug, Default)]
pub(crate) struct NoopMeter {
    _private: (),
}

impl NoopMeter {
    pub(crate) fn new() -> Self {
        NoopMeter::default()
    }
}

impl InstrumentProvider for NoopMeter {}

/// An instrument that ignores every measurement.
#[derive(Debug, Default)]
pub(crate) struct NoopSyncInstrument {
    _private: (),
}

impl NoopSyncInstrument {
    pub(crate) fn new() -> Self {
        NoopSyncInstrument::default()
    }
}

impl SyncInstrument for NoopSyncInstrument {
    fn measure(&self, _value: f64, _attributes: &[KeyValue]) {
        // ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::histogram::DEFAULT_HISTOGRAM_BOUNDARIES;

    fn test_meter() -> Meter {
        let shared = Arc::new(SharedRegistry::new(
            prometheus::Registry::new(),
            DEFAULT_HISTOGRAM_BOUNDARIES.to_vec(),
        ));
        let scope = InstrumentationScope::builder("test-meter").build();
        Meter::new(Arc::new(BackendMeter::new(scope, shared)))
    }

    #[test]
    fn same_identity_returns_the_same_instrument() {
        let meter = test_meter();
        let a = meter
            .create_counter("requests")
            .with_unit("1")
            .with_description("d")
            .try_init()
            .unwrap();
        let b = meter
            .create_counter("requests")
            .with_unit("1")
            .with_description("d")
            .try_init()
            .unwrap();
        assert!(Arc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn different_identity_with_same_series_name_conflicts() {
        let meter = test_meter();
        meter
            .create_counter("requests")
            .with_unit("1")
            .try_init()
            .unwrap();
        // same series name, different unit: not the same instrument, and
        // the series name is already taken
        let err = meter
            .create_counter("requests")
            .with_unit("ms")
            .try_init()
            .unwrap_err();
        assert!(matches!(err, MetricError::NameConflict(_)));
        // same for a different kind under the same name
        let err = meter
            .create_gauge("requests")
            .with_unit("1")
            .try_init()
            .unwrap_err();
        assert!(matches!(err, MetricError::NameConflict(_)));
    }

    #[test]
    fn sanitization_collisions_conflict() {
        let meter = test_meter();
        meter.create_counter("a.b").try_init().unwrap();
        let err = meter.create_counter("a#b").try_init().unwrap_err();
        assert!(matches!(err, MetricError::NameConflict(name) if name == "a_b"));
    }

    #[test]
    fn suffixed_series_names_cannot_be_shadowed() {
        let meter = test_meter();

        // a counter occupies its `_total` series as well
        meter.create_counter("foo").try_init().unwrap();
        let err = meter.create_gauge("foo_total").try_init().unwrap_err();
        assert!(matches!(err, MetricError::NameConflict(name) if name == "foo_total"));

        // and the other way around
        meter.create_gauge("bar_total").try_init().unwrap();
        let err = meter.create_counter("bar").try_init().unwrap_err();
        assert!(matches!(err, MetricError::NameConflict(name) if name == "bar_total"));

        // histograms occupy their derived series too
        meter.create_histogram("lat").try_init().unwrap();
        let err = meter.create_gauge("lat_bucket").try_init().unwrap_err();
        assert!(matches!(err, MetricError::NameConflict(name) if name == "lat_bucket"));
        let err = meter.create_up_down_counter("lat_sum").try_init().unwrap_err();
        assert!(matches!(err, MetricError::NameConflict(name) if name == "lat_sum"));
    }

    #[test]
    fn raw_names_are_case_sensitive() {
        let meter = test_meter();
        let a = meter.create_counter("Requests").try_init().unwrap();
        let b = meter.create_counter("requests").try_init().unwrap();
        assert!(!Arc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn observable_instruments_are_rejected() {
        let meter = test_meter();
        let err = meter
            .create_observable_counter("cb")
            .with_callback(|_| {})
            .try_init()
            .unwrap_err();
        assert!(matches!(err, MetricError::AsyncNotSupported(_)));
        let err = meter
            .create_observable_up_down_counter("cb")
            .try_init()
            .unwrap_err();
        assert!(matches!(err, MetricError::AsyncNotSupported(_)));
        let err = meter.create_observable_gauge("cb").try_init().unwrap_err();
        assert!(matches!(err, MetricError::AsyncNotSupported(_)));
    }

    #[test]
    fn empty_instrument_name_fails_at_creation() {
        let meter = test_meter();
        assert!(meter.create_counter("").try_init().is_err());
    }

    #[test]
    fn noop_meter_absorbs_measurements() {
        let meter = Meter::new(Arc::new(NoopMeter::new()));
        let counter = meter.create_counter("anything").try_init().unwrap();
        counter.add(1.0, &[KeyValue::new("k", "v")]);
        let gauge = meter.create_gauge("anything").try_init().unwrap();
        gauge.set(-1.0, &[]);
        // observables stay unsupported even on the no-op meter
        assert!(meter.create_observable_gauge("cb").try_init().is_err());
    }

    #[test]
    fn concurrent_creation_yields_one_instrument() {
        let meter = test_meter();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let meter = meter.clone();
                std::thread::spawn(move || {
                    meter.create_counter("racy").try_init().unwrap()
                })
            })
            .collect();
        let counters: Vec<Counter> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for counter in &counters[1..] {
            assert!(Arc::ptr_eq(&counters[0].0, &counter.0));
        }
    }
}
