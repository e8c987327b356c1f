use core::fmt;
use std::borrow::Cow;
use std::marker;
use std::sync::Arc;

use crate::common::KeyValue;
use crate::error::{MetricError, Result};
use crate::meter::{InstrumentProvider, Meter};

pub(crate) mod counter;
pub(crate) mod gauge;
pub(crate) mod histogram;
pub(crate) mod up_down_counter;

pub use counter::{Counter, ObservableCounter};
pub use gauge::{Gauge, ObservableGauge};
pub use histogram::Histogram;
pub use up_down_counter::{ObservableUpDownCounter, UpDownCounter};

/// The functional group of an instrument.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum InstrumentKind {
    /// Instruments that record monotonically increasing values.
    Counter,
    /// Instruments that record values which may increase and decrease.
    UpDownCounter,
    /// Instruments that record the latest value set.
    Gauge,
    /// Instruments that record a distribution of values.
    Histogram,
}

/// A backend-implemented instrument that records measurements pushed by the
/// caller.
pub trait SyncInstrument: Send + Sync {
    /// Records a measurement against the given attribute set.
    fn measure(&self, value: f64, attributes: &[KeyValue]);
}

/// A backend-implemented instrument that records measurements via callback.
///
/// No implementation in this crate ever invokes these callbacks; observable
/// instrument creation is rejected (see [`MetricError::AsyncNotSupported`]).
pub trait AsyncInstrument: Send + Sync {
    /// Observes the current state of the instrument.
    fn observe(&self, value: f64, attributes: &[KeyValue]);
}

/// A function registered with a [`Meter`] that makes observations for the
/// observable instrument it is registered with.
pub type Callback = Box<dyn Fn(&dyn AsyncInstrument) + Send + Sync>;

/// Configuration for building a sync instrument.
pub struct InstrumentBuilder<T> {
    pub(crate) instrument_provider: Arc<dyn InstrumentProvider + Send + Sync>,
    pub(crate) name: Cow<'static, str>,
    pub(crate) description: Option<Cow<'static, str>>,
    pub(crate) unit: Option<Cow<'static, str>>,
    _marker: marker::PhantomData<T>,
}

impl<T> InstrumentBuilder<T>
where
    T: TryFrom<Self, Error = MetricError>,
{
    pub(crate) fn new(meter: &Meter, name: Cow<'static, str>) -> Self {
        InstrumentBuilder {
            instrument_provider: meter.instrument_provider.clone(),
            name,
            description: None,
            unit: None,
            _marker: marker::PhantomData,
        }
    }

    /// Set the description for this instrument.
    pub fn with_description<S: Into<Cow<'static, str>>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the unit for this instrument.
    ///
    /// Units are case sensitive (`kb` is not the same as `kB`) and take
    /// part in the instrument's identity.
    pub fn with_unit<S: Into<Cow<'static, str>>>(mut self, unit: S) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Validate the instrument configuration and create a new instrument.
    pub fn try_init(self) -> Result<T> {
        T::try_from(self)
    }

    /// Creates a new instrument.
    ///
    /// # Panics
    ///
    /// Panics if the instrument cannot be created. Use
    /// [`try_init`](InstrumentBuilder::try_init) if you want to handle
    /// errors.
    pub fn init(self) -> T {
        T::try_from(self).unwrap()
    }
}

impl<T> fmt::Debug for InstrumentBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentBuilder")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("unit", &self.unit)
            .field("kind", &std::any::type_name::<T>())
            .finish()
    }
}

/// Configuration for building an observable instrument.
///
/// Creation of observable instruments always fails in this crate; see
/// [`MetricError::AsyncNotSupported`].
pub struct AsyncInstrumentBuilder<'a, I> {
    pub(crate) meter: &'a Meter,
    pub(crate) name: Cow<'static, str>,
    pub(crate) description: Option<Cow<'static, str>>,
    pub(crate) unit: Option<Cow<'static, str>>,
    pub(crate) callbacks: Vec<Callback>,
    _marker: marker::PhantomData<I>,
}

impl<'a, I> AsyncInstrumentBuilder<'a, I>
where
    I: TryFrom<Self, Error = MetricError>,
{
    pub(crate) fn new(meter: &'a Meter, name: Cow<'static, str>) -> Self {
        AsyncInstrumentBuilder {
            meter,
            name,
            description: None,
            unit: None,
            callbacks: Vec::new(),
            _marker: marker::PhantomData,
        }
    }

    /// Set the description for this instrument.
    pub fn with_description<S: Into<Cow<'static, str>>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the unit for this instrument.
    pub fn with_unit<S: Into<Cow<'static, str>>>(mut self, unit: S) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set the callback to be invoked during collection.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&dyn AsyncInstrument) + Send + Sync + 'static,
    {
        self.callbacks.push(Box::new(callback));
        self
    }

    /// Validate the instrument configuration and create a new instrument.
    ///
    /// Always returns [`MetricError::AsyncNotSupported`] in this crate.
    pub fn try_init(self) -> Result<I> {
        I::try_from(self)
    }
}

impl<I> fmt::Debug for AsyncInstrumentBuilder<'_, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncInstrumentBuilder")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("unit", &self.unit)
            .field("callbacks_len", &self.callbacks.len())
            .field("kind", &std::any::type_name::<I>())
            .finish()
    }
}
