//! Vendor-neutral metric instruments stored directly in [Prometheus].
//!
//! A [`MeterProvider`] hands out [`Meter`]s, one per instrumentation
//! scope, and each meter creates [`Counter`]s, [`UpDownCounter`]s,
//! [`Gauge`]s and [`Histogram`]s. Instruments write straight into
//! `prometheus` primitives at record time; there is no aggregation
//! pipeline in between, so whatever the registry gathers is exactly what
//! was recorded.
//!
//! Creating the same instrument twice returns the same instance: an
//! instrument's identity is its raw name, kind, unit and description, and
//! each identity maps to exactly one backend series. Two identities that
//! collide on the same series name after sanitization fail with
//! [`MetricError::NameConflict`] rather than sharing storage.
//!
//! Observable (callback-driven) instruments are not supported, since the
//! pull-based backend provides no hook to run callbacks at scrape time;
//! creating one fails with [`MetricError::AsyncNotSupported`].
//!
//! [Prometheus]: https://prometheus.io
//!
//! # Usage
//!
//! ```
//! use prometheus::{Encoder, TextEncoder};
//! use prometheus_meter::{KeyValue, MeterProvider};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // create a provider over a registry you control
//! let registry = prometheus::Registry::new();
//! let provider = MeterProvider::builder()
//!     .with_registry(registry.clone())
//!     .build();
//! let meter = provider.meter("my-app");
//!
//! // create instruments and record values
//! let counter = meter
//!     .create_counter("a_counter")
//!     .with_description("Counts things")
//!     .try_init()?;
//! let histogram = meter
//!     .create_histogram("a_histogram")
//!     .with_unit("ms")
//!     .with_description("Records distributions")
//!     .try_init()?;
//!
//! counter.add(100.0, &[KeyValue::new("key", "value")]);
//! histogram.record(100.0, &[KeyValue::new("key", "value")]);
//!
//! // expose the registry however your application serves metrics
//! let encoder = TextEncoder::new();
//! let mut result = Vec::new();
//! encoder.encode(&registry.gather(), &mut result)?;
//! # Ok(())
//! # }
//! ```

#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(docsrs, feature(doc_cfg), feature(doc_auto_cfg))]

mod common;
mod error;
mod exposition;
mod family;
mod instruments;
mod meter;
mod provider;
mod registry;
mod sanitize;
mod scope;

pub use common::KeyValue;
pub use error::{MetricError, Result};
pub use exposition::{Exemplar, Sample};
pub use instruments::{
    AsyncInstrument, AsyncInstrumentBuilder, Callback, Counter, Gauge, Histogram,
    InstrumentBuilder, InstrumentKind, ObservableCounter, ObservableGauge,
    ObservableUpDownCounter, SyncInstrument, UpDownCounter,
};
pub use meter::{InstrumentProvider, Meter};
pub use provider::{MeterProvider, MeterProviderBuilder};
pub use scope::{InstrumentationScope, InstrumentationScopeBuilder};
