//! Flat exposition samples reconstructed from sharded backend storage.
//!
//! The backend stores one child object per label set. The functions here
//! flatten a child's low-level state into [`Sample`]s whose label set is
//! the concatenation of the shard's own labels and whatever extra labels
//! the child contributes (the `le` label on histogram buckets).

use prometheus::proto;

use crate::instruments::InstrumentKind;

// Counters get a `_total` suffix in exposition output:
// https://github.com/open-telemetry/opentelemetry-specification/blob/v1.20.0/specification/compatibility/prometheus_and_openmetrics.md
pub(crate) const COUNTER_SUFFIX: &str = "_total";

pub(crate) const BUCKET_SUFFIX: &str = "_bucket";
pub(crate) const SUM_SUFFIX: &str = "_sum";
pub(crate) const COUNT_SUFFIX: &str = "_count";

/// The label carrying a histogram bucket's upper bound.
const BUCKET_LABEL: &str = "le";

/// One exposed data point.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Full sample name, including any kind-specific suffix.
    pub name: String,
    /// Sorted label pairs, shard labels first.
    pub labels: Vec<(String, String)>,
    /// The sample value.
    pub value: f64,
    /// Timestamp in milliseconds since the epoch, if the backend recorded one.
    pub timestamp_ms: Option<i64>,
    /// Exemplar attached to the sample, if any.
    pub exemplar: Option<Exemplar>,
}

/// An exemplar referencing a single observation that contributed to a sample.
///
/// Never produced today: the backend has no exemplar support yet.
/// See <https://github.com/tikv/rust-prometheus/issues/393>.
#[derive(Clone, Debug, PartialEq)]
pub struct Exemplar {
    /// Labels identifying the exemplified observation, e.g. a trace id.
    pub labels: Vec<(String, String)>,
    /// The observed value.
    pub value: f64,
    /// Timestamp of the observation in milliseconds since the epoch.
    pub timestamp_ms: Option<i64>,
}

/// A registered metric family that can emit its merged sample sequence.
pub(crate) trait SampleSource: Send + Sync {
    fn samples(&self) -> Box<dyn Iterator<Item = Sample> + Send>;
}

/// Flattens one child's snapshot into full samples carrying the shard's
/// labels.
///
/// `name` is the family's exposition name; for counters it already
/// carries the `_total` suffix.
pub(crate) fn flatten_child(
    name: &str,
    kind: InstrumentKind,
    shard_labels: &[(String, String)],
    child: &proto::Metric,
) -> Vec<Sample> {
    let timestamp_ms = match child.timestamp_ms() {
        0 => None,
        ts => Some(ts),
    };
    let sample = |suffix: &str, extra: Option<(String, String)>, value: f64| {
        let mut labels = shard_labels.to_vec();
        labels.extend(extra);
        Sample {
            name: format!("{name}{suffix}"),
            labels,
            value,
            timestamp_ms,
            exemplar: None,
        }
    };

    match kind {
        InstrumentKind::Counter => {
            vec![sample("", None, child.get_counter().value())]
        }
        InstrumentKind::UpDownCounter | InstrumentKind::Gauge => {
            vec![sample("", None, child.get_gauge().value())]
        }
        InstrumentKind::Histogram => {
            let h = child.get_histogram();
            let mut samples = Vec::with_capacity(h.get_bucket().len() + 3);
            let mut inf_seen = false;
            for bucket in h.get_bucket() {
                let upper_bound = bucket.upper_bound();
                samples.push(sample(
                    BUCKET_SUFFIX,
                    Some((BUCKET_LABEL.to_string(), format_bound(upper_bound))),
                    bucket.cumulative_count() as f64,
                ));
                if upper_bound.is_infinite() && upper_bound.is_sign_positive() {
                    inf_seen = true;
                }
            }
            // The backend leaves the +Inf bucket implicit.
            if !inf_seen {
                samples.push(sample(
                    BUCKET_SUFFIX,
                    Some((BUCKET_LABEL.to_string(), "+Inf".to_string())),
                    h.get_sample_count() as f64,
                ));
            }
            samples.push(sample(SUM_SUFFIX, None, h.get_sample_sum()));
            samples.push(sample(COUNT_SUFFIX, None, h.get_sample_count() as f64));
            samples
        }
    }
}

/// Formats a bucket bound the way the exposition format spells floats.
fn format_bound(v: f64) -> String {
    if v.is_infinite() {
        if v.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else {
        v.to_string()
    }
}
