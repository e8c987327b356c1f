//! Per-instrument backend storage, sharded by label set.
//!
//! Each instrument owns one [`ShardedFamily`]: a map from sorted label
//! pairs to a backend child holding the live value. Children carry no
//! labels themselves; the family re-attaches the shard's labels when it is
//! collected or when it emits its merged sample sequence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use prometheus::core::{Collector, Desc, Metric as _};
use prometheus::proto;
use prometheus::{HistogramOpts, Opts};

use crate::common::KeyValue;
use crate::error::Result;
use crate::exposition::{
    flatten_child, Sample, SampleSource, BUCKET_SUFFIX, COUNTER_SUFFIX, COUNT_SUFFIX, SUM_SUFFIX,
};
use crate::instruments::InstrumentKind;
use crate::sanitize::sanitize_label_key;

/// Immutable description of one metric family.
pub(crate) struct FamilySpec {
    /// Sanitized series name.
    pub(crate) name: String,
    pub(crate) help: String,
    pub(crate) kind: InstrumentKind,
    /// Bucket boundaries; only read for histograms.
    pub(crate) buckets: Vec<f64>,
}

impl FamilySpec {
    /// The name the family is exposed under: counters carry the `_total`
    /// suffix (unless the sanitized name already ends with it).
    pub(crate) fn exposed_name(&self) -> String {
        match self.kind {
            InstrumentKind::Counter if !self.name.ends_with(COUNTER_SUFFIX) => {
                format!("{}{}", self.name, COUNTER_SUFFIX)
            }
            _ => self.name.clone(),
        }
    }

    /// Every series name this family occupies in exposition output: the
    /// base name plus the kind-specific suffixed names. All of them have
    /// to be reserved, or a differently-kinded family could shadow one of
    /// the derived series.
    pub(crate) fn series_names(&self) -> Vec<String> {
        let mut names = vec![self.name.clone()];
        match self.kind {
            InstrumentKind::Counter => {
                let exposed = self.exposed_name();
                if exposed != self.name {
                    names.push(exposed);
                }
            }
            InstrumentKind::Histogram => {
                for suffix in [BUCKET_SUFFIX, SUM_SUFFIX, COUNT_SUFFIX] {
                    names.push(format!("{}{}", self.name, suffix));
                }
            }
            InstrumentKind::UpDownCounter | InstrumentKind::Gauge => {}
        }
        names
    }
}

/// A backend value holder that a family can allocate per label set.
pub(crate) trait ChildMetric: Clone + Send + Sync + 'static {
    fn build(spec: &FamilySpec) -> prometheus::Result<Self>;
    fn proto(&self) -> proto::Metric;
}

impl ChildMetric for prometheus::Counter {
    fn build(spec: &FamilySpec) -> prometheus::Result<Self> {
        prometheus::Counter::with_opts(Opts::new(spec.name.clone(), spec.help.clone()))
    }

    fn proto(&self) -> proto::Metric {
        self.metric()
    }
}

impl ChildMetric for prometheus::Gauge {
    fn build(spec: &FamilySpec) -> prometheus::Result<Self> {
        prometheus::Gauge::with_opts(Opts::new(spec.name.clone(), spec.help.clone()))
    }

    fn proto(&self) -> proto::Metric {
        self.metric()
    }
}

impl ChildMetric for prometheus::Histogram {
    fn build(spec: &FamilySpec) -> prometheus::Result<Self> {
        let opts = HistogramOpts::new(spec.name.clone(), spec.help.clone())
            .buckets(spec.buckets.clone());
        prometheus::Histogram::with_opts(opts)
    }

    fn proto(&self) -> proto::Metric {
        self.metric()
    }
}

/// One metric family with a child per observed label set.
pub(crate) struct ShardedFamily<C: ChildMetric> {
    spec: FamilySpec,
    desc: Desc,
    children: Mutex<BTreeMap<Vec<(String, String)>, C>>,
}

impl<C: ChildMetric> ShardedFamily<C> {
    /// Creates the family along with its empty-label child.
    ///
    /// Allocating the default child up front means an illegal series name
    /// fails here, at instrument creation, instead of at first record.
    pub(crate) fn new(spec: FamilySpec) -> Result<Self> {
        let desc = Desc::new(
            spec.exposed_name(),
            spec.help.clone(),
            Vec::new(),
            HashMap::new(),
        )?;
        let default_child = C::build(&spec)?;
        let mut children = BTreeMap::new();
        children.insert(Vec::new(), default_child);
        Ok(ShardedFamily {
            spec,
            desc,
            children: Mutex::new(children),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.spec.name
    }

    pub(crate) fn series_names(&self) -> Vec<String> {
        self.spec.series_names()
    }

    /// Returns the child for the given attribute set, allocating it on
    /// first use. Children are cheap handles sharing their storage, so the
    /// returned clone stays live in the map.
    pub(crate) fn child(&self, attributes: &[KeyValue]) -> Result<C> {
        let labels = label_set(attributes);
        let mut children = self.children.lock()?;
        if let Some(child) = children.get(&labels) {
            return Ok(child.clone());
        }
        let child = C::build(&self.spec)?;
        children.insert(labels, child.clone());
        Ok(child)
    }

    fn snapshot(&self) -> Vec<(Vec<(String, String)>, C)> {
        match self.children.lock() {
            Ok(children) => children
                .iter()
                .map(|(labels, child)| (labels.clone(), child.clone()))
                .collect(),
            Err(_) => {
                tracing::error!(
                    name: "MetricFamilyPoisoned",
                    metric = self.name(),
                    "child map lock poisoned, skipping family"
                );
                Vec::new()
            }
        }
    }

    /// Reconstructs the flat sample sequence across all label shards, in
    /// label-set order. Each call takes a fresh snapshot.
    pub(crate) fn samples(&self) -> impl Iterator<Item = Sample> + Send {
        let name = self.spec.exposed_name();
        let kind = self.spec.kind;
        self.snapshot()
            .into_iter()
            .flat_map(move |(labels, child)| {
                flatten_child(&name, kind, &labels, &child.proto()).into_iter()
            })
    }
}

impl<C: ChildMetric> SampleSource for ShardedFamily<C> {
    fn samples(&self) -> Box<dyn Iterator<Item = Sample> + Send> {
        Box::new(ShardedFamily::samples(self))
    }
}

/// Maps attributes into sorted label pairs.
///
/// Keys are sanitized; when two keys collide after sanitization their
/// values are sorted and joined with `;`.
pub(crate) fn label_set(attributes: &[KeyValue]) -> Vec<(String, String)> {
    if attributes.is_empty() {
        return Vec::new();
    }
    let mut merged = BTreeMap::<String, Vec<String>>::new();
    for kv in attributes {
        merged
            .entry(sanitize_label_key(&kv.key))
            .or_default()
            .push(kv.value.to_string());
    }
    merged
        .into_iter()
        .map(|(key, mut values)| {
            values.sort_unstable();
            (key, values.join(";"))
        })
        .collect()
}

/// Exposes one family through the backend registry's gather path.
///
/// Shard label names vary at runtime, so the descriptor declares none of
/// them; it exists to give the registry a stable per-family identity.
pub(crate) struct FamilyCollector<C: ChildMetric>(pub(crate) Arc<ShardedFamily<C>>);

impl<C: ChildMetric> Collector for FamilyCollector<C> {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.0.desc]
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        let family = &self.0;
        let metrics = family
            .snapshot()
            .into_iter()
            .map(|(labels, child)| {
                let mut m = child.proto();
                let pairs = labels
                    .into_iter()
                    .map(|(name, value)| {
                        let mut lp = proto::LabelPair::default();
                        lp.set_name(name);
                        lp.set_value(value);
                        lp
                    })
                    .collect::<Vec<_>>();
                m.set_label(pairs);
                m
            })
            .collect::<Vec<_>>();

        let mut mf = proto::MetricFamily::default();
        mf.set_name(family.spec.exposed_name());
        mf.set_help(family.spec.help.clone());
        mf.set_field_type(metric_type(family.spec.kind));
        mf.set_metric(metrics);
        vec![mf]
    }
}

fn metric_type(kind: InstrumentKind) -> proto::MetricType {
    match kind {
        InstrumentKind::Counter => proto::MetricType::COUNTER,
        // up-down counters live in gauge storage
        InstrumentKind::UpDownCounter | InstrumentKind::Gauge => proto::MetricType::GAUGE,
        InstrumentKind::Histogram => proto::MetricType::HISTOGRAM,
    }
}
