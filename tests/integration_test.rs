use prometheus::{Encoder, TextEncoder};
use prometheus_meter::{
    InstrumentationScope, KeyValue, MeterProvider, MetricError, Sample,
};

/// Renders internal diagnostics (dropped measurements, duplicate
/// creations) into the captured test output.
fn init_diagnostics() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Gathers the registry, strips comment lines and compares the remaining
/// sample lines, ignoring order.
fn compare_export(registry: &prometheus::Registry, expected: Vec<&'static str>) {
    let encoder = TextEncoder::new();
    let mut output = Vec::new();
    encoder.encode(&registry.gather(), &mut output).unwrap();
    let output_string = String::from_utf8(output).unwrap();

    let mut got: Vec<&str> = output_string
        .lines()
        .filter(|line| !line.starts_with('#') && !line.is_empty())
        .collect();
    got.sort_unstable();
    let mut want = expected;
    want.sort_unstable();
    assert_eq!(want, got);
}

fn provider_over(registry: &prometheus::Registry) -> MeterProvider {
    MeterProvider::builder()
        .with_registry(registry.clone())
        .build()
}

#[test]
fn counter_export() {
    init_diagnostics();
    let registry = prometheus::Registry::new();
    let provider = provider_over(&registry);
    let meter = provider.meter("app");

    let counter = meter
        .create_counter("http_requests")
        .with_description("Total requests served.")
        .try_init()
        .unwrap();
    counter.add(2.0, &[KeyValue::new("code", "200")]);
    counter.add(1.0, &[KeyValue::new("code", "200")]);
    counter.add(1.0, &[KeyValue::new("code", "500")]);
    // dropped with a warning, counters only go up
    counter.add(-5.0, &[KeyValue::new("code", "200")]);

    compare_export(
        &registry,
        vec![
            "http_requests_total 0",
            "http_requests_total{code=\"200\"} 3",
            "http_requests_total{code=\"500\"} 1",
        ],
    );
}

#[test]
fn gauge_and_up_down_counter_export() {
    let registry = prometheus::Registry::new();
    let provider = provider_over(&registry);
    let meter = provider.meter("app");

    let gauge = meter.create_gauge("temperature").try_init().unwrap();
    gauge.set(3.0, &[]);
    gauge.set(-1.5, &[]);

    let queue = meter
        .create_up_down_counter("queue_depth")
        .try_init()
        .unwrap();
    queue.add(10.0, &[]);
    queue.add(-3.0, &[]);

    compare_export(&registry, vec!["temperature -1.5", "queue_depth 7"]);
}

#[test]
fn histogram_export_with_custom_boundaries() {
    init_diagnostics();
    let registry = prometheus::Registry::new();
    let provider = MeterProvider::builder()
        .with_registry(registry.clone())
        .with_default_histogram_boundaries(vec![0.0, 5.0, 10.0])
        .build();
    let meter = provider.meter("app");

    let latency = meter
        .create_histogram("latency")
        .with_unit("ms")
        .try_init()
        .unwrap();
    latency.record(7.0, &[]);
    latency.record(12.0, &[]);
    // dropped with a warning
    latency.record(-1.0, &[]);

    compare_export(
        &registry,
        vec![
            "latency_bucket{le=\"0\"} 0",
            "latency_bucket{le=\"5\"} 0",
            "latency_bucket{le=\"10\"} 1",
            "latency_bucket{le=\"+Inf\"} 2",
            "latency_sum 19",
            "latency_count 2",
        ],
    );
}

#[test]
fn histogram_buckets_are_cumulative_at_a_boundary() {
    let provider = MeterProvider::default();
    let meter = provider.meter("app");
    let latency = meter.create_histogram("latency").try_init().unwrap();
    // lands exactly on a default boundary: every bucket with an upper
    // bound >= 5000 counts it
    latency.record(5000.0, &[]);

    let buckets: Vec<(String, f64)> = provider
        .samples()
        .filter(|s| s.name == "latency_bucket")
        .map(|s| (s.labels[0].1.clone(), s.value))
        .collect();
    let expected = [
        ("0", 0.0),
        ("5", 0.0),
        ("10", 0.0),
        ("25", 0.0),
        ("50", 0.0),
        ("75", 0.0),
        ("100", 0.0),
        ("250", 0.0),
        ("500", 0.0),
        ("750", 0.0),
        ("1000", 0.0),
        ("2500", 0.0),
        ("5000", 1.0),
        ("7500", 1.0),
        ("10000", 1.0),
        ("+Inf", 1.0),
    ];
    assert_eq!(buckets.len(), expected.len());
    for ((le, value), (want_le, want_value)) in buckets.iter().zip(expected) {
        assert_eq!(le, want_le);
        assert_eq!(*value, want_value);
    }
}

#[test]
fn duplicate_instruments_share_storage() {
    let registry = prometheus::Registry::new();
    let provider = provider_over(&registry);

    // two meter handles for the same name resolve to the same meter, and
    // identical builders to the same instrument
    let first = provider
        .meter("app")
        .create_counter("hits")
        .try_init()
        .unwrap();
    let second = provider
        .meter("app")
        .create_counter("hits")
        .try_init()
        .unwrap();
    first.add(1.0, &[]);
    second.add(2.0, &[]);

    compare_export(&registry, vec!["hits_total 3"]);
}

#[test]
fn conflicting_names_fail_across_meters() {
    let provider = MeterProvider::default();
    provider
        .meter("one")
        .create_counter("jobs.done")
        .try_init()
        .unwrap();

    // different meter, and a different raw name sanitizing to the same
    // series name
    let err = provider
        .meter_with_scope(
            InstrumentationScope::builder("one")
                .with_version("2.0")
                .build(),
        )
        .create_counter("jobs#done")
        .try_init()
        .unwrap_err();
    assert!(matches!(err, MetricError::NameConflict(name) if name == "jobs_done"));
}

#[test]
fn flat_samples_merge_every_family() {
    let provider = MeterProvider::builder()
        .with_default_histogram_boundaries(vec![5.0, 10.0])
        .build();
    let meter = provider.meter("app");

    let counter = meter.create_counter("hits").try_init().unwrap();
    counter.add(3.0, &[KeyValue::new("path", "/")]);
    let latency = meter.create_histogram("latency").try_init().unwrap();
    latency.record(7.0, &[]);

    let samples: Vec<Sample> = provider.samples().collect();
    let names: Vec<&str> = samples.iter().map(|s| s.name.as_str()).collect();
    // families in creation order, shards in label order within a family
    assert_eq!(
        names,
        vec![
            "hits_total",
            "hits_total",
            "latency_bucket",
            "latency_bucket",
            "latency_bucket",
            "latency_sum",
            "latency_count",
        ]
    );

    assert!(samples[0].labels.is_empty());
    assert_eq!(samples[0].value, 0.0);
    assert_eq!(
        samples[1].labels,
        vec![("path".to_string(), "/".to_string())]
    );
    assert_eq!(samples[1].value, 3.0);

    let inf_bucket = &samples[4];
    assert_eq!(
        inf_bucket.labels,
        vec![("le".to_string(), "+Inf".to_string())]
    );
    assert_eq!(inf_bucket.value, 1.0);
    assert_eq!(samples[5].value, 7.0);
    assert_eq!(samples[6].value, 1.0);

    for sample in &samples {
        assert_eq!(sample.timestamp_ms, None);
        assert_eq!(sample.exemplar, None);
    }
}

#[test]
fn sanitized_names_appear_in_export() {
    let registry = prometheus::Registry::new();
    let provider = provider_over(&registry);
    let meter = provider.meter("app");

    let counter = meter.create_counter("request.count#1").try_init().unwrap();
    counter.add(1.0, &[KeyValue::new("service.name", "api")]);

    compare_export(
        &registry,
        vec![
            "request_count_1_total 0",
            "request_count_1_total{service_name=\"api\"} 1",
        ],
    );
}

#[test]
fn rejected_backend_registration_leaves_no_trace() {
    let registry = prometheus::Registry::new();
    // occupies the series name our counter would be exposed under
    let foreign =
        prometheus::Counter::new("ours_total", "registered outside the provider").unwrap();
    registry.register(Box::new(foreign.clone())).unwrap();
    foreign.inc();

    let provider = provider_over(&registry);
    let meter = provider.meter("app");

    // the backend refuses the duplicate descriptor, and nothing of the
    // failed creation is committed: a retry fails identically instead of
    // handing out an instrument that records into the void
    assert!(meter.create_counter("ours").try_init().is_err());
    assert!(meter.create_counter("ours").try_init().is_err());
    assert_eq!(provider.samples().count(), 0);
    compare_export(&registry, vec!["ours_total 1"]);

    // the meter itself stays usable
    let other = meter.create_counter("other").try_init().unwrap();
    other.add(1.0, &[]);
    compare_export(&registry, vec!["ours_total 1", "other_total 1"]);
}

#[test]
fn shared_registry_keeps_foreign_metrics() {
    let registry = prometheus::Registry::new();
    let foreign = prometheus::Counter::new("foreign", "registered outside the provider").unwrap();
    registry.register(Box::new(foreign.clone())).unwrap();
    foreign.inc();

    let provider = provider_over(&registry);
    let counter = provider
        .meter("app")
        .create_counter("ours")
        .try_init()
        .unwrap();
    counter.add(2.0, &[]);

    compare_export(&registry, vec!["foreign 1", "ours_total 2"]);
}
