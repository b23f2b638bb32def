use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref READINGS_CREATED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "smarthome_readings_created_total",
        "Total temperature readings stored"
    ))
    .expect("valid metric definition");
    pub static ref READINGS_DELETED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "smarthome_readings_deleted_total",
        "Total temperature readings deleted"
    ))
    .expect("valid metric definition");
    pub static ref DEVICE_TOGGLES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "smarthome_device_toggles_total",
        "Total successful device toggles"
    ))
    .expect("valid metric definition");
    pub static ref VALIDATION_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "smarthome_validation_failures_total",
        "Total requests rejected by validation"
    ))
    .expect("valid metric definition");
    pub static ref STORE_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "smarthome_store_failures_total",
        "Total requests that failed against the store"
    ))
    .expect("valid metric definition");
    pub static ref STORE_LATENCY_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "smarthome_store_latency_seconds",
            "Time taken by a single store operation"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ]),
        &["operation"]
    )
    .expect("valid metric definition");
}

pub fn init_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(READINGS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(READINGS_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DEVICE_TOGGLES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VALIDATION_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORE_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORE_LATENCY_SECONDS.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
