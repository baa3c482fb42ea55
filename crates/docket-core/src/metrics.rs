//! Prometheus metrics for the ruling pipeline
//!
//! - `docket_rulings_total` (counter) - rulings written, by verdict
//! - `docket_bias_checks_total` (counter) - bias checks written
//! - `docket_rate_limited_total` (counter) - denied admissions
//! - `docket_completion_failures_total` (counter) - failed completion calls, by call and kind
//! - `docket_completion_duration_seconds` (histogram) - completion latency, by call
//! - `docket_audit_dropped_total` (counter) - audit records dropped on a full queue

use prometheus::{Counter, CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;

use crate::model::Verdict;

const NAMESPACE: &str = "docket";

/// Which completion call a measurement belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionCall {
    Ruling,
    Bias,
}

impl CompletionCall {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionCall::Ruling => "ruling",
            CompletionCall::Bias => "bias",
        }
    }
}

pub struct DocketMetrics {
    rulings_total: CounterVec,
    bias_checks_total: Counter,
    rate_limited_total: Counter,
    completion_failures_total: CounterVec,
    completion_duration_seconds: HistogramVec,
    audit_dropped_total: Counter,
}

impl DocketMetrics {
    /// Create the metrics and register them with `registry`
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let rulings_total = CounterVec::new(
            Opts::new("rulings_total", "Rulings generated and stored").namespace(NAMESPACE),
            &["verdict"],
        )?;

        let bias_checks_total = Counter::with_opts(
            Opts::new("bias_checks_total", "Bias checks generated and stored").namespace(NAMESPACE),
        )?;

        let rate_limited_total = Counter::with_opts(
            Opts::new("rate_limited_total", "Ruling requests denied by the rate limiter")
                .namespace(NAMESPACE),
        )?;

        let completion_failures_total = CounterVec::new(
            Opts::new("completion_failures_total", "Failed completion calls")
                .namespace(NAMESPACE),
            &["call", "kind"],
        )?;

        let completion_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "completion_duration_seconds",
                "Completion service round-trip time in seconds",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0]),
            &["call"],
        )?;

        let audit_dropped_total = Counter::with_opts(
            Opts::new("audit_dropped_total", "Audit records dropped because the queue was full")
                .namespace(NAMESPACE),
        )?;

        registry.register(Box::new(rulings_total.clone()))?;
        registry.register(Box::new(bias_checks_total.clone()))?;
        registry.register(Box::new(rate_limited_total.clone()))?;
        registry.register(Box::new(completion_failures_total.clone()))?;
        registry.register(Box::new(completion_duration_seconds.clone()))?;
        registry.register(Box::new(audit_dropped_total.clone()))?;

        Ok(Self {
            rulings_total,
            bias_checks_total,
            rate_limited_total,
            completion_failures_total,
            completion_duration_seconds,
            audit_dropped_total,
        })
    }

    pub fn record_ruling(&self, verdict: Verdict) {
        self.rulings_total.with_label_values(&[verdict.as_str()]).inc();
    }

    pub fn record_bias_check(&self) {
        self.bias_checks_total.inc();
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited_total.inc();
    }

    pub fn record_completion_failure(&self, call: CompletionCall, kind: &str) {
        self.completion_failures_total
            .with_label_values(&[call.as_str(), kind])
            .inc();
    }

    pub fn observe_completion(&self, call: CompletionCall, duration_secs: f64) {
        self.completion_duration_seconds
            .with_label_values(&[call.as_str()])
            .observe(duration_secs);
    }

    pub fn record_audit_dropped(&self) {
        self.audit_dropped_total.inc();
    }
}

/// Owns a Prometheus registry together with the pipeline metrics
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    docket: Arc<DocketMetrics>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());
        let docket = Arc::new(DocketMetrics::new(&registry)?);
        Ok(Self { registry, docket })
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn docket(&self) -> Arc<DocketMetrics> {
        Arc::clone(&self.docket)
    }

    /// Encode all registered metrics in the text exposition format
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
