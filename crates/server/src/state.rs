use std::sync::Arc;

use limitgate_common::AppConfig;
use limitgate_engine::{
    AdmissionController, AuditRecord, AuditSink, MemoryAuditSink, TracingAuditSink,
};
use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};

/// Shared state type alias used across all route handlers.
pub type SharedState = Arc<AppState>;

/// Central application state holding the engine, metrics, and audit log.
pub struct AppState {
    pub config: AppConfig,
    pub controller: AdmissionController,
    pub audit_log: Arc<MemoryAuditSink>,
    pub metrics: GateMetrics,
    pub start_time: std::time::Instant,
}

/// Prometheus metrics collected from admission decisions.
pub struct GateMetrics {
    pub registry: Registry,
    pub requests_total: IntCounter,
    pub requests_denied: IntCounter,
    pub degraded_total: IntCounter,
    pub admission_duration: Histogram,
}

impl GateMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounter::with_opts(Opts::new(
            "limitgate_requests_total",
            "Total admission checks processed",
        ))
        .expect("failed to create requests_total counter");

        let requests_denied = IntCounter::with_opts(Opts::new(
            "limitgate_requests_denied",
            "Total requests denied by a rate-limit policy",
        ))
        .expect("failed to create requests_denied counter");

        let degraded_total = IntCounter::with_opts(Opts::new(
            "limitgate_degraded_total",
            "Total requests decided in degraded (fail-open) mode",
        ))
        .expect("failed to create degraded_total counter");

        let admission_duration = Histogram::with_opts(
            HistogramOpts::new(
                "limitgate_admission_duration_seconds",
                "Admission check duration in seconds",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5]),
        )
        .expect("failed to create admission_duration histogram");

        registry
            .register(Box::new(requests_total.clone()))
            .expect("failed to register requests_total");
        registry
            .register(Box::new(requests_denied.clone()))
            .expect("failed to register requests_denied");
        registry
            .register(Box::new(degraded_total.clone()))
            .expect("failed to register degraded_total");
        registry
            .register(Box::new(admission_duration.clone()))
            .expect("failed to register admission_duration");

        Self {
            registry,
            requests_total,
            requests_denied,
            degraded_total,
            admission_duration,
        }
    }
}

impl Default for GateMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Audit sink wired into the server: every record feeds the Prometheus
/// counters, the structured log, and the in-memory log backing `/api/logs`.
pub struct FanoutAuditSink {
    log: Arc<MemoryAuditSink>,
    tracing: TracingAuditSink,
    requests_total: IntCounter,
    requests_denied: IntCounter,
    degraded_total: IntCounter,
    admission_duration: Histogram,
}

impl FanoutAuditSink {
    pub fn new(log: Arc<MemoryAuditSink>, metrics: &GateMetrics) -> Self {
        Self {
            log,
            tracing: TracingAuditSink,
            requests_total: metrics.requests_total.clone(),
            requests_denied: metrics.requests_denied.clone(),
            degraded_total: metrics.degraded_total.clone(),
            admission_duration: metrics.admission_duration.clone(),
        }
    }
}

impl AuditSink for FanoutAuditSink {
    fn record(&self, record: AuditRecord) {
        self.requests_total.inc();
        if !record.allowed {
            self.requests_denied.inc();
        }
        if record.degraded {
            self.degraded_total.inc();
        }
        self.admission_duration
            .observe(record.response_time_ms as f64 / 1000.0);

        self.tracing.record(record.clone());
        self.log.record(record);
    }
}
