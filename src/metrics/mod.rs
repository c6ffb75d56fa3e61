mod server;

use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts,
    Registry,
};

pub use server::{start_metrics_server, MetricsState};

use crate::utils::CircuitState;

// ============================================================================
// Metrics Module - Prometheus metrics for the order service
// ============================================================================
//
// Covers:
// - Order workflow outcomes and latency
// - Inventory call latency
// - Stock left decremented by aborted workflows, and compensation outcomes
// - Event publication outcomes
// - Circuit breaker states
//
// Scraped from GET /metrics on the metrics port.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Workflow
    pub orders_created: IntCounter,
    pub order_failures: IntCounterVec,
    pub workflow_duration: Histogram,

    // Inventory
    pub catalog_call_duration: HistogramVec,
    pub stock_divergence: IntCounter,
    pub stock_compensations: IntCounterVec,

    // Events
    pub events_published: IntCounterVec,
    pub events_failed: IntCounterVec,

    // Circuit breakers
    pub circuit_breaker_state: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("orders_created_total", "Orders committed by the workflow")?;
        registry.register(Box::new(orders_created.clone()))?;

        let order_failures = IntCounterVec::new(
            Opts::new("order_failures_total", "Order creations aborted, by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(order_failures.clone()))?;

        let workflow_duration = Histogram::with_opts(
            HistogramOpts::new("order_workflow_duration_seconds", "End-to-end order creation latency")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;
        registry.register(Box::new(workflow_duration.clone()))?;

        let catalog_call_duration = HistogramVec::new(
            HistogramOpts::new("catalog_call_duration_seconds", "Inventory RPC latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 3.0]),
            &["operation"],
        )?;
        registry.register(Box::new(catalog_call_duration.clone()))?;

        let stock_divergence = IntCounter::new(
            "stock_divergence_total",
            "Stock decrements left applied by aborted order workflows",
        )?;
        registry.register(Box::new(stock_divergence.clone()))?;

        let stock_compensations = IntCounterVec::new(
            Opts::new("stock_compensations_total", "Restock attempts after aborted workflows"),
            &["outcome"],
        )?;
        registry.register(Box::new(stock_compensations.clone()))?;

        let events_published = IntCounterVec::new(
            Opts::new("events_published_total", "Order events handed to the broker"),
            &["subject"],
        )?;
        registry.register(Box::new(events_published.clone()))?;

        let events_failed = IntCounterVec::new(
            Opts::new("events_failed_total", "Order events dropped after a publish failure"),
            &["subject", "reason"],
        )?;
        registry.register(Box::new(events_failed.clone()))?;

        let circuit_breaker_state = IntGaugeVec::new(
            Opts::new("circuit_breaker_state", "Circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)"),
            &["breaker"],
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            order_failures,
            workflow_duration,
            catalog_call_duration,
            stock_divergence,
            stock_compensations,
            events_published,
            events_failed,
            circuit_breaker_state,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_order_created(&self, duration_secs: f64) {
        self.orders_created.inc();
        self.workflow_duration.observe(duration_secs);
    }

    pub fn record_order_failure(&self, reason: &str, duration_secs: f64) {
        self.order_failures.with_label_values(&[reason]).inc();
        self.workflow_duration.observe(duration_secs);
    }

    pub fn record_catalog_call(&self, operation: &str, duration_secs: f64) {
        self.catalog_call_duration
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    pub fn record_stock_divergence(&self, decrements: usize) {
        self.stock_divergence.inc_by(decrements as u64);
    }

    pub fn record_compensation(&self, success: bool) {
        let outcome = if success { "restocked" } else { "failed" };
        self.stock_compensations.with_label_values(&[outcome]).inc();
    }

    pub fn record_event_published(&self, subject: &str) {
        self.events_published.with_label_values(&[subject]).inc();
    }

    pub fn record_event_failed(&self, subject: &str, reason: &str) {
        self.events_failed.with_label_values(&[subject, reason]).inc();
    }

    pub fn set_circuit_state(&self, breaker: &str, state: CircuitState) {
        self.circuit_breaker_state
            .with_label_values(&[breaker])
            .set(state.as_gauge());
    }

    pub fn circuit_state(&self, breaker: &str) -> i64 {
        self.circuit_breaker_state.with_label_values(&[breaker]).get()
    }
}
