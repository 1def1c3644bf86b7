//! Prometheus-backed agreement metrics.
//!
//! [`MetricsRegistry`] owns a namespaced Prometheus registry and the
//! strongly-typed [`AgreementMetrics`] updated by the orchestrator.

use prometheus::{self, Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};
use tracing::warn;

/// Counters and timings for agreement flows.
#[derive(Clone)]
pub struct AgreementMetrics {
    /// Orders that got past signing.
    pub orders_started: IntCounter,
    /// Orders refused before any ledger submission (balance check).
    pub orders_rejected: IntCounter,
    /// `lockPayment` submissions accepted by the ledger.
    pub payments_submitted: IntCounter,
    /// Flows that ended with decrypted files handed to the caller.
    pub deliveries: IntCounter,
    /// Waits that ended in a transport error or timeout.
    pub subscription_errors: IntCounter,
    /// Time from subscribing to an agreement event until it fired, in seconds.
    pub event_wait_seconds: Histogram,
}

impl AgreementMetrics {
    /// Registers agreement metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let c = IntCounter::with_opts(Opts::new(name, help))?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };

        let orders_started = counter(
            "agreement_orders_started",
            "Total number of signed service agreement orders",
        )?;
        let orders_rejected = counter(
            "agreement_orders_rejected",
            "Total number of orders rejected before submission",
        )?;
        let payments_submitted = counter(
            "agreement_payments_submitted",
            "Total number of lockPayment submissions accepted by the ledger",
        )?;
        let deliveries = counter(
            "agreement_deliveries",
            "Total number of agreements whose files were delivered",
        )?;
        let subscription_errors = counter(
            "agreement_subscription_errors",
            "Total number of event waits that failed or timed out",
        )?;

        let event_wait_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "agreement_event_wait_seconds",
                "Time spent waiting for agreement events in seconds",
            )
            .buckets(vec![
                0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0,
            ]),
        )?;
        registry.register(Box::new(event_wait_seconds.clone()))?;

        Ok(Self {
            orders_started,
            orders_rejected,
            payments_submitted,
            deliveries,
            subscription_errors,
            event_wait_seconds,
        })
    }
}

/// Wrapper around a Prometheus registry and the agreement metrics.
///
/// Cheap to clone; clones share the same underlying collectors.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub agreements: AgreementMetrics,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("squid".to_string()), None)?;
        let agreements = AgreementMetrics::register(&registry)?;
        Ok(Self {
            registry,
            agreements,
        })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
