//! Metrics collection for the API service.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Service metrics for observability
///
/// Each instance owns its own [`Registry`], so several routers can coexist in
/// one process (as they do in tests).
pub struct ServiceMetrics {
    registry: Registry,

    pub webhook_requests_total: IntCounter,
    pub webhook_outcomes_total: IntCounterVec,
    pub webhook_duration_seconds: Histogram,
    pub signature_failures_total: IntCounter,
    pub directory_failures_total: IntCounter,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let webhook_requests_total = IntCounter::new(
            "webhook_requests_total",
            "Total webhook requests received",
        )?;
        let webhook_outcomes_total = IntCounterVec::new(
            Opts::new(
                "webhook_outcomes_total",
                "Webhook deliveries by final outcome",
            ),
            &["outcome"],
        )?;
        let webhook_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "webhook_duration_seconds",
                "Webhook processing time distribution",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        let signature_failures_total = IntCounter::new(
            "signature_failures_total",
            "Webhook deliveries rejected for an invalid signature",
        )?;
        let directory_failures_total = IntCounter::new(
            "directory_failures_total",
            "Directory lookups or note writes that failed",
        )?;

        registry.register(Box::new(webhook_requests_total.clone()))?;
        registry.register(Box::new(webhook_outcomes_total.clone()))?;
        registry.register(Box::new(webhook_duration_seconds.clone()))?;
        registry.register(Box::new(signature_failures_total.clone()))?;
        registry.register(Box::new(directory_failures_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            webhook_requests_total,
            webhook_outcomes_total,
            webhook_duration_seconds,
            signature_failures_total,
            directory_failures_total,
        }))
    }

    /// Count one finished delivery under `outcome`.
    pub fn record_outcome(&self, outcome: &str) {
        self.webhook_outcomes_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Render every registered metric in the text exposition format.
    pub fn gather_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
