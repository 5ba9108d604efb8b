//! Console logging backend.

use super::{MetricLogger, Metrics};

/// Logger that reports metrics through `tracing`.
#[derive(Default)]
pub struct ConsoleLogger;

impl ConsoleLogger {
    pub fn new() -> Self {
        Self
    }
}

impl MetricLogger for ConsoleLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        tracing::info!(step, name, value, "Metric");
    }

    fn log_metrics(&self, prefix: &str, metrics: &Metrics, step: u64) {
        // One line per group
        let fields = metrics
            .iter()
            .map(|(name, value)| format!("{}={:.4}", name, value))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(step, "{} {}", prefix, fields);
    }
}
