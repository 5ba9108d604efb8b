//! Metric logger traits and composites.

use std::collections::BTreeMap;

/// Named values logged together at one step, in name order
pub type Metrics = BTreeMap<&'static str, f64>;

/// Trait for logging training metrics to various backends.
///
/// `step` is the global batch index for per-report metrics and the epoch
/// index for per-epoch metrics.
pub trait MetricLogger: Send + Sync {
    /// Log a scalar value (e.g. validation loss).
    fn log_scalar(&self, name: &str, value: f64, step: u64);

    /// Log a group of metrics under a common prefix (`prefix/name`).
    fn log_metrics(&self, prefix: &str, metrics: &Metrics, step: u64) {
        for (name, value) in metrics {
            self.log_scalar(&format!("{}/{}", prefix, name), *value, step);
        }
    }

    /// Close the logger and flush any pending writes.
    fn close(&self) {}
}

/// A logger that does nothing (default).
pub struct NoOpLogger;

impl MetricLogger for NoOpLogger {
    fn log_scalar(&self, _name: &str, _value: f64, _step: u64) {}
    fn log_metrics(&self, _prefix: &str, _metrics: &Metrics, _step: u64) {}
}

/// A composite logger that dispatches to multiple backends.
#[derive(Default)]
pub struct CompositeLogger {
    loggers: Vec<Box<dyn MetricLogger>>,
}

impl CompositeLogger {
    pub fn new(loggers: Vec<Box<dyn MetricLogger>>) -> Self {
        Self { loggers }
    }

    pub fn add(&mut self, logger: Box<dyn MetricLogger>) {
        self.loggers.push(logger);
    }

    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

impl MetricLogger for CompositeLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        for logger in &self.loggers {
            logger.log_scalar(name, value, step);
        }
    }

    fn log_metrics(&self, prefix: &str, metrics: &Metrics, step: u64) {
        for logger in &self.loggers {
            logger.log_metrics(prefix, metrics, step);
        }
    }

    fn close(&self) {
        for logger in &self.loggers {
            logger.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<(String, f64, u64)>>>);

    impl MetricLogger for Capture {
        fn log_scalar(&self, name: &str, value: f64, step: u64) {
            self.0.lock().unwrap().push((name.to_string(), value, step));
        }
    }

    #[test]
    fn test_default_log_metrics_prefixes_names() {
        let capture = Capture::default();
        let metrics: Metrics = [("lm_loss", 5.0), ("loss", 4.0)].into_iter().collect();
        capture.log_metrics("train", &metrics, 3);

        let seen = capture.0.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("train/lm_loss".to_string(), 5.0, 3),
                ("train/loss".to_string(), 4.0, 3)
            ]
        );
    }

    #[test]
    fn test_composite_fans_out() {
        let a = Capture::default();
        let b = Capture::default();
        let mut composite = CompositeLogger::new(vec![Box::new(a.clone())]);
        composite.add(Box::new(b.clone()));
        composite.add(Box::new(NoOpLogger));
        assert_eq!(composite.len(), 3);

        composite.log_scalar("valid/loss", 4.2, 1);
        assert_eq!(a.0.lock().unwrap().len(), 1);
        assert_eq!(b.0.lock().unwrap().len(), 1);
        composite.close();
    }
}
