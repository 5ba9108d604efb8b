//! TensorBoard event-file backend.

use super::{MetricLogger, Metrics};
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Writes every metric as a TensorBoard scalar.
///
/// Report metrics land under `train/*` indexed by global batch, epoch metrics
/// under `valid/*` indexed by epoch, so the two families get separate charts.
pub struct TensorBoardLogger {
    log_dir: PathBuf,
    writer: Mutex<SummaryWriter>,
}

impl TensorBoardLogger {
    /// Open an event file in `log_dir`, creating the directory if needed
    pub fn new(log_dir: impl AsRef<Path>) -> Result<Self> {
        let log_dir = log_dir.as_ref().to_path_buf();
        fs::create_dir_all(&log_dir)?;
        let writer = SummaryWriter::new(&log_dir);
        Ok(Self {
            log_dir,
            writer: Mutex::new(writer),
        })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

impl MetricLogger for TensorBoardLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        if let Ok(mut writer) = self.writer.lock() {
            writer.add_scalar(name, value as f32, step as usize);
        }
    }

    fn log_metrics(&self, prefix: &str, metrics: &Metrics, step: u64) {
        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        for (name, value) in metrics {
            if value.is_finite() {
                writer.add_scalar(&format!("{}/{}", prefix, name), *value as f32, step as usize);
            } else {
                tracing::warn!(prefix, name, step, "Skipping non-finite metric");
            }
        }
        // One flush per report or epoch
        writer.flush();
    }

    fn close(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            writer.flush();
        }
    }
}
