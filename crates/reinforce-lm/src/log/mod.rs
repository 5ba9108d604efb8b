//! Metric logging and the durable results record.
//!
//! Provides:
//! - `MetricLogger` trait for composable backends
//! - `ConsoleLogger` for structured `tracing` output
//! - `TensorBoardLogger` for visualization (optional)
//! - `CompositeLogger` for multi-backend logging
//! - `Recorder` for the append-only `(label, alpha, loss)` results file

mod console;
mod logger;
mod recorder;
#[cfg(feature = "tensorboard")]
mod tensorboard;

pub use console::ConsoleLogger;
pub use logger::{CompositeLogger, MetricLogger, Metrics, NoOpLogger};
pub use recorder::Recorder;
#[cfg(feature = "tensorboard")]
pub use tensorboard::TensorBoardLogger;
