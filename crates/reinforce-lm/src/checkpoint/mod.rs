//! Per-epoch checkpoints.
//!
//! Provides:
//! - `Checkpointable` trait for models whose weights can be written to and read from a path
//! - `CheckpointManager` for naming, rotation and best-model tracking
//! - `CheckpointMetadata` written as JSON next to every checkpoint

mod manager;
mod state;

pub use manager::{CheckpointConfig, CheckpointManager};
pub use state::{CheckpointMetadata, Checkpointable};
