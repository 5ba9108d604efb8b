//! Checkpoint metadata and trait definitions.

use crate::policy::LstmLanguageModel;
use crate::training::RewardStats;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Trait for models that can be checkpointed.
pub trait Checkpointable {
    /// Write the model's parameters to `path`.
    fn save_checkpoint(&self, path: &Path) -> Result<()>;

    /// Restore the model's parameters from `path`.
    fn load_checkpoint(&mut self, path: &Path) -> Result<()>;
}

impl Checkpointable for LstmLanguageModel {
    fn save_checkpoint(&self, path: &Path) -> Result<()> {
        self.save(path)
    }

    fn load_checkpoint(&mut self, path: &Path) -> Result<()> {
        self.load_weights(path)
    }
}

/// Everything recorded about a checkpoint besides the weights.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CheckpointMetadata {
    /// Epoch that produced the weights (1-based)
    pub epoch: usize,
    /// Validation loss after the epoch
    pub valid_loss: f64,
    /// Learning rate after annealing
    pub learning_rate: f64,
    /// Mixing coefficient used in training
    pub alpha: f64,
    /// Greedy evaluation reward mean, when the evaluator ran
    pub reward_mean: Option<f64>,
    pub reward_std: Option<f64>,
    /// Seconds since the Unix epoch
    pub timestamp: String,
    /// Library version
    pub version: String,
}

impl CheckpointMetadata {
    pub fn new(epoch: usize, valid_loss: f64, learning_rate: f64, alpha: f64) -> Self {
        Self {
            epoch,
            valid_loss,
            learning_rate,
            alpha,
            reward_mean: None,
            reward_std: None,
            timestamp: crate::utils::unix_timestamp(),
            version: crate::VERSION.to_string(),
        }
    }

    /// Attach evaluator statistics.
    pub fn with_rewards(mut self, stats: &RewardStats) -> Self {
        self.reward_mean = Some(stats.mean);
        self.reward_std = Some(stats.std);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_creation() {
        let meta = CheckpointMetadata::new(3, 4.5, 10.0, 0.1);
        assert_eq!(meta.epoch, 3);
        assert!(meta.reward_mean.is_none());
        assert_eq!(meta.version, crate::VERSION);

        let stats = RewardStats {
            mean: -120.0,
            std: 4.0,
            episodes: 8,
        };
        let meta = meta.with_rewards(&stats);
        assert_eq!(meta.reward_mean, Some(-120.0));
        assert_eq!(meta.reward_std, Some(4.0));
    }

    #[test]
    fn test_metadata_serialization() {
        let meta = CheckpointMetadata::new(7, 5.25, 2.5, 0.5);
        let json = serde_json::to_string(&meta).unwrap();
        let restored: CheckpointMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(meta, restored);
    }
}
