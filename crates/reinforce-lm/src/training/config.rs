//! Trainer configuration.

use crate::{ReinforceError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tch::Device;

/// Configuration for the REINFORCE trainer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReinforceConfig {
    // Optimization
    /// Initial learning rate
    pub learning_rate: f64,
    /// Gradient norm bound (None disables clipping)
    pub clip: Option<f64>,
    /// Number of passes over the training split
    pub epochs: usize,
    /// Parallel sequences per batch
    pub batch_size: i64,
    /// Truncated BPTT window (episode length)
    pub bptt: i64,

    // Policy gradient
    /// Standard deviation of the hidden-state policy
    pub sigma: f64,
    /// Discount factor
    pub gamma: f64,
    /// Weight of the policy-gradient term (1 - alpha goes to the LM loss)
    pub alpha: f64,

    // Reporting
    /// Batches between aggregate loss reports
    pub report_interval: usize,
    /// Greedy episodes run on the validation split after every epoch (0 disables)
    pub eval_episodes: usize,
    /// Show a progress bar over the batches of an epoch
    pub show_progress: bool,

    // Checkpointing
    /// Directory for per-epoch checkpoints
    pub checkpoint_dir: PathBuf,
    /// Keep only the last N checkpoints (0 = keep all)
    pub keep_last: usize,

    /// Clamp every weight into `[lower, upper]` after each step
    pub weight_clip: Option<(f64, f64)>,

    // Device
    /// Device to train on
    #[serde(skip, default = "default_device")]
    pub device: Device,

    // Random seed
    pub seed: u64,
}

fn default_device() -> Device {
    Device::Cpu
}

impl Default for ReinforceConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            clip: Some(0.25),
            epochs: 40,
            batch_size: 20,
            bptt: 200,

            sigma: 0.01,
            gamma: 1.0,
            alpha: 0.1,

            report_interval: 50,
            eval_episodes: 0,
            show_progress: false,

            checkpoint_dir: PathBuf::from("checkpoints"),
            keep_last: 0,

            weight_clip: None,

            device: Device::Cpu,
            seed: 1111,
        }
    }
}

impl ReinforceConfig {
    /// Create config for CUDA device
    pub fn cuda(mut self) -> Self {
        self.device = Device::Cuda(0);
        self
    }

    /// Set learning rate
    pub fn with_lr(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set number of epochs
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Set policy standard deviation
    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    /// Set mixing coefficient
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set discount factor
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set batch size and BPTT window
    pub fn with_batching(mut self, batch_size: i64, bptt: i64) -> Self {
        self.batch_size = batch_size;
        self.bptt = bptt;
        self
    }

    /// Set checkpoint directory
    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = dir.into();
        self
    }

    /// Reject hyperparameters that cannot train
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(ReinforceError::Config(msg));

        if !(self.sigma > 0.0) || !self.sigma.is_finite() {
            return fail(format!("sigma must be > 0, got {}", self.sigma));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return fail(format!("alpha must lie in [0, 1], got {}", self.alpha));
        }
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return fail(format!("gamma must lie in (0, 1], got {}", self.gamma));
        }
        if !(self.learning_rate > 0.0) {
            return fail(format!(
                "learning rate must be > 0, got {}",
                self.learning_rate
            ));
        }
        if let Some(clip) = self.clip {
            if !(clip >= 0.0) {
                return fail(format!("gradient clip must be >= 0, got {}", clip));
            }
        }
        if let Some((lower, upper)) = self.weight_clip {
            if lower > upper {
                return fail(format!(
                    "weight clip lower bound {} exceeds upper bound {}",
                    lower, upper
                ));
            }
        }
        if self.batch_size <= 0 || self.bptt <= 0 {
            return fail(format!(
                "batch size and bptt must be positive, got {} and {}",
                self.batch_size, self.bptt
            ));
        }
        if self.epochs == 0 {
            return fail("epochs must be at least 1".to_string());
        }
        if self.report_interval == 0 {
            return fail("report interval must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ReinforceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_hyperparameters() {
        let base = ReinforceConfig::default();
        assert!(base.clone().with_sigma(0.0).validate().is_err());
        assert!(base.clone().with_alpha(1.5).validate().is_err());
        assert!(base.clone().with_alpha(-0.1).validate().is_err());
        assert!(base.clone().with_gamma(0.0).validate().is_err());
        assert!(base.clone().with_gamma(1.1).validate().is_err());
        assert!(base.clone().with_lr(0.0).validate().is_err());
        assert!(base.clone().with_epochs(0).validate().is_err());
        assert!(base.clone().with_batching(0, 10).validate().is_err());

        let mut clipped = base.clone();
        clipped.weight_clip = Some((1.0, -1.0));
        assert!(clipped.validate().is_err());

        let mut no_grad_clip = base;
        no_grad_clip.clip = None;
        assert!(no_grad_clip.validate().is_ok());
    }

    #[test]
    fn test_alpha_bounds_are_inclusive() {
        let base = ReinforceConfig::default();
        assert!(base.clone().with_alpha(0.0).validate().is_ok());
        assert!(base.with_alpha(1.0).validate().is_ok());
    }

    #[test]
    fn test_serialization_skips_device() {
        let config = ReinforceConfig::default().with_lr(0.5);
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("device"));

        let restored: ReinforceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.learning_rate, 0.5);
        assert_eq!(restored.device, Device::Cpu);
    }
}
