//! Greedy evaluation and validation loss.

use super::reinforce::Reinforce;
use super::rollout::RolloutMode;
use crate::data::BatchedSplit;
use crate::policy::{cross_entropy, SequenceModel};
use crate::{ReinforceError, Result};
use serde::{Deserialize, Serialize};

/// Mean and population standard deviation of greedy episode rewards
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RewardStats {
    pub mean: f64,
    pub std: f64,
    pub episodes: usize,
}

/// Runs the policy greedily over held-out windows
#[derive(Clone, Copy, Debug)]
pub struct Evaluator {
    episodes: usize,
}

impl Evaluator {
    pub fn new(episodes: usize) -> Self {
        Self { episodes }
    }

    pub fn episodes(&self) -> usize {
        self.episodes
    }

    /// One greedy episode per window, cycling over `split` until `episodes` are collected.
    pub fn evaluate<M: SequenceModel>(
        &self,
        reinforce: &Reinforce<M>,
        split: &BatchedSplit,
    ) -> Result<RewardStats> {
        if self.episodes == 0 {
            return Err(ReinforceError::config("evaluation needs at least one episode"));
        }

        let windows = split.num_windows();
        let mut rewards = Vec::with_capacity(self.episodes);
        for i in 0..self.episodes {
            let (inputs, targets) = split.window(i % windows)?;
            let episode = reinforce.generate_episode(&inputs, &targets, RolloutMode::Evaluation)?;
            rewards.push(episode.total_reward);
        }

        let (mean, std) = mean_std(&rewards);
        tracing::debug!(episodes = self.episodes, mean, std, "Greedy evaluation");
        Ok(RewardStats {
            mean,
            std,
            episodes: self.episodes,
        })
    }
}

/// Token-weighted mean teacher-forced cross-entropy over every window of `split`.
///
/// Each window starts from a zero hidden state.
pub fn validation_loss<M: SequenceModel + ?Sized>(model: &M, split: &BatchedSplit) -> Result<f64> {
    tch::no_grad(|| {
        let mut total = 0.0;
        let mut tokens = 0i64;
        for window in split.windows() {
            let (inputs, targets) = window?;
            let count = inputs.numel() as i64;
            let hidden = model.init_hidden(split.batch_size());
            let (logits, _) = model.forward_sequence(&inputs, &hidden)?;
            total += cross_entropy(&logits, &targets)?.double_value(&[]) * count as f64;
            tokens += count;
        }
        Ok(total / tokens as f64)
    })
}

/// Mean and population standard deviation; `(0, 0)` for an empty slice
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}
