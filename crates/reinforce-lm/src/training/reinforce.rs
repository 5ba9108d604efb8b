//! REINFORCE over hidden-state actions blended with the supervised LM loss.

use super::returns::{composite_loss, discounted_returns, policy_gradient_loss};
use super::rollout::{check_window, generate_episode, Episode, RolloutMode};
use crate::policy::{cross_entropy, GaussianPolicy, SequenceModel};
use crate::{ReinforceError, Result};
use tch::Tensor;

/// Loss terms for one batch
pub struct LossBreakdown {
    /// `alpha * pg + (1 - alpha) * lm`, the tensor to backpropagate
    pub total: Tensor,
    pub policy_gradient: f64,
    pub language_model: f64,
    /// Total rollout reward, absent when the rollout was skipped (`alpha == 0`)
    pub total_reward: Option<f64>,
}

/// A sequence model paired with the Gaussian hidden-state policy
pub struct Reinforce<M: SequenceModel> {
    model: M,
    policy: GaussianPolicy,
    gamma: f64,
}

impl<M: SequenceModel> Reinforce<M> {
    pub fn new(model: M, policy: GaussianPolicy, gamma: f64) -> Result<Self> {
        if !(gamma > 0.0 && gamma <= 1.0) {
            return Err(ReinforceError::config(format!(
                "gamma must lie in (0, 1], got {}",
                gamma
            )));
        }
        Ok(Self {
            model,
            policy,
            gamma,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn policy(&self) -> &GaussianPolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: GaussianPolicy) {
        self.policy = policy;
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn generate_episode(
        &self,
        inputs: &Tensor,
        targets: &Tensor,
        mode: RolloutMode,
    ) -> Result<Episode> {
        generate_episode(&self.model, &self.policy, inputs, targets, mode)
    }

    /// Teacher-forced cross-entropy from a zero hidden state
    pub fn language_model_loss(&self, inputs: &Tensor, targets: &Tensor) -> Result<Tensor> {
        let (_, batch) = check_window(inputs, targets)?;
        let hidden = self.model.init_hidden(batch);
        let (logits, _) = self.model.forward_sequence(inputs, &hidden)?;
        cross_entropy(&logits, targets)
    }

    /// Policy-gradient loss of one sampled episode
    pub fn episode_loss(&self, episode: &Episode) -> Result<Tensor> {
        let returns = discounted_returns(&episode.rewards, self.gamma);
        policy_gradient_loss(&returns, &episode.log_probs)
    }

    /// Composite training loss for one window.
    ///
    /// The rollout is skipped when `alpha == 0`; the LM loss is always computed.
    pub fn loss(&self, inputs: &Tensor, targets: &Tensor, alpha: f64) -> Result<LossBreakdown> {
        let lm = self.language_model_loss(inputs, targets)?;

        let (pg, total_reward) = if alpha > 0.0 {
            let episode = self.generate_episode(inputs, targets, RolloutMode::Training)?;
            (self.episode_loss(&episode)?, Some(episode.total_reward))
        } else {
            (Tensor::from(0f32).to_device(lm.device()), None)
        };

        Ok(LossBreakdown {
            policy_gradient: pg.double_value(&[]),
            language_model: lm.double_value(&[]),
            total: composite_loss(&pg, &lm, alpha),
            total_reward,
        })
    }
}
