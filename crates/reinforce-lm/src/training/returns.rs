//! REINFORCE utilities.

use crate::{ReinforceError, Result};
use tch::Tensor;

/// Compute discounted returns-to-go
///
/// # Arguments
/// * `rewards` - Per-step rewards `r_0 .. r_{T-1}`
/// * `gamma` - Discount factor
///
/// # Returns
/// `R_t = sum_{k >= t} gamma^(k - t) * r_k`, same length as `rewards`
pub fn discounted_returns(rewards: &[f64], gamma: f64) -> Vec<f64> {
    let mut returns = vec![0.0; rewards.len()];
    let mut acc = 0.0;
    for t in (0..rewards.len()).rev() {
        acc = rewards[t] + gamma * acc;
        returns[t] = acc;
    }
    returns
}

/// Score-function objective `sum_t R_t * log_prob_t`.
///
/// Returns are constants; gradients flow only through `log_probs`.
pub fn reinforce_objective(returns: &[f64], log_probs: &[Tensor]) -> Result<Tensor> {
    if returns.len() != log_probs.len() {
        return Err(ReinforceError::LengthMismatch {
            inputs: log_probs.len() as i64,
            targets: returns.len() as i64,
        });
    }
    let Some(first) = log_probs.first() else {
        return Ok(Tensor::from(0f32));
    };

    let mut total = Tensor::from(0f32).to_device(first.device());
    for (ret, log_prob) in returns.iter().zip(log_probs) {
        total = total + log_prob * *ret;
    }
    Ok(total)
}

/// Policy-gradient loss to minimise: the negated REINFORCE objective
pub fn policy_gradient_loss(returns: &[f64], log_probs: &[Tensor]) -> Result<Tensor> {
    Ok(-reinforce_objective(returns, log_probs)?)
}

/// `alpha * pg + (1 - alpha) * lm`
pub fn composite_loss(policy_gradient: &Tensor, language_model: &Tensor, alpha: f64) -> Tensor {
    policy_gradient * alpha + language_model * (1.0 - alpha)
}
