//! Isotropic Gaussian policy over hidden states.

use super::HiddenState;
use crate::{ReinforceError, Result};
use tch::{Kind, Tensor};

/// Stochastic action rule: the next hidden state is drawn from
/// `N(mu, sigma^2 I)` where `mu` is the model's raw next hidden state.
#[derive(Clone, Copy, Debug)]
pub struct GaussianPolicy {
    sigma: f64,
}

impl GaussianPolicy {
    /// Create a policy with a fixed per-dimension standard deviation.
    pub fn new(sigma: f64) -> Result<Self> {
        if !(sigma > 0.0) || !sigma.is_finite() {
            return Err(ReinforceError::config(format!(
                "sigma must be a positive finite number, got {}",
                sigma
            )));
        }
        Ok(Self { sigma })
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Log-density of `sample` under `N(mu, sigma^2 I)` summed over all elements.
    ///
    /// The normalizing constant is dropped, so the value is a log-density up to an
    /// additive constant and `log_prob(mu, mu) == 0`. Gradients flow into `mu`.
    pub fn log_prob(&self, mu: &Tensor, sample: &Tensor) -> Tensor {
        (sample - mu).pow_tensor_scalar(2.0).sum(Kind::Float) * (-0.5 / (self.sigma * self.sigma))
    }

    /// Draw one sample around `mu`. The sample carries no gradient history.
    pub fn sample(&self, mu: &Tensor) -> Tensor {
        let mu = mu.detach();
        let noise = Tensor::randn_like(&mu);
        (&mu + noise * self.sigma).detach()
    }

    /// `log_prob` summed over every component of a hidden state.
    pub fn log_prob_state(&self, mu: &HiddenState, sample: &HiddenState) -> Result<Tensor> {
        mu.ensure_same_shape(sample)?;
        let mut total = Tensor::from(0f32).to_device(mu.device());
        for (m, x) in mu.tensors().iter().zip(sample.tensors()) {
            total = total + self.log_prob(m, x);
        }
        Ok(total)
    }

    /// Sample every component of a hidden state independently.
    pub fn sample_state(&self, mu: &HiddenState) -> HiddenState {
        HiddenState::new(mu.tensors().iter().map(|m| self.sample(m)).collect())
    }
}
