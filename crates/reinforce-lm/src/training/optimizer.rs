//! Optimizer seam.

use tch::{nn, Kind, Tensor};

/// Gradient-based optimizer driven by the trainer.
pub trait PolicyOptimizer {
    /// Zero out gradients.
    fn zero_grad(&mut self);

    /// Perform an optimization step.
    fn step(&mut self);

    /// Rescale gradients so their global L2 norm is at most `max_norm`.
    /// Returns the norm before clipping.
    fn clip_grad_norm(&mut self, max_norm: f64) -> crate::Result<f64>;

    fn learning_rate(&self) -> f64;

    fn set_learning_rate(&mut self, lr: f64);
}

/// Wrapper for Torch's nn::Optimizer.
pub struct TorchOptimizer {
    inner: nn::Optimizer,
    variables: Vec<Tensor>,
    learning_rate: f64,
}

impl TorchOptimizer {
    pub fn new(inner: nn::Optimizer, variables: Vec<Tensor>, learning_rate: f64) -> Self {
        Self {
            inner,
            variables,
            learning_rate,
        }
    }

    /// Adam over every trainable variable of `vs`
    pub fn adam(vs: &nn::VarStore, learning_rate: f64) -> crate::Result<Self> {
        use tch::nn::OptimizerConfig;
        let inner = nn::Adam::default().build(vs, learning_rate)?;
        Ok(Self::new(inner, vs.trainable_variables(), learning_rate))
    }

    pub fn variables(&self) -> &[Tensor] {
        &self.variables
    }
}

impl PolicyOptimizer for TorchOptimizer {
    fn zero_grad(&mut self) {
        self.inner.zero_grad();
    }

    fn step(&mut self) {
        self.inner.step();
    }

    fn clip_grad_norm(&mut self, max_norm: f64) -> crate::Result<f64> {
        let mut global_norm = 0.0f64;
        for var in &self.variables {
            let grad = var.grad();
            if grad.defined() {
                global_norm += grad
                    .f_pow_tensor_scalar(2.0)?
                    .f_sum(Kind::Float)?
                    .f_double_value(&[])?;
            }
        }
        global_norm = global_norm.sqrt();

        if global_norm > max_norm {
            let clip_coef = max_norm / (global_norm + 1e-6);
            for var in &self.variables {
                let mut grad = var.grad();
                if grad.defined() {
                    grad.f_mul_scalar_(clip_coef)?;
                }
            }
        }
        Ok(global_norm)
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.inner.set_lr(lr);
        self.learning_rate = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    #[test]
    fn test_clip_grad_norm_rescales() {
        let vs = nn::VarStore::new(Device::Cpu);
        let w = vs.root().zeros("w", &[2]);
        let mut opt = TorchOptimizer::adam(&vs, 0.1).unwrap();

        // loss = 3 * w0 + 4 * w1, gradient norm 5
        let coeffs = Tensor::from_slice(&[3.0f32, 4.0]);
        (&w * &coeffs).sum(Kind::Float).backward();

        let norm = opt.clip_grad_norm(1.0).unwrap();
        assert!((norm - 5.0).abs() < 1e-5);

        let grad = Vec::<f32>::try_from(w.grad()).unwrap();
        let clipped = (grad[0] * grad[0] + grad[1] * grad[1]).sqrt();
        assert!((clipped - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_small_gradients_untouched() {
        let vs = nn::VarStore::new(Device::Cpu);
        let w = vs.root().zeros("w", &[1]);
        let mut opt = TorchOptimizer::adam(&vs, 0.1).unwrap();

        (&w * 0.5).sum(Kind::Float).backward();
        assert!((opt.clip_grad_norm(10.0).unwrap() - 0.5).abs() < 1e-6);
        assert_eq!(Vec::<f32>::try_from(w.grad()).unwrap(), vec![0.5]);
    }

    #[test]
    fn test_set_learning_rate() {
        let vs = nn::VarStore::new(Device::Cpu);
        let _w = vs.root().zeros("w", &[1]);
        let mut opt = TorchOptimizer::adam(&vs, 0.1).unwrap();

        opt.set_learning_rate(0.05);
        assert_eq!(opt.learning_rate(), 0.05);
    }
}
