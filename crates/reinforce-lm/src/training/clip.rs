//! Weight clipping.

use crate::{ReinforceError, Result};
use tch::nn;

/// Clamp every trainable value in `vs` into `[lower, upper]` in place.
pub fn clip_weights(vs: &nn::VarStore, lower: f64, upper: f64) -> Result<()> {
    if lower > upper {
        return Err(ReinforceError::config(format!(
            "weight clip lower bound {} exceeds upper bound {}",
            lower, upper
        )));
    }
    tch::no_grad(|| -> Result<()> {
        for mut var in vs.trainable_variables() {
            var.f_clamp_(lower, upper)?;
        }
        Ok(())
    })
}
