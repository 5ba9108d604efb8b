//! Sequence models and the hidden-state policy.
//!
//! Provides:
//! - `SequenceModel` - one-step and teacher-forced forward passes over tokens
//! - `LstmLanguageModel` - the concrete embedding/LSTM/decoder model
//! - `GaussianPolicy` - isotropic Gaussian over the next hidden state

mod gaussian;
mod lstm;

pub use gaussian::GaussianPolicy;
pub use lstm::{LstmConfig, LstmLanguageModel};

use crate::{ReinforceError, Result};
use tch::{nn, Device, Kind, Tensor};

/// Trait for models that have a VarStore for optimization
pub trait HasVarStore {
    /// Get mutable reference to the VarStore
    fn var_store_mut(&mut self) -> &mut nn::VarStore;

    /// Get reference to the VarStore
    fn var_store(&self) -> &nn::VarStore;
}

/// Recurrent state of a sequence model.
///
/// An ordered list of tensors (for an LSTM: `h` then `c`). It is replaced, never
/// mutated, at every rollout step.
pub struct HiddenState {
    tensors: Vec<Tensor>,
}

impl HiddenState {
    pub fn new(tensors: Vec<Tensor>) -> Self {
        Self { tensors }
    }

    pub fn tensors(&self) -> &[Tensor] {
        &self.tensors
    }

    pub fn into_tensors(self) -> Vec<Tensor> {
        self.tensors
    }

    /// Shapes of every component, in order
    pub fn shapes(&self) -> Vec<Vec<i64>> {
        self.tensors.iter().map(|t| t.size()).collect()
    }

    /// Total number of scalar elements across all components
    pub fn numel(&self) -> usize {
        self.tensors.iter().map(|t| t.numel()).sum()
    }

    pub fn device(&self) -> Device {
        self.tensors
            .first()
            .map(|t| t.device())
            .unwrap_or(Device::Cpu)
    }

    pub fn shallow_clone(&self) -> Self {
        Self::new(self.tensors.iter().map(|t| t.shallow_clone()).collect())
    }

    pub fn detach(&self) -> Self {
        Self::new(self.tensors.iter().map(|t| t.detach()).collect())
    }

    /// Fail with `ShapeMismatch` unless `other` has exactly the same component shapes.
    pub fn ensure_same_shape(&self, other: &HiddenState) -> Result<()> {
        let expected = self.shapes();
        let actual = other.shapes();
        if expected != actual {
            return Err(ReinforceError::ShapeMismatch { expected, actual });
        }
        Ok(())
    }
}

/// Trait for token-level recurrent models driven by the rollout engine.
///
/// Token batches are `Int64` tensors; a step consumes `[batch]` tokens, a
/// sequence pass consumes `[seq_len, batch]`.
pub trait SequenceModel {
    /// Zero state for `batch_size` parallel sequences
    fn init_hidden(&self, batch_size: i64) -> HiddenState;

    /// One step: logits `[batch, vocab]` and the raw next hidden state
    fn step(&self, tokens: &Tensor, hidden: &HiddenState) -> Result<(Tensor, HiddenState)>;

    /// Number of output classes
    fn vocab_size(&self) -> i64;

    /// Teacher-forced pass over a whole window: logits `[seq_len, batch, vocab]`.
    ///
    /// The default unrolls `step`; models with a fused kernel override it.
    fn forward_sequence(
        &self,
        tokens: &Tensor,
        hidden: &HiddenState,
    ) -> Result<(Tensor, HiddenState)> {
        let seq_len = match tokens.size().first() {
            Some(&len) if tokens.dim() == 2 => len,
            _ => {
                return Err(ReinforceError::ShapeMismatch {
                    expected: vec![vec![-1, -1]],
                    actual: vec![tokens.size()],
                })
            }
        };
        let mut hidden = hidden.shallow_clone();
        let mut outputs = Vec::with_capacity(seq_len as usize);
        for t in 0..seq_len {
            let (logits, next) = self.step(&tokens.get(t), &hidden)?;
            hidden.ensure_same_shape(&next)?;
            outputs.push(logits);
            hidden = next;
        }
        Ok((Tensor::stack(&outputs, 0), hidden))
    }
}

/// Mean next-token cross-entropy of `logits [.., vocab]` against `targets [..]`.
pub fn cross_entropy(logits: &Tensor, targets: &Tensor) -> Result<Tensor> {
    let vocab = *logits
        .size()
        .last()
        .ok_or_else(|| ReinforceError::Data("logits must have a class dimension".into()))?;
    let flat_logits = logits.f_reshape([-1, vocab])?;
    let flat_targets = targets.f_reshape([-1])?.f_to_kind(Kind::Int64)?;
    if flat_logits.size()[0] != flat_targets.size()[0] {
        return Err(ReinforceError::ShapeMismatch {
            expected: vec![vec![flat_logits.size()[0]]],
            actual: vec![flat_targets.size()],
        });
    }
    Ok(flat_logits.cross_entropy_for_logits(&flat_targets))
}
