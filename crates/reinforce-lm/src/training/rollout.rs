//! Episode rollout over hidden-state actions.

use crate::policy::{cross_entropy, GaussianPolicy, HiddenState, SequenceModel};
use crate::{ReinforceError, Result};
use tch::Tensor;

/// How actions are chosen during a rollout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RolloutMode {
    /// Sample the next hidden state from the Gaussian policy
    Training,
    /// Take the mean (greedy, no sampling, no gradient tracking)
    Evaluation,
}

/// One trajectory over a window of tokens.
///
/// `actions`, `log_probs` and `rewards` always share the same length.
pub struct Episode {
    /// Hidden state chosen at every step
    pub actions: Vec<HiddenState>,
    /// Log-density of every action (scalar tensors, differentiable in training mode)
    pub log_probs: Vec<Tensor>,
    /// Per-step reward `-CE(output_t, target_t)`
    pub rewards: Vec<f64>,
    pub total_reward: f64,
}

impl Episode {
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }
}

/// Drive `model` over `inputs [T, B]`, scoring each step against `targets [T, B]`.
pub fn generate_episode<M: SequenceModel + ?Sized>(
    model: &M,
    policy: &GaussianPolicy,
    inputs: &Tensor,
    targets: &Tensor,
    mode: RolloutMode,
) -> Result<Episode> {
    check_window(inputs, targets)?;

    match mode {
        RolloutMode::Training => rollout(model, policy, inputs, targets, mode),
        RolloutMode::Evaluation => tch::no_grad(|| rollout(model, policy, inputs, targets, mode)),
    }
}

/// Validate a `[T, B]` token window, returning `(T, B)`.
pub(crate) fn check_window(inputs: &Tensor, targets: &Tensor) -> Result<(i64, i64)> {
    if inputs.dim() != 2 || targets.dim() != 2 {
        return Err(ReinforceError::ShapeMismatch {
            expected: vec![vec![-1, -1], vec![-1, -1]],
            actual: vec![inputs.size(), targets.size()],
        });
    }
    let (steps, batch) = (inputs.size()[0], inputs.size()[1]);
    if steps != targets.size()[0] {
        return Err(ReinforceError::LengthMismatch {
            inputs: steps,
            targets: targets.size()[0],
        });
    }
    Ok((steps, batch))
}

fn rollout<M: SequenceModel + ?Sized>(
    model: &M,
    policy: &GaussianPolicy,
    inputs: &Tensor,
    targets: &Tensor,
    mode: RolloutMode,
) -> Result<Episode> {
    let steps = inputs.size()[0];
    let mut hidden = model.init_hidden(inputs.size()[1]);

    let mut actions = Vec::with_capacity(steps as usize);
    let mut log_probs = Vec::with_capacity(steps as usize);
    let mut rewards = Vec::with_capacity(steps as usize);

    for t in 0..steps {
        let (logits, mu) = model.step(&inputs.get(t), &hidden)?;
        hidden.ensure_same_shape(&mu)?;

        let (action, log_prob) = match mode {
            RolloutMode::Training => {
                let action = policy.sample_state(&mu);
                let log_prob = policy.log_prob_state(&mu, &action)?;
                (action, log_prob)
            }
            RolloutMode::Evaluation => {
                let zero = Tensor::from(0f32).to_device(mu.device());
                (mu, zero)
            }
        };

        let reward = -cross_entropy(&logits, &targets.get(t))?.double_value(&[]);

        actions.push(action.shallow_clone());
        log_probs.push(log_prob);
        rewards.push(reward);
        hidden = action;
    }

    let total_reward = rewards.iter().sum();
    Ok(Episode {
        actions,
        log_probs,
        rewards,
        total_reward,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{LstmConfig, LstmLanguageModel};
    use tch::Device;

    fn small_model() -> LstmLanguageModel {
        tch::manual_seed(7);
        let config = LstmConfig {
            embedding_dim: 6,
            hidden_size: 5,
            num_layers: 1,
        };
        LstmLanguageModel::new(9, config, Device::Cpu)
    }

    fn window() -> (Tensor, Tensor) {
        let tokens = Tensor::from_slice(&[1i64, 2, 3, 4, 5, 6, 7, 8, 0, 1, 2, 3]).reshape([6, 2]);
        (tokens.narrow(0, 0, 5), tokens.narrow(0, 1, 5))
    }

    #[test]
    fn test_sequences_share_length() {
        let model = small_model();
        let policy = GaussianPolicy::new(0.1).unwrap();
        let (inputs, targets) = window();

        for mode in [RolloutMode::Training, RolloutMode::Evaluation] {
            let episode = generate_episode(&model, &policy, &inputs, &targets, mode).unwrap();
            assert_eq!(episode.len(), 5);
            assert_eq!(episode.actions.len(), 5);
            assert_eq!(episode.log_probs.len(), 5);
            let sum: f64 = episode.rewards.iter().sum();
            assert!((sum - episode.total_reward).abs() < 1e-9);
            assert!(episode.rewards.iter().all(|r| *r <= 0.0));
        }
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let model = small_model();
        let policy = GaussianPolicy::new(0.5).unwrap();
        let (inputs, targets) = window();

        let a = generate_episode(&model, &policy, &inputs, &targets, RolloutMode::Evaluation)
            .unwrap();
        let b = generate_episode(&model, &policy, &inputs, &targets, RolloutMode::Evaluation)
            .unwrap();
        assert_eq!(a.total_reward, b.total_reward);
        assert!(a
            .log_probs
            .iter()
            .all(|lp| lp.double_value(&[]) == 0.0 && !lp.requires_grad()));
    }

    #[test]
    fn test_vanishing_sigma_matches_evaluation() {
        let model = small_model();
        let policy = GaussianPolicy::new(1e-8).unwrap();
        let (inputs, targets) = window();

        let greedy = generate_episode(&model, &policy, &inputs, &targets, RolloutMode::Evaluation)
            .unwrap();
        let sampled = generate_episode(&model, &policy, &inputs, &targets, RolloutMode::Training)
            .unwrap();
        assert!((greedy.total_reward - sampled.total_reward).abs() < 1e-4);
    }

    #[test]
    fn test_training_log_probs_carry_gradient() {
        let model = small_model();
        let policy = GaussianPolicy::new(0.1).unwrap();
        let (inputs, targets) = window();

        let episode =
            generate_episode(&model, &policy, &inputs, &targets, RolloutMode::Training).unwrap();
        assert!(episode.log_probs.iter().all(|lp| lp.requires_grad()));
        assert!(episode
            .actions
            .iter()
            .all(|a| a.tensors().iter().all(|t| !t.requires_grad())));
    }

    /// Steps return a state with one extra batch row.
    struct Reshaping(LstmLanguageModel);

    impl SequenceModel for Reshaping {
        fn init_hidden(&self, batch_size: i64) -> HiddenState {
            self.0.init_hidden(batch_size)
        }

        fn step(&self, tokens: &Tensor, hidden: &HiddenState) -> Result<(Tensor, HiddenState)> {
            let (logits, next) = self.0.step(tokens, hidden)?;
            let widened = next
                .tensors()
                .iter()
                .map(|t| Tensor::cat(&[t, &t.narrow(1, 0, 1)], 1))
                .collect();
            Ok((logits, HiddenState::new(widened)))
        }

        fn vocab_size(&self) -> i64 {
            self.0.vocab_size()
        }
    }

    #[test]
    fn test_rejects_step_that_changes_hidden_shape() {
        let model = Reshaping(small_model());
        let policy = GaussianPolicy::new(0.1).unwrap();
        let (inputs, targets) = window();

        for mode in [RolloutMode::Training, RolloutMode::Evaluation] {
            match generate_episode(&model, &policy, &inputs, &targets, mode) {
                Err(ReinforceError::ShapeMismatch { expected, actual }) => {
                    assert_eq!(expected[0], vec![1, 2, 5]);
                    assert_eq!(actual[0], vec![1, 3, 5]);
                }
                _ => panic!("Expected shape mismatch"),
            }
        }
    }

    #[test]
    fn test_rejects_flat_tokens() {
        let model = small_model();
        let policy = GaussianPolicy::new(0.1).unwrap();
        let flat = Tensor::from_slice(&[1i64, 2]);

        let result = generate_episode(&model, &policy, &flat, &flat, RolloutMode::Training);
        assert!(matches!(result, Err(ReinforceError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_length_mismatch() {
        let model = small_model();
        let policy = GaussianPolicy::new(0.1).unwrap();
        let (inputs, targets) = window();

        let result = generate_episode(
            &model,
            &policy,
            &inputs,
            &targets.narrow(0, 0, 4),
            RolloutMode::Training,
        );
        assert!(matches!(
            result,
            Err(ReinforceError::LengthMismatch {
                inputs: 5,
                targets: 4
            })
        ));
    }
}
