//! Training controller state.

use serde::{Deserialize, Serialize};

/// Controller phase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerPhase {
    Running,
    /// The last validation loss regressed and the learning rate was halved
    Annealed,
    Done,
}

/// Outcome of observing a validation loss
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AnnealDecision {
    Kept,
    Halved { from: f64, to: f64 },
}

/// Running sums between two reports
#[derive(Clone, Debug, Default)]
pub struct BatchAccumulator {
    pub loss: f64,
    pub lm_loss: f64,
    pub reward: f64,
    /// Batches that produced a rollout reward
    pub rewarded: usize,
    pub batches: usize,
}

/// Aggregate statistics emitted at the report cadence
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BatchReport {
    pub mean_loss: f64,
    pub mean_lm_loss: f64,
    pub mean_reward: Option<f64>,
    pub batches: usize,
}

/// Mutable state of one training run
#[derive(Clone, Debug)]
pub struct TrainingState {
    /// Epochs completed
    pub epoch: usize,
    /// Validation losses in observation order, baseline first
    pub valid_history: Vec<f64>,
    pub learning_rate: f64,
    pub phase: ControllerPhase,
    pub accumulator: BatchAccumulator,
}

impl TrainingState {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            epoch: 0,
            valid_history: Vec::new(),
            learning_rate,
            phase: ControllerPhase::Running,
            accumulator: BatchAccumulator::default(),
        }
    }

    pub fn last_valid_loss(&self) -> Option<f64> {
        self.valid_history.last().copied()
    }

    /// Append `loss` to the history, halving the learning rate when it is
    /// worse than the previous entry.
    pub fn observe_validation(&mut self, loss: f64) -> AnnealDecision {
        let decision = match self.last_valid_loss() {
            Some(previous) if loss > previous => {
                let from = self.learning_rate;
                self.learning_rate /= 2.0;
                self.phase = ControllerPhase::Annealed;
                AnnealDecision::Halved {
                    from,
                    to: self.learning_rate,
                }
            }
            _ => {
                self.phase = ControllerPhase::Running;
                AnnealDecision::Kept
            }
        };
        self.valid_history.push(loss);
        decision
    }

    pub fn accumulate(&mut self, loss: f64, lm_loss: f64, reward: Option<f64>) {
        let acc = &mut self.accumulator;
        acc.loss += loss;
        acc.lm_loss += lm_loss;
        if let Some(reward) = reward {
            acc.reward += reward;
            acc.rewarded += 1;
        }
        acc.batches += 1;
    }

    /// Means since the last report; resets the accumulator
    pub fn take_report(&mut self) -> Option<BatchReport> {
        let acc = std::mem::take(&mut self.accumulator);
        if acc.batches == 0 {
            return None;
        }
        let n = acc.batches as f64;
        Some(BatchReport {
            mean_loss: acc.loss / n,
            mean_lm_loss: acc.lm_loss / n,
            mean_reward: (acc.rewarded > 0).then(|| acc.reward / acc.rewarded as f64),
            batches: acc.batches,
        })
    }

    pub fn finish(&mut self) {
        self.phase = ControllerPhase::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regression_halves_learning_rate() {
        let mut state = TrainingState::new(20.0);
        assert_eq!(state.observe_validation(1.0), AnnealDecision::Kept);
        let after_first = state.learning_rate;

        assert_eq!(
            state.observe_validation(1.2),
            AnnealDecision::Halved { from: 20.0, to: 10.0 }
        );
        assert_eq!(state.learning_rate, after_first / 2.0);
        assert_eq!(state.phase, ControllerPhase::Annealed);
        assert_eq!(state.valid_history, vec![1.0, 1.2]);
    }

    #[test]
    fn test_improvement_keeps_learning_rate() {
        let mut state = TrainingState::new(20.0);
        state.observe_validation(1.0);
        assert_eq!(state.observe_validation(0.8), AnnealDecision::Kept);
        assert_eq!(state.learning_rate, 20.0);
        assert_eq!(state.phase, ControllerPhase::Running);
    }

    #[test]
    fn test_equal_loss_does_not_anneal() {
        let mut state = TrainingState::new(1.0);
        state.observe_validation(0.5);
        assert_eq!(state.observe_validation(0.5), AnnealDecision::Kept);
    }

    #[test]
    fn test_annealing_compounds() {
        let mut state = TrainingState::new(8.0);
        for loss in [1.0, 1.1, 1.2, 1.3] {
            state.observe_validation(loss);
        }
        assert_eq!(state.learning_rate, 1.0);
    }

    #[test]
    fn test_report_resets_accumulator() {
        let mut state = TrainingState::new(1.0);
        assert!(state.take_report().is_none());

        state.accumulate(2.0, 4.0, Some(-6.0));
        state.accumulate(4.0, 2.0, None);
        let report = state.take_report().unwrap();
        assert_eq!(report.mean_loss, 3.0);
        assert_eq!(report.mean_lm_loss, 3.0);
        assert_eq!(report.mean_reward, Some(-6.0));
        assert_eq!(report.batches, 2);
        assert!(state.take_report().is_none());
    }
}
