//! REINFORCE training over hidden-state actions.
//!
//! Provides:
//! - `generate_episode` - rollout of the Gaussian hidden-state policy over one window
//! - `discounted_returns` / `policy_gradient_loss` / `composite_loss` - the objective
//! - `Reinforce` - model + policy producing the composite loss for a batch
//! - `TrainingState` - validation history and learning-rate annealing
//! - `Evaluator` - greedy rollouts and teacher-forced validation loss
//! - `Trainer` - epoch loop with clipping, checkpoints and the results record

mod clip;
mod config;
mod evaluator;
mod optimizer;
mod reinforce;
mod returns;
mod rollout;
mod state;
mod trainer;

pub use clip::clip_weights;
pub use config::ReinforceConfig;
pub use evaluator::{mean_std, validation_loss, Evaluator, RewardStats};
pub use optimizer::{PolicyOptimizer, TorchOptimizer};
pub use reinforce::{LossBreakdown, Reinforce};
pub use returns::{composite_loss, discounted_returns, policy_gradient_loss, reinforce_objective};
pub use rollout::{generate_episode, Episode, RolloutMode};
pub use state::{AnnealDecision, BatchAccumulator, BatchReport, ControllerPhase, TrainingState};
pub use trainer::{EpochRecord, Trainer, TrainingSummary};
