//! # reinforce-lm
//!
//! Policy-gradient fine-tuning for pretrained LSTM language models.
//!
//! ## Overview
//!
//! The recurrent hidden state of a language model is treated as the action of a
//! stochastic policy: at every step the next hidden state is sampled from an
//! isotropic Gaussian centred on the model's own output, and the sampled
//! trajectory is scored by the log-likelihood the model assigns to the ground
//! truth continuation. REINFORCE on that trajectory is blended with the usual
//! teacher-forced language-model loss.
//!
//! reinforce-lm provides:
//! - `SequenceModel` - the seam between the training algorithm and the tensor engine
//! - `LstmLanguageModel` - embedding, LSTM and decoder on a `tch` VarStore
//! - `GaussianPolicy` - hidden-state perturbation and its log-density
//! - `Trainer` - epoch loop with gradient clipping, annealing and checkpoints
//! - `Evaluator` - greedy rollouts and teacher-forced validation loss
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reinforce_lm::prelude::*;
//!
//! let corpus = Corpus::load("./data/wikitext-2")?;
//! let model = LstmLanguageModel::load("baseline_model.pt", Device::Cpu)?;
//! let config = ReinforceConfig::default().with_epochs(2);
//! let splits = corpus.splits(config.batch_size, config.bptt, Device::Cpu)?;
//!
//! let mut trainer = Trainer::new(model, config)?;
//! let summary = trainer.train(&splits)?;
//! ```

pub mod checkpoint;
pub mod data;
pub mod log;
pub mod policy;
pub mod training;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::checkpoint::{
        CheckpointConfig, CheckpointManager, CheckpointMetadata, Checkpointable,
    };
    pub use crate::data::{batchify, BatchedSplit, Corpus, DataSplits, Dictionary};
    #[cfg(feature = "tensorboard")]
    pub use crate::log::TensorBoardLogger;
    pub use crate::log::{CompositeLogger, ConsoleLogger, MetricLogger, NoOpLogger, Recorder};
    pub use crate::policy::{
        GaussianPolicy, HasVarStore, HiddenState, LstmConfig, LstmLanguageModel, SequenceModel,
    };
    pub use crate::training::{
        ControllerPhase, Episode, Evaluator, LossBreakdown, Reinforce, ReinforceConfig,
        RewardStats, RolloutMode, Trainer, TrainingState, TrainingSummary,
    };

    pub use tch::Device;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum ReinforceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<Vec<i64>>,
        actual: Vec<Vec<i64>>,
    },

    #[error("Length mismatch: {inputs} input steps but {targets} target steps")]
    LengthMismatch { inputs: i64, targets: i64 },

    #[error("Data error: {0}")]
    Data(String),

    #[error("Checkpoint error at '{path}': {message}")]
    Checkpoint { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tensor error: {0}")]
    Tensor(#[from] tch::TchError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReinforceError {
    /// Helper for creating config errors
    pub fn config(message: impl Into<String>) -> Self {
        ReinforceError::Config(message.into())
    }

    /// Helper for creating checkpoint errors
    pub fn checkpoint<P: AsRef<std::path::Path>>(path: P, message: impl Into<String>) -> Self {
        ReinforceError::Checkpoint {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = core::result::Result<T, ReinforceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ReinforceError::LengthMismatch {
            inputs: 3,
            targets: 4,
        };
        assert_eq!(
            err.to_string(),
            "Length mismatch: 3 input steps but 4 target steps"
        );

        let err = ReinforceError::checkpoint("/tmp/epoch.pt", "disk full");
        assert!(err.to_string().contains("/tmp/epoch.pt"));
    }
}
