//! LSTM word-level language model.

use super::{HasVarStore, HiddenState, SequenceModel};
use crate::{ReinforceError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tch::{nn, nn::Module, nn::RNN, Device, Kind, Tensor};

/// Architecture of an `LstmLanguageModel`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LstmConfig {
    /// Token embedding width
    pub embedding_dim: i64,
    /// LSTM hidden width
    pub hidden_size: i64,
    /// Number of stacked LSTM layers
    pub num_layers: i64,
}

impl Default for LstmConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 200,
            hidden_size: 200,
            num_layers: 2,
        }
    }
}

/// Sidecar describing how to rebuild a saved model
#[derive(Serialize, Deserialize)]
struct ModelFile {
    vocab_size: i64,
    config: LstmConfig,
}

/// Embedding -> LSTM -> linear decoder over a vocabulary
pub struct LstmLanguageModel {
    config: LstmConfig,
    vocab_size: i64,
    /// Token embedding
    encoder: nn::Embedding,
    /// LSTM layers
    lstm: nn::LSTM,
    /// Projection to vocabulary logits
    decoder: nn::Linear,
    /// Variable store
    vs: nn::VarStore,
    device: Device,
}

impl LstmLanguageModel {
    /// Create a freshly initialised model
    pub fn new(vocab_size: i64, config: LstmConfig, device: Device) -> Self {
        let vs = nn::VarStore::new(device);
        let root = vs.root();

        let encoder = nn::embedding(
            &root / "encoder",
            vocab_size,
            config.embedding_dim,
            Default::default(),
        );

        let lstm = nn::lstm(
            &root / "lstm",
            config.embedding_dim,
            config.hidden_size,
            nn::RNNConfig {
                num_layers: config.num_layers,
                batch_first: false,
                ..Default::default()
            },
        );

        let decoder = nn::linear(
            &root / "decoder",
            config.hidden_size,
            vocab_size,
            Default::default(),
        );

        Self {
            config,
            vocab_size,
            encoder,
            lstm,
            decoder,
            vs,
            device,
        }
    }

    pub fn config(&self) -> &LstmConfig {
        &self.config
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Get number of parameters
    pub fn num_parameters(&self) -> usize {
        self.vs
            .trainable_variables()
            .iter()
            .map(|t| t.numel())
            .sum()
    }

    /// Path of the architecture sidecar written next to `weights`
    pub fn sidecar_path(weights: impl AsRef<Path>) -> PathBuf {
        weights.as_ref().with_extension("model.json")
    }

    /// Save weights and the architecture sidecar
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        self.vs
            .save(path)
            .map_err(|e| ReinforceError::checkpoint(path, e.to_string()))?;

        let sidecar = ModelFile {
            vocab_size: self.vocab_size,
            config: self.config.clone(),
        };
        let file = std::fs::File::create(Self::sidecar_path(path))?;
        serde_json::to_writer_pretty(file, &sidecar)?;
        Ok(())
    }

    /// Rebuild a model from weights saved with `save`
    pub fn load(path: impl AsRef<Path>, device: Device) -> Result<Self> {
        let path = path.as_ref();
        let sidecar_path = Self::sidecar_path(path);
        let file = std::fs::File::open(&sidecar_path).map_err(|e| {
            ReinforceError::checkpoint(&sidecar_path, format!("missing model description: {}", e))
        })?;
        let sidecar: ModelFile = serde_json::from_reader(file)?;

        let mut model = Self::new(sidecar.vocab_size, sidecar.config, device);
        model.load_weights(path)?;
        tracing::info!(
            path = %path.display(),
            vocab = model.vocab_size,
            params = model.num_parameters(),
            "Loaded language model"
        );
        Ok(model)
    }

    /// Load weights into this model in place
    pub fn load_weights(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.vs
            .load(path)
            .map_err(|e| ReinforceError::checkpoint(path, format!("failed to load weights: {}", e)))
    }

    fn lstm_state(&self, hidden: &HiddenState) -> Result<nn::LSTMState> {
        match hidden.tensors() {
            [h, c] => Ok(nn::LSTMState((h.shallow_clone(), c.shallow_clone()))),
            other => Err(ReinforceError::ShapeMismatch {
                expected: vec![vec![self.config.num_layers, -1, self.config.hidden_size]; 2],
                actual: other.iter().map(|t| t.size()).collect(),
            }),
        }
    }

    fn check_tokens(&self, tokens: &Tensor, dims: usize) -> Result<()> {
        if tokens.dim() != dims {
            return Err(ReinforceError::ShapeMismatch {
                expected: vec![vec![-1; dims]],
                actual: vec![tokens.size()],
            });
        }
        Ok(())
    }
}

impl SequenceModel for LstmLanguageModel {
    fn init_hidden(&self, batch_size: i64) -> HiddenState {
        let nn::LSTMState((h, c)) = self.lstm.zero_state(batch_size);
        HiddenState::new(vec![h, c])
    }

    fn step(&self, tokens: &Tensor, hidden: &HiddenState) -> Result<(Tensor, HiddenState)> {
        self.check_tokens(tokens, 1)?;
        let (logits, next) = self.forward_sequence(&tokens.unsqueeze(0), hidden)?;
        Ok((logits.squeeze_dim(0), next))
    }

    fn vocab_size(&self) -> i64 {
        self.vocab_size
    }

    fn forward_sequence(
        &self,
        tokens: &Tensor,
        hidden: &HiddenState,
    ) -> Result<(Tensor, HiddenState)> {
        self.check_tokens(tokens, 2)?;
        let state = self.lstm_state(hidden)?;

        // (seq_len, batch) -> (seq_len, batch, embedding)
        let embedded = self
            .encoder
            .forward(&tokens.to_device(self.device).to_kind(Kind::Int64));
        let (output, next_state) = self.lstm.seq_init(&embedded, &state);
        let logits = self.decoder.forward(&output);

        let nn::LSTMState((h, c)) = next_state;
        Ok((logits, HiddenState::new(vec![h, c])))
    }
}

impl HasVarStore for LstmLanguageModel {
    fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }

    fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }
}
