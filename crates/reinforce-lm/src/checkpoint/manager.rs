//! Checkpoint manager for rotation and best model tracking.

use super::state::{CheckpointMetadata, Checkpointable};
use crate::{ReinforceError, Result};
use std::fs;
use std::path::{Path, PathBuf};

const EPOCH_PREFIX: &str = "epoch_";
const WEIGHTS_EXT: &str = "pt";
const BEST_STEM: &str = "best";

/// Configuration for checkpoint management.
#[derive(Clone, Debug)]
pub struct CheckpointConfig {
    /// Directory to store checkpoints
    pub checkpoint_dir: PathBuf,
    /// Keep only the last N checkpoints (0 = keep all)
    pub keep_last: usize,
    /// Also keep a copy of the lowest-validation-loss checkpoint as `best.pt`
    pub save_best: bool,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("checkpoints"),
            keep_last: 0,
            save_best: true,
        }
    }
}

impl CheckpointConfig {
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
            ..Default::default()
        }
    }

    /// Set number of checkpoints to keep.
    pub fn keep_last(mut self, n: usize) -> Self {
        self.keep_last = n;
        self
    }

    /// Enable/disable best checkpoint tracking.
    pub fn save_best(mut self, enabled: bool) -> Self {
        self.save_best = enabled;
        self
    }
}

/// Manages checkpoint lifecycle.
///
/// Every checkpoint is a weights file `epoch_{NNNNNN}_loss_{L}.pt` plus any
/// companions the model writes next to it and a `.json` metadata file. All
/// files sharing the weights' stem are rotated and copied together.
///
/// # Example
///
/// ```ignore
/// let mut manager = CheckpointManager::new(CheckpointConfig::new("./checkpoints").keep_last(3));
///
/// let meta = CheckpointMetadata::new(epoch, valid_loss, lr, alpha);
/// let path = manager.save(&model, &meta)?;
///
/// // To resume:
/// if let Some(epoch) = manager.load_latest(&mut model)? {
///     println!("Resumed from epoch {}", epoch);
/// }
/// ```
pub struct CheckpointManager {
    config: CheckpointConfig,
    best_loss: f64,
}

impl CheckpointManager {
    pub fn new(config: CheckpointConfig) -> Self {
        if let Err(e) = fs::create_dir_all(&config.checkpoint_dir) {
            tracing::warn!("Failed to create checkpoint directory: {}", e);
        }

        Self {
            config,
            best_loss: f64::INFINITY,
        }
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.config.checkpoint_dir
    }

    /// Weights path for a given epoch and validation loss
    pub fn checkpoint_path(&self, epoch: usize, valid_loss: f64) -> PathBuf {
        self.config.checkpoint_dir.join(format!(
            "{}{:06}_loss_{:.4}.{}",
            EPOCH_PREFIX, epoch, valid_loss, WEIGHTS_EXT
        ))
    }

    pub fn best_path(&self) -> PathBuf {
        self.config
            .checkpoint_dir
            .join(format!("{}.{}", BEST_STEM, WEIGHTS_EXT))
    }

    /// Metadata file written next to `weights`
    pub fn metadata_path(weights: impl AsRef<Path>) -> PathBuf {
        weights.as_ref().with_extension("json")
    }

    /// Write a checkpoint tagged with `metadata.epoch` and `metadata.valid_loss`.
    pub fn save<T: Checkpointable>(
        &mut self,
        model: &T,
        metadata: &CheckpointMetadata,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.config.checkpoint_dir)?;
        let path = self.checkpoint_path(metadata.epoch, metadata.valid_loss);

        model.save_checkpoint(&path)?;
        let file = fs::File::create(Self::metadata_path(&path))?;
        serde_json::to_writer_pretty(file, metadata)?;
        tracing::info!(
            path = %path.display(),
            epoch = metadata.epoch,
            valid_loss = metadata.valid_loss,
            "Saved checkpoint"
        );

        if self.config.save_best && metadata.valid_loss < self.best_loss {
            self.copy_as_best(&path)?;
            self.best_loss = metadata.valid_loss;
            tracing::info!(valid_loss = metadata.valid_loss, "New best checkpoint");
        }

        if self.config.keep_last > 0 {
            self.cleanup_old_checkpoints()?;
        }

        Ok(path)
    }

    /// Load the latest checkpoint.
    ///
    /// Returns the epoch number if a checkpoint was loaded, or None if no checkpoints exist.
    pub fn load_latest<T: Checkpointable>(&self, model: &mut T) -> Result<Option<usize>> {
        let Some(path) = self.list_checkpoints()?.pop() else {
            return Ok(None);
        };

        model.load_checkpoint(&path)?;
        let epoch = extract_epoch(&path);
        tracing::info!(path = %path.display(), epoch, "Loaded checkpoint");
        Ok(Some(epoch))
    }

    /// Load the best checkpoint.
    ///
    /// Returns true if the best checkpoint was loaded, false if it doesn't exist.
    pub fn load_best<T: Checkpointable>(&self, model: &mut T) -> Result<bool> {
        let best = self.best_path();
        if !best.exists() {
            return Ok(false);
        }
        model.load_checkpoint(&best)?;
        tracing::info!(path = %best.display(), "Loaded best checkpoint");
        Ok(true)
    }

    /// Load a specific checkpoint file.
    pub fn load_from_path<T: Checkpointable>(
        &self,
        model: &mut T,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ReinforceError::checkpoint(path, "no such checkpoint"));
        }
        model.load_checkpoint(path)?;
        tracing::info!(path = %path.display(), "Loaded checkpoint");
        Ok(())
    }

    /// Read the metadata written next to `weights`
    pub fn read_metadata(weights: impl AsRef<Path>) -> Result<CheckpointMetadata> {
        let path = Self::metadata_path(weights);
        let file = fs::File::open(&path)
            .map_err(|e| ReinforceError::checkpoint(&path, format!("missing metadata: {}", e)))?;
        Ok(serde_json::from_reader(file)?)
    }

    /// List all epoch checkpoints, oldest first.
    pub fn list_checkpoints(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.config.checkpoint_dir) {
            Ok(e) => e,
            Err(_) => return Ok(Vec::new()),
        };

        let mut checkpoints: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                let is_weights = p.extension().and_then(|e| e.to_str()) == Some(WEIGHTS_EXT);
                let is_epoch = p
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(EPOCH_PREFIX))
                    .unwrap_or(false);
                is_weights && is_epoch
            })
            .collect();

        // Zero-padded epochs sort chronologically
        checkpoints.sort();
        Ok(checkpoints)
    }

    fn copy_as_best(&self, weights: &Path) -> Result<()> {
        for (file, suffix) in companions(weights)? {
            let target = self
                .config
                .checkpoint_dir
                .join(format!("{}.{}", BEST_STEM, suffix));
            fs::copy(&file, target)?;
        }
        Ok(())
    }

    /// Remove old checkpoints, keeping only the last N.
    fn cleanup_old_checkpoints(&self) -> Result<()> {
        let mut checkpoints = self.list_checkpoints()?;

        while checkpoints.len() > self.config.keep_last {
            let old = checkpoints.remove(0);
            for (file, _) in companions(&old)? {
                if let Err(e) = fs::remove_file(&file) {
                    tracing::warn!(path = %file.display(), "Failed to remove old checkpoint: {}", e);
                }
            }
            tracing::debug!(path = %old.display(), "Removed old checkpoint");
        }

        Ok(())
    }
}

/// Files next to `weights` named `{stem}.{suffix}`, with their suffixes
fn companions(weights: &Path) -> Result<Vec<(PathBuf, String)>> {
    let stem = weights
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ReinforceError::checkpoint(weights, "invalid checkpoint name"))?;
    let prefix = format!("{}.", stem);
    let dir = match weights.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        let suffix = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(&prefix))
            .map(str::to_string);
        if let Some(suffix) = suffix {
            files.push((path, suffix));
        }
    }
    Ok(files)
}

/// Epoch number from `epoch_{NNNNNN}_loss_{L}.pt`
fn extract_epoch(path: &Path) -> usize {
    path.file_name()
        .and_then(|s| s.to_str())
        .and_then(|s| s.strip_prefix(EPOCH_PREFIX))
        .and_then(|s| s.split('_').next())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}
