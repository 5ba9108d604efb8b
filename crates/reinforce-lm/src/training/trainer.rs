//! Main REINFORCE trainer.

use super::clip::clip_weights;
use super::config::ReinforceConfig;
use super::evaluator::{validation_loss, Evaluator, RewardStats};
use super::optimizer::{PolicyOptimizer, TorchOptimizer};
use super::reinforce::Reinforce;
use super::state::{AnnealDecision, TrainingState};
use crate::checkpoint::{CheckpointConfig, CheckpointManager, CheckpointMetadata, Checkpointable};
use crate::data::{BatchedSplit, DataSplits};
use crate::log::{ConsoleLogger, MetricLogger, Metrics, Recorder};
use crate::policy::{GaussianPolicy, HasVarStore, SequenceModel};
use crate::utils::format_duration;
use crate::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::PathBuf;
use std::time::Instant;

/// What happened in one epoch
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub valid_loss: f64,
    /// Learning rate after the annealing decision
    pub learning_rate: f64,
    pub annealed: bool,
    pub reward: Option<RewardStats>,
    pub checkpoint: Option<PathBuf>,
    pub elapsed_secs: f64,
}

/// Result of a full training run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub baseline_valid_loss: f64,
    pub epochs: Vec<EpochRecord>,
    pub test_loss: f64,
    pub final_learning_rate: f64,
    pub elapsed_secs: f64,
}

impl TrainingSummary {
    /// Lowest validation loss reached after any epoch
    pub fn best_valid_loss(&self) -> Option<f64> {
        self.epochs.iter().map(|e| e.valid_loss).reduce(f64::min)
    }
}

/// Main trainer for REINFORCE fine-tuning
pub struct Trainer<M: SequenceModel + HasVarStore + Checkpointable> {
    /// Configuration
    config: ReinforceConfig,
    /// Model and hidden-state policy
    reinforce: Reinforce<M>,
    /// Optimizer
    optimizer: Box<dyn PolicyOptimizer>,
    /// Epoch, validation history, learning rate, running sums
    state: TrainingState,
    /// Greedy evaluation after every epoch
    evaluator: Option<Evaluator>,
    checkpoints: CheckpointManager,
    /// Durable (label, alpha, loss) record
    recorder: Option<Recorder>,
    logger: Box<dyn MetricLogger>,
    /// Batches processed across all epochs
    global_step: u64,
    /// Pre-clip gradient norm of the latest batch
    grad_norm: Option<f64>,
}

impl<M: SequenceModel + HasVarStore + Checkpointable> Trainer<M> {
    /// Create a new trainer. Fails on invalid hyperparameters.
    pub fn new(model: M, config: ReinforceConfig) -> Result<Self> {
        config.validate()?;

        let policy = GaussianPolicy::new(config.sigma)?;
        let reinforce = Reinforce::new(model, policy, config.gamma)?;
        let optimizer =
            TorchOptimizer::adam(reinforce.model().var_store(), config.learning_rate)?;
        let checkpoints = CheckpointManager::new(
            CheckpointConfig::new(&config.checkpoint_dir).keep_last(config.keep_last),
        );
        let evaluator = (config.eval_episodes > 0).then(|| Evaluator::new(config.eval_episodes));

        Ok(Self {
            state: TrainingState::new(config.learning_rate),
            config,
            reinforce,
            optimizer: Box::new(optimizer),
            evaluator,
            checkpoints,
            recorder: None,
            logger: Box::new(ConsoleLogger::new()),
            global_step: 0,
            grad_norm: None,
        })
    }

    /// Record `(label, alpha, loss)` lines to `recorder`
    pub fn with_recorder(mut self, recorder: Recorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Replace the metric logger
    pub fn with_logger(mut self, logger: Box<dyn MetricLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &ReinforceConfig {
        &self.config
    }

    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    pub fn reinforce(&self) -> &Reinforce<M> {
        &self.reinforce
    }

    pub fn model(&self) -> &M {
        self.reinforce.model()
    }

    pub fn into_model(self) -> M {
        self.reinforce.into_model()
    }

    pub fn optimizer(&self) -> &dyn PolicyOptimizer {
        self.optimizer.as_ref()
    }

    pub fn global_step(&self) -> u64 {
        self.global_step
    }

    /// Run every epoch, then evaluate on the test split.
    pub fn train(&mut self, splits: &DataSplits) -> Result<TrainingSummary> {
        let start = Instant::now();

        let baseline = validation_loss(self.reinforce.model(), &splits.valid)?;
        self.state.observe_validation(baseline);
        self.record(0, baseline);
        tracing::info!(
            valid_loss = baseline,
            valid_ppl = baseline.exp(),
            lr = self.state.learning_rate,
            alpha = self.config.alpha,
            "Baseline validation"
        );

        let mut epochs = Vec::with_capacity(self.config.epochs);
        for epoch in 1..=self.config.epochs {
            let epoch_start = Instant::now();
            self.train_epoch(epoch, &splits.train)?;
            epochs.push(self.end_epoch(epoch, &splits.valid, epoch_start)?);
        }

        self.state.finish();
        let test_loss = validation_loss(self.reinforce.model(), &splits.test)?;
        self.record("test", test_loss);
        self.logger.log_scalar("test/loss", test_loss, self.config.epochs as u64);
        tracing::info!(
            test_loss,
            test_ppl = test_loss.exp(),
            elapsed = %format_duration(start.elapsed().as_secs_f64()),
            "Training complete"
        );

        if let Some(recorder) = self.recorder.take() {
            if let Err(e) = recorder.close() {
                tracing::error!("Failed to close results record: {}", e);
            }
        }
        self.logger.close();

        Ok(TrainingSummary {
            baseline_valid_loss: baseline,
            epochs,
            test_loss,
            final_learning_rate: self.state.learning_rate,
            elapsed_secs: start.elapsed().as_secs_f64(),
        })
    }

    fn train_epoch(&mut self, epoch: usize, split: &BatchedSplit) -> Result<()> {
        let num_batches = split.num_windows();
        let progress = self.config.show_progress.then(|| {
            let pb = ProgressBar::new(num_batches as u64);
            let style = ProgressStyle::default_bar()
                .template("{prefix} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .map(|s| s.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            pb.set_style(style);
            pb.set_prefix(format!("epoch {}", epoch));
            pb
        });

        // Leftovers from a partial report window belong to the previous epoch
        self.state.take_report();

        for (batch, window) in split.windows().enumerate() {
            let (inputs, targets) = window?;

            self.optimizer.zero_grad();
            let loss = self.reinforce.loss(&inputs, &targets, self.config.alpha)?;
            loss.total.backward();
            if let Some(max_norm) = self.config.clip.filter(|c| *c > 0.0) {
                self.grad_norm = Some(self.optimizer.clip_grad_norm(max_norm)?);
            }
            self.optimizer.step();

            if let Some((lower, upper)) = self.config.weight_clip {
                clip_weights(self.reinforce.model().var_store(), lower, upper)?;
            }

            self.state.accumulate(
                loss.total.double_value(&[]),
                loss.language_model,
                loss.total_reward,
            );
            self.global_step += 1;

            if (batch + 1) % self.config.report_interval == 0 {
                self.report(epoch, batch + 1, num_batches, progress.as_ref());
            }
            if let Some(ref pb) = progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
        Ok(())
    }

    fn report(
        &mut self,
        epoch: usize,
        batch: usize,
        num_batches: usize,
        progress: Option<&ProgressBar>,
    ) {
        let Some(report) = self.state.take_report() else {
            return;
        };

        let mut metrics = Metrics::new();
        metrics.insert("loss", report.mean_loss);
        metrics.insert("lm_loss", report.mean_lm_loss);
        metrics.insert("lm_ppl", report.mean_lm_loss.exp());
        metrics.insert("lr", self.state.learning_rate);
        if let Some(norm) = self.grad_norm {
            metrics.insert("grad_norm", norm);
        }
        if let Some(reward) = report.mean_reward {
            metrics.insert("reward", reward);
        }

        match progress {
            Some(pb) => pb.set_message(format!(
                "Loss: {:.4} LM: {:.4} PPL: {:.2}",
                report.mean_loss,
                report.mean_lm_loss,
                report.mean_lm_loss.exp()
            )),
            None => tracing::debug!(epoch, batch, num_batches, "Report"),
        }
        self.logger.log_metrics("train", &metrics, self.global_step);
    }

    fn end_epoch(
        &mut self,
        epoch: usize,
        valid: &BatchedSplit,
        epoch_start: Instant,
    ) -> Result<EpochRecord> {
        let valid_loss = validation_loss(self.reinforce.model(), valid)?;
        self.state.epoch = epoch;

        let decision = self.anneal(valid_loss);
        self.record(epoch, valid_loss);

        let reward = match self.evaluator {
            Some(evaluator) => Some(evaluator.evaluate(&self.reinforce, valid)?),
            None => None,
        };

        let mut metrics = Metrics::new();
        metrics.insert("loss", valid_loss);
        metrics.insert("ppl", valid_loss.exp());
        metrics.insert("lr", self.state.learning_rate);
        if let Some(stats) = reward {
            metrics.insert("reward_mean", stats.mean);
            metrics.insert("reward_std", stats.std);
        }
        self.logger.log_metrics("valid", &metrics, epoch as u64);

        let checkpoint = self.save_checkpoint(epoch, valid_loss, reward.as_ref());
        let elapsed_secs = epoch_start.elapsed().as_secs_f64();
        tracing::info!(
            epoch,
            valid_loss,
            valid_ppl = valid_loss.exp(),
            lr = self.state.learning_rate,
            elapsed = %format_duration(elapsed_secs),
            "End of epoch"
        );

        Ok(EpochRecord {
            epoch,
            valid_loss,
            learning_rate: self.state.learning_rate,
            annealed: matches!(decision, AnnealDecision::Halved { .. }),
            reward,
            checkpoint,
            elapsed_secs,
        })
    }

    /// Apply the annealing rule and push the new rate into the optimizer
    fn anneal(&mut self, valid_loss: f64) -> AnnealDecision {
        let decision = self.state.observe_validation(valid_loss);
        if let AnnealDecision::Halved { from, to } = decision {
            self.optimizer.set_learning_rate(to);
            tracing::info!(
                epoch = self.state.epoch,
                from,
                to,
                "Validation loss regressed, annealing learning rate"
            );
        }
        decision
    }

    /// A failed save is reported and training carries on
    fn save_checkpoint(
        &mut self,
        epoch: usize,
        valid_loss: f64,
        reward: Option<&RewardStats>,
    ) -> Option<PathBuf> {
        let mut metadata =
            CheckpointMetadata::new(epoch, valid_loss, self.state.learning_rate, self.config.alpha);
        if let Some(stats) = reward {
            metadata = metadata.with_rewards(stats);
        }

        match self.checkpoints.save(self.reinforce.model(), &metadata) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::error!(epoch, "Failed to save checkpoint: {}", e);
                None
            }
        }
    }

    fn record(&mut self, label: impl Display, loss: f64) {
        if let Some(ref mut recorder) = self.recorder {
            if let Err(e) = recorder.record(&label, self.config.alpha, loss) {
                tracing::error!(label = %label, "Failed to write results record: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Corpus;
    use crate::policy::{LstmConfig, LstmLanguageModel};
    use crate::training::ControllerPhase;
    use tch::Device;
    use tempfile::tempdir;

    const TEXT: &str = "the cat sat on the mat\nthe dog sat on the log\na cat and a dog\n";

    fn setup(alpha: f64, dir: &std::path::Path) -> (Trainer<LstmLanguageModel>, DataSplits) {
        let corpus = Corpus::from_texts(TEXT, TEXT, TEXT);
        let config = ReinforceConfig {
            learning_rate: 0.01,
            alpha,
            sigma: 0.05,
            epochs: 2,
            batch_size: 2,
            bptt: 4,
            report_interval: 2,
            eval_episodes: 2,
            checkpoint_dir: dir.join("checkpoints"),
            weight_clip: Some((-2.0, 2.0)),
            ..Default::default()
        };
        let splits = corpus
            .splits(config.batch_size, config.bptt, Device::Cpu)
            .unwrap();
        let model = LstmLanguageModel::new(
            corpus.vocab_size(),
            LstmConfig {
                embedding_dim: 8,
                hidden_size: 8,
                num_layers: 1,
            },
            Device::Cpu,
        );
        (Trainer::new(model, config).unwrap(), splits)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let model = LstmLanguageModel::new(4, LstmConfig::default(), Device::Cpu);
        let config = ReinforceConfig::default().with_sigma(-1.0);
        assert!(Trainer::new(model, config).is_err());
    }

    #[test]
    fn test_training_run() {
        let dir = tempdir().unwrap();
        let (trainer, splits) = setup(0.5, dir.path());
        let recorder = Recorder::create(dir.path().join("results.txt")).unwrap();
        let mut trainer = trainer.with_recorder(recorder);

        let summary = trainer.train(&splits).unwrap();

        assert_eq!(summary.epochs.len(), 2);
        assert!(summary.test_loss.is_finite());
        assert_eq!(trainer.state().phase, ControllerPhase::Done);
        assert_eq!(trainer.state().valid_history.len(), 3);
        assert_eq!(
            trainer.global_step(),
            2 * splits.train.num_windows() as u64
        );

        // The learning rate follows the annealing rule over the recorded history
        let mut replay = TrainingState::new(0.01);
        for loss in &trainer.state().valid_history {
            replay.observe_validation(*loss);
        }
        assert_eq!(summary.final_learning_rate, replay.learning_rate);
        assert_eq!(trainer.optimizer().learning_rate(), replay.learning_rate);

        let results = std::fs::read_to_string(dir.path().join("results.txt")).unwrap();
        let labels: Vec<&str> = results
            .lines()
            .map(|l| l.split('\t').next().unwrap())
            .collect();
        assert_eq!(labels, vec!["0", "1", "2", "test"]);

        for record in &summary.epochs {
            let path = record.checkpoint.as_ref().unwrap();
            assert!(path.exists());
            assert_eq!(record.reward.unwrap().episodes, 2);
        }
        assert!(dir.path().join("checkpoints").join("best.pt").exists());
    }

    #[test]
    fn test_annealing_reaches_optimizer() {
        let dir = tempdir().unwrap();
        let (mut trainer, _) = setup(0.5, dir.path());

        assert_eq!(trainer.anneal(4.0), AnnealDecision::Kept);
        assert_eq!(trainer.optimizer().learning_rate(), 0.01);

        assert_eq!(
            trainer.anneal(4.5),
            AnnealDecision::Halved {
                from: 0.01,
                to: 0.005
            }
        );
        assert_eq!(trainer.optimizer().learning_rate(), 0.005);
        assert_eq!(trainer.state().learning_rate, 0.005);

        trainer.anneal(4.2);
        assert_eq!(trainer.optimizer().learning_rate(), 0.005);
    }

    #[test]
    fn test_supervised_only_run() {
        let dir = tempdir().unwrap();
        let (mut trainer, splits) = setup(0.0, dir.path());
        let summary = trainer.train(&splits).unwrap();
        assert_eq!(summary.epochs.len(), 2);
        assert!(summary.best_valid_loss().unwrap().is_finite());
    }
}
