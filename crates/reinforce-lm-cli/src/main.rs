//! reinforce-lm CLI
//!
//! Command-line interface for REINFORCE fine-tuning of LSTM language models.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use reinforce_lm::log::{MetricLogger, NoOpLogger};
use reinforce_lm::prelude::*;
use reinforce_lm::training::validation_loss;
use reinforce_lm::utils::{format_count, set_seed};

#[derive(Parser)]
#[command(name = "reinforce-lm")]
#[command(version, about = "Policy-gradient fine-tuning for LSTM language models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fine-tune a pretrained model with REINFORCE over hidden states
    Train(TrainArgs),

    /// Report validation/test loss and greedy rewards of a saved model
    Evaluate {
        /// Corpus directory with train.txt, valid.txt and test.txt
        #[arg(long, default_value = "./data/wikitext-2")]
        data: PathBuf,

        /// Saved model weights
        #[arg(long)]
        model: PathBuf,

        #[arg(long, default_value = "20")]
        batch_size: i64,

        #[arg(long, default_value = "200")]
        bptt: i64,

        /// Greedy episodes on the validation split
        #[arg(long, default_value = "10")]
        episodes: usize,

        /// Use CUDA device 0
        #[arg(long)]
        gpu: bool,
    },

    /// Create a freshly initialised model sized to a corpus vocabulary
    Init {
        /// Corpus directory with train.txt, valid.txt and test.txt
        #[arg(long, default_value = "./data/wikitext-2")]
        data: PathBuf,

        /// Where to write the weights (a `.model.json` sidecar is written next to it)
        #[arg(long, default_value = "baseline_model.pt")]
        output: PathBuf,

        #[arg(long, default_value = "200")]
        embedding_dim: i64,

        #[arg(long, default_value = "200")]
        hidden_size: i64,

        #[arg(long, default_value = "2")]
        layers: i64,

        #[arg(long, default_value = "1111")]
        seed: u64,
    },
}

#[derive(Args)]
struct TrainArgs {
    /// Corpus directory with train.txt, valid.txt and test.txt
    #[arg(long, default_value = "./data/wikitext-2")]
    data: PathBuf,

    /// Results record: one `label<TAB>alpha<TAB>loss` line per evaluation
    #[arg(long, default_value = "./results/log.txt")]
    output: PathBuf,

    /// Initial learning rate
    #[arg(long, default_value = "0.001")]
    lr: f64,

    /// Standard deviation of the hidden-state policy
    #[arg(long, default_value = "0.01", allow_negative_numbers = true)]
    sigma: f64,

    /// Discount factor
    #[arg(long, default_value = "1.0")]
    gamma: f64,

    /// Weight of the policy-gradient loss
    #[arg(long, default_value = "0.1", allow_negative_numbers = true)]
    alpha: f64,

    /// Gradient norm bound (0 disables clipping)
    #[arg(long, default_value = "0.25")]
    clip: f64,

    /// Upper epoch limit
    #[arg(long, default_value = "40")]
    epochs: usize,

    #[arg(long, default_value = "20")]
    batch_size: i64,

    /// Sequence length (truncated BPTT window)
    #[arg(long, default_value = "200")]
    bptt: i64,

    /// Random seed
    #[arg(long, default_value = "1111")]
    seed: u64,

    /// Use CUDA device 0
    #[arg(long)]
    gpu: bool,

    /// Pretrained model to start from
    #[arg(long, default_value = "baseline_model.pt")]
    init: PathBuf,

    /// Batches between loss reports
    #[arg(long, default_value = "50")]
    report: usize,

    /// Checkpoint directory
    #[arg(long, default_value = "./checkpoints")]
    save_dir: PathBuf,

    /// Greedy evaluation episodes after every epoch (0 disables)
    #[arg(long, default_value = "0")]
    eval_episodes: usize,

    /// Keep only the last N epoch checkpoints (0 keeps all)
    #[arg(long, default_value = "0")]
    keep_last: usize,

    /// Clamp weights from below after every step (requires --weight-clip-upper)
    #[arg(long, requires = "weight_clip_upper", allow_negative_numbers = true)]
    weight_clip_lower: Option<f64>,

    /// Clamp weights from above after every step (requires --weight-clip-lower)
    #[arg(long, requires = "weight_clip_lower", allow_negative_numbers = true)]
    weight_clip_upper: Option<f64>,

    /// Show a progress bar over each epoch
    #[arg(long)]
    progress: bool,

    /// Write TensorBoard event files to this directory
    #[cfg(feature = "tensorboard")]
    #[arg(long)]
    tensorboard: Option<PathBuf>,
}

impl TrainArgs {
    fn to_config(&self) -> ReinforceConfig {
        let mut config = ReinforceConfig {
            learning_rate: self.lr,
            sigma: self.sigma,
            gamma: self.gamma,
            alpha: self.alpha,
            clip: (self.clip > 0.0).then_some(self.clip),
            epochs: self.epochs,
            batch_size: self.batch_size,
            bptt: self.bptt,
            seed: self.seed,
            report_interval: self.report,
            eval_episodes: self.eval_episodes,
            checkpoint_dir: self.save_dir.clone(),
            keep_last: self.keep_last,
            weight_clip: self.weight_clip_lower.zip(self.weight_clip_upper),
            show_progress: self.progress,
            ..Default::default()
        };
        if self.gpu {
            config = config.cuda();
        }
        config
    }

    fn logger(&self) -> Result<Box<dyn MetricLogger>> {
        #[cfg(feature = "tensorboard")]
        {
            if let Some(ref dir) = self.tensorboard {
                let tensorboard = TensorBoardLogger::new(dir)
                    .with_context(|| format!("failed to open {}", dir.display()))?;
                return Ok(Box::new(CompositeLogger::new(vec![
                    Box::new(ConsoleLogger::new()),
                    Box::new(tensorboard),
                ])));
            }
        }
        Ok(if self.progress {
            Box::new(NoOpLogger)
        } else {
            Box::new(ConsoleLogger::new())
        })
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train(args) => train(&args),
        Commands::Evaluate {
            data,
            model,
            batch_size,
            bptt,
            episodes,
            gpu,
        } => evaluate(&data, &model, batch_size, bptt, episodes, device(gpu)),
        Commands::Init {
            data,
            output,
            embedding_dim,
            hidden_size,
            layers,
            seed,
        } => init(
            &data,
            &output,
            LstmConfig {
                embedding_dim,
                hidden_size,
                num_layers: layers,
            },
            seed,
        ),
    }
}

fn device(gpu: bool) -> Device {
    if gpu {
        Device::Cuda(0)
    } else {
        Device::Cpu
    }
}

fn train(args: &TrainArgs) -> Result<()> {
    let config = args.to_config();
    config.validate()?;
    set_seed(config.seed);

    let corpus = Corpus::load(&args.data)?;
    let model = LstmLanguageModel::load(&args.init, config.device)
        .with_context(|| format!("failed to load initial model {}", args.init.display()))?;
    if model.vocab_size() != corpus.vocab_size() {
        anyhow::bail!(
            "model vocabulary ({}) does not match corpus vocabulary ({})",
            model.vocab_size(),
            corpus.vocab_size()
        );
    }
    tracing::info!(
        params = %format_count(model.num_parameters()),
        vocab = model.vocab_size(),
        "Starting training"
    );

    let splits = corpus.splits(config.batch_size, config.bptt, config.device)?;

    std::fs::create_dir_all(&config.checkpoint_dir)?;
    let config_path = config.checkpoint_dir.join("config.json");
    serde_json::to_writer_pretty(std::fs::File::create(&config_path)?, &config)?;

    let recorder = Recorder::create(&args.output)?;
    let mut trainer = Trainer::new(model, config)?
        .with_recorder(recorder)
        .with_logger(args.logger()?);
    let summary = trainer.train(&splits)?;

    let results_path = trainer.config().checkpoint_dir.join("results.json");
    serde_json::to_writer_pretty(std::fs::File::create(&results_path)?, &summary)?;

    println!("Baseline valid loss: {:.4}", summary.baseline_valid_loss);
    for record in &summary.epochs {
        println!(
            "Epoch {:>3}: valid loss {:.4} (ppl {:.2}) lr {}{}",
            record.epoch,
            record.valid_loss,
            record.valid_loss.exp(),
            record.learning_rate,
            if record.annealed { " (annealed)" } else { "" }
        );
    }
    println!(
        "Test loss: {:.4} (ppl {:.2})",
        summary.test_loss,
        summary.test_loss.exp()
    );
    println!("Results written to {}", results_path.display());
    Ok(())
}

fn evaluate(
    data: &Path,
    model_path: &Path,
    batch_size: i64,
    bptt: i64,
    episodes: usize,
    device: Device,
) -> Result<()> {
    let corpus = Corpus::load(data)?;
    let model = LstmLanguageModel::load(model_path, device)
        .with_context(|| format!("failed to load model {}", model_path.display()))?;
    let splits = corpus.splits(batch_size, bptt, device)?;

    let valid = validation_loss(&model, &splits.valid)?;
    let test = validation_loss(&model, &splits.test)?;
    println!("Valid loss: {:.4} (ppl {:.2})", valid, valid.exp());
    println!("Test loss: {:.4} (ppl {:.2})", test, test.exp());

    if episodes > 0 {
        // Greedy rollouts never sample, so sigma and gamma do not affect the reward
        let policy = GaussianPolicy::new(1.0)?;
        let reinforce = Reinforce::new(model, policy, 1.0)?;
        let stats = Evaluator::new(episodes).evaluate(&reinforce, &splits.valid)?;
        println!(
            "Greedy reward over {} episodes: mean {:.4}, std {:.4}",
            stats.episodes, stats.mean, stats.std
        );
    }
    Ok(())
}

fn init(data: &Path, output: &Path, config: LstmConfig, seed: u64) -> Result<()> {
    set_seed(seed);
    let corpus = Corpus::load(data)?;
    let model = LstmLanguageModel::new(corpus.vocab_size(), config, Device::Cpu);
    model.save(output)?;
    println!(
        "Saved model with {} parameters (vocab {}) to {}",
        format_count(model.num_parameters()),
        corpus.vocab_size(),
        output.display()
    );
    Ok(())
}
