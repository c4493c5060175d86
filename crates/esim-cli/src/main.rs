mod config;
mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pipeline::{ConvertArgs, SummaryArgs, TrainArgs, ValidateArgs};

/// esim: train and validate ESIM natural-language-inference models.
#[derive(Parser)]
#[command(name = "esim", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands for validation, training and dataset inspection.
#[derive(Subcommand)]
enum Command {
    /// Load the datasets, build or restore the model and report validation accuracy.
    Validate {
        /// Path to the JSON training config.
        #[arg(long, default_value = "configs/snli_training.json")]
        config: PathBuf,
        /// Checkpoint directory to restore model weights from.
        #[arg(long)]
        checkpoint: Option<PathBuf>,
        /// Also report loss and accuracy on the test set.
        #[arg(long)]
        test: bool,
    },
    /// Train the model with early stopping, writing epoch and best checkpoints.
    Train {
        /// Path to the JSON training config.
        #[arg(long, default_value = "configs/snli_training.json")]
        config: PathBuf,
        /// Checkpoint directory to resume training from.
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },
    /// Print statistics for a pickle or Parquet dataset.
    Summary {
        /// Path to the dataset file.
        #[arg(long)]
        input: PathBuf,
        /// Output as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },
    /// Convert a dataset between pickle and Parquet (chosen by extension).
    Convert {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate {
            config,
            checkpoint,
            test,
        } => pipeline::run_validate(ValidateArgs {
            config,
            checkpoint,
            test,
        }),
        Command::Train { config, checkpoint } => {
            pipeline::run_train(TrainArgs { config, checkpoint })
        }
        Command::Summary { input, json } => pipeline::run_summary(SummaryArgs { input, json }),
        Command::Convert { input, output } => {
            pipeline::run_convert(ConvertArgs { input, output })
        }
    }
}
