//! CLI tool for ViT config validation, summarization and checkpoint adaptation.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "vit")]
#[command(author, version, about = "ViT classifier CLI for configs and pretrained checkpoints")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the model configuration comes from.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct ModelSource {
    /// Path to a YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Built-in preset (b16, b32, l16, l32, h14)
    #[arg(long)]
    preset: Option<String>,
}

impl ModelSource {
    /// The config path or preset name, for messages.
    fn describe(&self) -> String {
        match (&self.config, &self.preset) {
            (Some(path), _) => path.display().to_string(),
            (None, Some(preset)) => preset.clone(),
            (None, None) => String::new(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a ViT configuration and list the shapes adaptation targets
    Validate {
        #[command(flatten)]
        model: ModelSource,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Summarize a ViT model from its configuration
    Summarize {
        #[command(flatten)]
        model: ModelSource,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// List checkpoint tensors and the names they map to
    Inspect {
        /// Path to the safetensors checkpoint
        checkpoint: PathBuf,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Adapt a pretrained checkpoint to a model configuration
    Adapt {
        #[command(flatten)]
        model: ModelSource,

        /// Path to the pretrained safetensors checkpoint
        #[arg(long)]
        checkpoint: PathBuf,

        /// Where to write the adapted parameters (safetensors)
        #[arg(long)]
        output: PathBuf,

        /// Override the number of classes
        #[arg(long)]
        num_classes: Option<usize>,

        /// Override the (square) input image size
        #[arg(long)]
        img_size: Option<usize>,

        /// Seed for parameter initialization
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { model, format } => {
            let config = commands::resolve_config(model.config.as_deref(), model.preset.as_deref())?;
            commands::validate::run(&config, &model.describe(), &format)
        }
        Commands::Summarize { model, format } => {
            let config = commands::resolve_config(model.config.as_deref(), model.preset.as_deref())?;
            commands::summarize::run(&config, &format)
        }
        Commands::Inspect { checkpoint, format } => commands::inspect::run(&checkpoint, &format),
        Commands::Adapt {
            model,
            checkpoint,
            output,
            num_classes,
            img_size,
            seed,
            format,
        } => {
            let mut config =
                commands::resolve_config(model.config.as_deref(), model.preset.as_deref())?;
            if let Some(num_classes) = num_classes {
                config.num_classes = num_classes;
            }
            if let Some(img_size) = img_size {
                config.img_size = [img_size, img_size];
            }
            commands::adapt::run(config, &checkpoint, &output, seed, &format)
        }
    }
}
