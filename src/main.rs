// SPDX-License-Identifier: GPL-3.0-only

use clap::{Args, Parser, Subcommand};
use filter_preview::config::{Config, SourceConfig};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "filter-preview")]
#[command(about = "Real-time filtered camera preview")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Flags that override the config file for this run
#[derive(Args)]
struct Overrides {
    /// Config file (default: ~/.config/filter-preview/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Preview width
    #[arg(long, global = true)]
    width: Option<u32>,

    /// Preview height
    #[arg(long, global = true)]
    height: Option<u32>,

    /// Preview frame rate
    #[arg(long, global = true)]
    fps: Option<u32>,

    /// Starting effect index (from 'filter-preview effects', zero-based)
    #[arg(long, global = true)]
    effect: Option<usize>,

    /// Capture from a V4L2 device instead of the test pattern
    #[arg(long, global = true)]
    device: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the filtered preview in the terminal (default)
    Preview,

    /// Pull frames without a display
    Run {
        /// Number of frames to pull
        #[arg(short, long, default_value = "300")]
        frames: u64,

        /// Save the last frame to this path (PNG or JPEG)
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },

    /// List available effects
    Effects,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Preview);

    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=filter_preview=debug, RUST_LOG=info
    // The terminal preview owns the screen, so it only lets errors through
    // by default.
    let default_level = match command {
        Commands::Preview => "error",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.overrides.config.clone();
    let config = load_config(&cli.overrides)?;

    match command {
        Commands::Preview => cli::preview(config, config_path),
        Commands::Run { frames, snapshot } => cli::run_headless(config, config_path, frames, snapshot),
        Commands::Effects => cli::list_effects(),
    }
}

fn load_config(overrides: &Overrides) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &overrides.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if let Some(width) = overrides.width {
        config.width = width;
    }
    if let Some(height) = overrides.height {
        config.height = height;
    }
    if let Some(fps) = overrides.fps {
        config.framerate = fps;
    }
    if let Some(effect) = overrides.effect {
        config.effect_index = effect;
    }
    if let Some(device) = &overrides.device {
        config.source = SourceConfig::V4l2 {
            device: device.clone(),
        };
    }

    config.validate()?;
    Ok(config)
}
