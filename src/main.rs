//! hotserve - multi-instance HTTP server host with hot-reloaded routes.

use std::path::Path;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use hotserve::cli::{self, Cli, Commands};
use hotserve::config::{Config, ConfigError};
use hotserve::{core, debug, logger};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    match &cli.command {
        Commands::Serve => {
            // Setup Ctrl+C handler before any instance starts
            let shutdown = core::setup_shutdown_handler()?;
            let config = Config::load(&cli.config)?;
            cli::serve::run(&config, shutdown)
        }
        Commands::Check { file, launch, json } => {
            let config = optional_config(&cli.config)?;
            cli::check::run(&config.reload, file, launch.as_deref(), *json)
        }
    }
}

/// `check` works without a config file, falling back to defaults.
fn optional_config(path: &Path) -> Result<Config> {
    match Config::load(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::NotFound(_)) => {
            debug!("config"; "{} not found, using defaults", path.display());
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}
