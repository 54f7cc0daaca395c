//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Multi-instance HTTP server host with hot-reloaded route modules
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: hotserve.toml, searched upward)
    #[arg(short = 'C', long, global = true, default_value = "hotserve.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Print debug output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start every configured instance and hot reload their routes
    #[command(visible_alias = "s")]
    Serve,

    /// Load a route module and print its dependencies and routes
    #[command(visible_alias = "c")]
    Check {
        /// Route module to load
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,

        /// Named export to show instead of the top-level routes
        #[arg(short, long)]
        launch: Option<String>,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["hotserve", "-C", "conf/hotserve.toml", "serve"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("conf/hotserve.toml"));
        assert!(matches!(cli.command, Commands::Serve));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_parse_check() {
        let cli = Cli::try_parse_from(["hotserve", "check", "api.toml", "--json", "-v"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Check { file, launch, json } => {
                assert_eq!(file, PathBuf::from("api.toml"));
                assert!(launch.is_none());
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
