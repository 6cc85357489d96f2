//! Command-line interface.

pub mod commands;
pub mod output;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

#[derive(Parser, Debug)]
#[command(name = "docval")]
#[command(about = "Tiered documentation validation and recommendation critique", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file; defaults to .docval/config.yaml plus overrides
    #[arg(short, long, global = true, env = "DOCVAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect configuration
    Config(commands::config::ConfigArgs),

    /// Show which validators a run would execute, tier by tier
    Plan(commands::plan::PlanArgs),

    /// Critique, refine and deduplicate a batch of recommendations
    Critique(commands::critique::CritiqueArgs),
}

/// Load configuration from `path`, or from the project directory when unset.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Report `err` and exit with a non-zero status.
pub fn handle_error(err: &anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_plan_with_selection() {
        let cli = Cli::try_parse_from([
            "docval",
            "--json",
            "plan",
            "--profile",
            "quick",
            "--validators",
            "yaml,links",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Commands::Plan(args) => {
                assert_eq!(args.profile.as_deref(), Some("quick"));
                assert_eq!(args.validators, vec!["yaml", "links"]);
            }
            other => panic!("expected plan, got {other:?}"),
        }
    }
}
