//! docval CLI entry point.

use clap::Parser;

use docval::cli::{self, Cli, Commands};
use docval::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => cli::handle_error(&err, cli.json),
    };

    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => cli::handle_error(&err, cli.json),
    };

    let result = match cli.command {
        Commands::Config(args) => cli::commands::config::execute(args, &config, cli.json),
        Commands::Plan(args) => cli::commands::plan::execute(args, &config, cli.json),
        Commands::Critique(args) => {
            cli::commands::critique::execute(args, &config, cli.json).await
        }
    };

    if let Err(err) = result {
        cli::handle_error(&err, cli.json);
    }
}
