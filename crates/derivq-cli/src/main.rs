mod cli;
mod commands;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let level_override = cli.log_level.is_some();
    observability::init_tracing_with_level(cli.log_level.as_deref().unwrap_or("warn"));

    match cli.command {
        Commands::Validate(args) => commands::validate::run(args, level_override).await,
        Commands::Dispatch(args) => commands::dispatch::run(args, level_override).await,
        Commands::Keygen(args) => commands::keygen::run(args),
    }
}
