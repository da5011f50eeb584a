//! CLI entry point.
//!
//! Loads `.env`, parses arguments, builds the context via bootstrap and
//! dispatches to a handler. Errors map to sysexits-style exit codes.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use avchat_cli::{Cli, CliConfig, Commands, bootstrap, exit_code_for, handlers};

#[tokio::main]
async fn main() {
    // Load environment variables before anything reads them
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code_for(&e));
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Bootstrap the CLI context (composition root)
    let ctx = bootstrap(CliConfig::new(cli.overrides()))?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => handlers::chat::execute(&ctx).await,
        Commands::Config => handlers::config::execute(&ctx),
        Commands::Check => handlers::check::execute(&ctx).await,
    }
}
