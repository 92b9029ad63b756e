//! Docket CLI - entry point.

use clap::Parser;
use docket_cli::{commands, Cli, Command, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let manifest = commands::open_manifest(&config)?;

    match cli.command {
        Command::Register(years) => commands::execute_register(&config, &manifest, &years)?,
        Command::Fetch(args) => commands::execute_fetch(&config, &manifest, &args).await?,
        Command::Normalize => commands::execute_normalize(&config, &manifest).await?,
        Command::Extract => commands::execute_extract(&config, &manifest).await?,
        Command::Consolidate => commands::execute_consolidate(&config, &manifest)?,
        Command::Run(years) => commands::execute_run(&config, &manifest, &years).await?,
        Command::Status => commands::execute_status(&manifest)?,
    }
    Ok(())
}
