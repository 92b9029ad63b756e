//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};

/// Docket - resumable pipeline for regulatory-bulletin archives.
#[derive(Debug, Parser)]
#[command(name = "docket")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "docket.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Discover documents for the configured year range
    Register(YearArgs),

    /// Download registered documents
    Fetch(FetchArgs),

    /// Normalize downloaded documents to canonical text
    Normalize,

    /// Run structured extraction over normalized documents
    Extract,

    /// Fold extracted artifacts into the consolidated dataset
    Consolidate,

    /// Run every stage in order
    Run(YearArgs),

    /// Show per-stage and per-failure counts from the manifest
    Status,
}

/// Year-range overrides for registration.
#[derive(Debug, Parser)]
pub struct YearArgs {
    /// First year to process (defaults to the configured start year)
    #[arg(long)]
    pub start_year: Option<i32>,

    /// Last year to process (defaults to the configured end year)
    #[arg(long)]
    pub end_year: Option<i32>,
}

/// Fetch-stage flags.
#[derive(Debug, Parser)]
pub struct FetchArgs {
    /// Re-download documents already recorded as downloaded
    #[arg(long)]
    pub force_refresh: bool,

    /// Re-queue documents that failed at fetch (mostly known 404s)
    #[arg(long)]
    pub retry_failed: bool,
}
