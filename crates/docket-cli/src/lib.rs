//! Docket CLI - command-line interface for the bulletin pipeline.
//!
//! Each subcommand drives one pipeline stage (or all of them in order);
//! the manifest makes every command idempotent and every run resumable.

#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::{Cli, Command};
pub use config::Config;
pub use error::{CliError, Result};
