//! Kiosk CLI library

pub mod cache;
pub mod code;
pub mod run;

// Re-export CLI types for testing
pub use clap::{Parser, Subcommand};

use anyhow::{Context, Result};
use clap::Args;
use kiosk_local_db::Database;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kiosk")]
#[command(about = "Kiosk display device runner")]
#[command(version, author, long_about = None)]
pub struct Cli {
    /// Log at debug level regardless of RUST_LOG
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a device against the screen store until interrupted
    Run(run::RunArgs),
    /// Inspect or clear the local identity cache
    Cache {
        #[command(subcommand)]
        subcommand: cache::CacheCommands,
    },
    /// Print freshly generated pairing codes
    Code(code::CodeArgs),
}

/// Location of the local state database
#[derive(Args, Debug, Default, Clone)]
pub struct DbArgs {
    /// Path to the local state database (defaults to the platform state directory)
    #[arg(long, env = "KIOSK_DB_PATH")]
    pub db_path: Option<PathBuf>,
}

impl DbArgs {
    pub fn open(&self) -> Result<Database> {
        match &self.db_path {
            Some(path) => Database::open(path)
                .with_context(|| format!("Failed to open local state at {}", path.display())),
            None => Database::open_default().context("Failed to open default local state"),
        }
    }
}
