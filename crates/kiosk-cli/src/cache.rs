//! `kiosk cache`: local identity cache maintenance

use anyhow::{Context, Result};
use clap::Subcommand;
use kiosk_core::{CacheKey, IdentityCache, LocalIdentity};
use std::sync::Arc;

use crate::DbArgs;

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Print the cached screen identity
    Show {
        #[command(flatten)]
        db: DbArgs,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Forget the cached screen identity so the next boot recovers or re-registers
    Clear {
        #[command(flatten)]
        db: DbArgs,

        /// Also forget the cached hostname
        #[arg(long)]
        all: bool,
    },
}

impl CacheCommands {
    pub fn run(self) -> Result<()> {
        match self {
            CacheCommands::Show { db, json } => {
                let snapshot = LocalIdentity::new(Arc::new(db.open()?)).snapshot();
                if json {
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                } else {
                    let show = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
                    println!("screen id:     {}", show(snapshot.screen_id));
                    println!("pairing code:  {}", show(snapshot.screen_code));
                    println!("hostname:      {}", show(snapshot.screen_name));
                    println!("assigned path: {}", show(snapshot.assigned_path));
                }
                Ok(())
            }
            CacheCommands::Clear { db, all } => {
                let db = db.open()?;
                db.purge().context("Failed to purge cached identity")?;
                if all {
                    db.remove(CacheKey::ScreenName)
                        .context("Failed to remove cached hostname")?;
                }
                println!("Local identity cleared");
                Ok(())
            }
        }
    }
}
