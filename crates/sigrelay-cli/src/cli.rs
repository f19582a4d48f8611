//! Clap CLI definitions for sigrelay.

use clap::Parser;
use std::path::PathBuf;

/// Bridge a signal-cli REST API to a local event router.
#[derive(Parser, Debug)]
#[command(name = "sigrelay", version)]
pub struct Cli {
    /// Path to config file (default: ~/.sigrelay/config.toml).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Reply to every inbound text message with the same text.
    #[arg(long)]
    pub echo: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Config path from the flag, else the default location.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .or_else(|| dirs::home_dir().map(|h| h.join(".sigrelay").join("config.toml")))
    }
}
