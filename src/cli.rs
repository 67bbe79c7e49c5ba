//! CLI definitions for web2api.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// web2api CLI.
#[derive(Parser)]
#[command(name = "web2api")]
#[command(about = "Serve chat websites as an OpenAI-compatible API")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/web2api.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the API server in foreground (default)
    Serve {
        /// Override server.host
        #[arg(long)]
        host: Option<String>,

        /// Override server.port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Validate the configuration file and exit
    CheckConfig,

    /// List configured sites and their model aliases
    Sites,
}
