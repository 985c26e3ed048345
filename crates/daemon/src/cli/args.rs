pub use clap::Parser;

use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "lanrelay")]
#[command(about = "Presence-aware encrypted file relay for the local network")]
#[command(version)]
pub struct Args {
    /// Address of a running relay (defaults to localhost on the configured port)
    #[arg(long, global = true)]
    pub remote: Option<Url>,

    /// Path to the relay config directory (defaults to ~/.lanrelay)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
