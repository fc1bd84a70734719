use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "triprox", about = "A multi-protocol TCP proxy server")]
pub struct Args {
    /// Path to a TOML settings file. If omitted, or the file doesn't exist,
    /// a built-in default listener set is used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity. May be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all but error-level logging.
    #[arg(short, long)]
    pub quiet: bool,
}
