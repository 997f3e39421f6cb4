//! CLI argument parsing

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "parascan")]
#[command(author, version, about = "Run web and LLM security scanners in parallel")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start a scan and wait for every tool to finish
    Scan(ScanArgs),

    /// Convert a nuclei JSON report to HTML
    Normalize(NormalizeArgs),

    /// List the configured tools
    Tools {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, clap::Args)]
pub struct ScanArgs {
    /// URL to scan (defaults to the configured target)
    #[arg(long)]
    pub target: Option<String>,

    /// Model backend type
    #[arg(long)]
    pub model_type: Option<String>,

    /// Model name for the LLM scanner; untagged names get `:latest`
    #[arg(long)]
    pub model: Option<String>,

    /// Run only these tools (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub tools: Vec<String>,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Seconds between status polls
    #[arg(long, default_value_t = 2)]
    pub poll_secs: u64,
}

#[derive(Debug, clap::Args)]
pub struct NormalizeArgs {
    /// Directory searched for `nuclei*.json`
    pub dir: PathBuf,

    /// Convert this file instead of searching the directory
    #[arg(long)]
    pub file: Option<PathBuf>,
}
