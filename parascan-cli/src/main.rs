mod args;
mod runner;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use args::{Args, Command};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // RUST_LOG wins over -v
    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Scan(scan) => {
            if runner::run_scan(scan).await? {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Normalize(normalize) => {
            runner::run_normalize(&normalize)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Tools { config } => {
            runner::run_tools(config.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
