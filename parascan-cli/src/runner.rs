//! Subcommand execution

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use parascan_core::config::ScanConfig;
use parascan_core::jobs::{JobStatus, ScanCoordinator, ScanRequest};
use parascan_core::reports::{normalize_dir, normalize_file};
use parascan_core::tools::CommandBuilder;
use tracing::{info, warn};
use uuid::Uuid;

use crate::args::{NormalizeArgs, ScanArgs};

/// Start a scan, print its receipt, then wait and print the final job.
///
/// Returns `false` when the scan finished with errors.
pub async fn run_scan(args: ScanArgs) -> Result<bool> {
    let mut config =
        ScanConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if !args.tools.is_empty() {
        config.restrict_tools(&args.tools)?;
    }

    let coordinator = ScanCoordinator::new(&config)?;

    let mut request = ScanRequest::new();
    if let Some(target) = args.target {
        request = request.with_target(target);
    }
    if let Some(model_type) = args.model_type {
        request = request.with_model_type(model_type);
    }
    if let Some(model) = args.model {
        request = request.with_model_name(model);
    }

    let receipt = coordinator.start_scan(request).await?;
    println!("{}", serde_json::to_string_pretty(&receipt)?);

    let poll = Duration::from_secs(args.poll_secs.max(1));

    let job = tokio::select! {
        result = coordinator.wait_for_completion(receipt.scan_id, poll) => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!(job_id = %receipt.scan_id, "Interrupted, stopping running tools");
            coordinator.cancel_job(receipt.scan_id).await?;
            coordinator
                .wait_for_completion(receipt.scan_id, Duration::from_millis(100))
                .await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&job)?);
    info!(job_id = %job.id, status = %job.status, "Scan finished");

    Ok(job.status == JobStatus::Completed)
}

/// Convert a nuclei report to HTML, by explicit file or directory search
pub fn run_normalize(args: &NormalizeArgs) -> Result<()> {
    let written = match &args.file {
        Some(file) => normalize_file(file),
        None => normalize_dir(&args.dir),
    }
    .context("Failed to normalize nuclei report")?;

    match written {
        Some(path) => println!("{}", path.display()),
        None => println!("No nuclei JSON report found"),
    }
    Ok(())
}

/// Print the configured tools and the command each would run against the
/// default target (with a nil job id)
pub fn run_tools(config: Option<&Path>) -> Result<()> {
    let config = ScanConfig::load(config).context("Failed to load configuration")?;
    for line in describe_tools(&config) {
        println!("{}", line);
    }
    Ok(())
}

fn describe_tools(config: &ScanConfig) -> Vec<String> {
    let builder = CommandBuilder::from_config(config);
    let defaults = &config.defaults;

    let mut lines = Vec::with_capacity(config.tools.len() * 2);
    for tool in &config.tools {
        let benign = if tool.benign_exit_codes.is_empty() {
            String::new()
        } else {
            let codes: Vec<String> = tool.benign_exit_codes.iter().map(i32::to_string).collect();
            format!(" (benign exits: {})", codes.join(", "))
        };
        lines.push(format!("{:<12} {}{}", tool.name, tool.kind, benign));

        let invocation = builder.build(tool, &defaults.target, Uuid::nil(), &defaults.model_name);
        lines.push(format!("    {}", invocation));
    }
    lines
}
