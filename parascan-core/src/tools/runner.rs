//! Supervision of one external tool process for one job
//!
//! A runner owns nothing shared except its handle to the job registry. Every
//! failure mode ends as a `failed` tool status; nothing propagates to the
//! caller.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ReportsConfig;
use crate::jobs::{JobRegistry, ToolStatus};
use crate::reports::normalize_file;
use crate::{Error, Result};

use super::catalog::ToolSpec;
use super::command::Invocation;

/// How much of a tool's stdout goes to the log
const STDOUT_LOG_CHARS: usize = 500;

/// Per-tool exit codes that override the zero/non-zero rule
#[derive(Debug, Clone, Default)]
pub struct ExitCodeTable {
    overrides: HashMap<(String, i32), ToolStatus>,
}

impl ExitCodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from each tool's `benign_exit_codes`
    pub fn from_specs(specs: &[ToolSpec]) -> Self {
        let mut table = Self::new();
        for spec in specs {
            for code in &spec.benign_exit_codes {
                table.insert(&spec.name, *code, ToolStatus::Finished);
            }
        }
        table
    }

    pub fn insert(&mut self, tool: &str, exit_code: i32, status: ToolStatus) {
        self.overrides.insert((tool.to_string(), exit_code), status);
    }

    /// Terminal status for a process that exited with `exit_code`.
    /// `None` means the process was killed by a signal.
    pub fn classify(&self, tool: &str, exit_code: Option<i32>) -> ToolStatus {
        let Some(code) = exit_code else {
            return ToolStatus::Failed;
        };
        if let Some(status) = self.overrides.get(&(tool.to_string(), code)) {
            return *status;
        }
        if code == 0 {
            ToolStatus::Finished
        } else {
            ToolStatus::Failed
        }
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Runs one tool to completion and records the outcome in the registry
#[derive(Debug, Clone)]
pub struct ToolRunner {
    registry: JobRegistry,
    exit_codes: Arc<ExitCodeTable>,
    reports: ReportsConfig,
}

impl ToolRunner {
    pub fn new(registry: JobRegistry, exit_codes: Arc<ExitCodeTable>, reports: ReportsConfig) -> Self {
        Self {
            registry,
            exit_codes,
            reports,
        }
    }

    /// Run `invocation` for `spec` within job `job_id`.
    ///
    /// Blocks only on the external process. There is no timeout: a process
    /// that never exits keeps this tool `in_progress` until `cancel` fires.
    pub async fn run(
        &self,
        job_id: Uuid,
        spec: &ToolSpec,
        invocation: Invocation,
        cancel: CancellationToken,
    ) -> ToolStatus {
        let tool = spec.name.as_str();

        if let Err(e) = self
            .registry
            .set_tool_status(job_id, tool, ToolStatus::InProgress)
            .await
        {
            error!(job_id = %job_id, tool, error = %e, "Cannot mark tool as started");
            return ToolStatus::Failed;
        }

        info!(job_id = %job_id, tool, command = %invocation, "Starting tool");

        let (status, exit_code) = match execute(&invocation, &cancel).await {
            Ok(output) => {
                log_output(job_id, tool, &output);
                let status = self.exit_codes.classify(tool, output.exit_code);
                match (status, output.exit_code) {
                    (ToolStatus::Finished, Some(0)) => {
                        info!(job_id = %job_id, tool, "Tool finished successfully")
                    }
                    (ToolStatus::Finished, code) => {
                        info!(job_id = %job_id, tool, exit_code = ?code, "Tool finished with benign exit code")
                    }
                    (_, code) => {
                        warn!(job_id = %job_id, tool, exit_code = ?code, "Tool exited with error")
                    }
                }
                (status, output.exit_code)
            }
            Err(e) => {
                error!(job_id = %job_id, tool, error = %e, "Tool execution failed");
                (ToolStatus::Failed, None)
            }
        };

        if status == ToolStatus::Finished && spec.normalizes_report() {
            self.normalize_report(job_id, spec).await;
        }

        self.record(job_id, tool, status, exit_code).await;
        status
    }

    /// Best-effort conversion of the tool's JSON findings; never changes status.
    ///
    /// Runs before the terminal status write, so a `completed` job already
    /// has its HTML report.
    async fn normalize_report(&self, job_id: Uuid, spec: &ToolSpec) {
        let json_path = self
            .reports
            .host_artifact(spec.artifact_prefix(), job_id, "json");
        info!(job_id = %job_id, tool = %spec.name, "Triggering HTML report generation");

        match tokio::task::spawn_blocking(move || normalize_file(&json_path)).await {
            Ok(Ok(Some(html_path))) => {
                debug!(job_id = %job_id, path = %html_path.display(), "Normalized report written")
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => {
                warn!(job_id = %job_id, tool = %spec.name, error = %e, "Report normalization failed")
            }
            Err(e) => {
                warn!(job_id = %job_id, tool = %spec.name, error = %e, "Report normalization task panicked")
            }
        }
    }

    async fn record(&self, job_id: Uuid, tool: &str, status: ToolStatus, exit_code: Option<i32>) {
        if let Err(e) = self.registry.record_exit_code(job_id, tool, exit_code).await {
            error!(job_id = %job_id, tool, error = %e, "Cannot record exit code");
        }
        if let Err(e) = self.registry.set_tool_status(job_id, tool, status).await {
            error!(job_id = %job_id, tool, error = %e, "Cannot record tool status");
            return;
        }
        match self.registry.refresh_status(job_id).await {
            Ok(overall) => debug!(job_id = %job_id, tool, status = %overall, "Job status re-evaluated"),
            Err(e) => error!(job_id = %job_id, error = %e, "Cannot re-evaluate job status"),
        }
    }
}

/// Spawn the process and wait for it, capturing stdout and stderr in full
async fn execute(invocation: &Invocation, cancel: &CancellationToken) -> Result<ProcessOutput> {
    let child = Command::new(invocation.program())
        .args(invocation.args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| Error::Spawn {
            tool: invocation.tool.clone(),
            source,
        })?;

    tokio::select! {
        output = child.wait_with_output() => {
            let output = output?;
            Ok(ProcessOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code(),
            })
        }
        // Dropping the wait future drops the child, which kills it
        _ = cancel.cancelled() => Err(Error::Cancelled(invocation.tool.clone())),
    }
}

fn log_output(job_id: Uuid, tool: &str, output: &ProcessOutput) {
    if !output.stdout.is_empty() {
        let head: String = output.stdout.chars().take(STDOUT_LOG_CHARS).collect();
        debug!(job_id = %job_id, tool, "STDOUT: {}...", head);
    }
    if !output.stderr.is_empty() {
        debug!(job_id = %job_id, tool, "STDERR:\n{}", output.stderr);
    }
}
