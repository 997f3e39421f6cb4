//! Job data model and status state machine

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Status of a single tool within a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    /// Job created, tool not launched yet
    Pending,
    InProgress,
    Finished,
    Failed,
}

impl ToolStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ToolStatus::Finished | ToolStatus::Failed)
    }
}

impl std::fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolStatus::Pending => write!(f, "pending"),
            ToolStatus::InProgress => write!(f, "in_progress"),
            ToolStatus::Finished => write!(f, "finished"),
            ToolStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Overall status of a job, derived from its tool statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Starting,
    InProgress,
    Completed,
    FinishedWithErrors,
}

impl JobStatus {
    /// Terminal states are absorbing
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::FinishedWithErrors)
    }

    /// Next overall status given the current one and every tool status.
    ///
    /// Pure and idempotent: applying it again to its own output with the
    /// same tool statuses yields the same value.
    pub fn evaluate<I>(self, tools: I) -> JobStatus
    where
        I: IntoIterator<Item = ToolStatus>,
    {
        if self.is_terminal() {
            return self;
        }

        let mut any_pending = false;
        let mut any_failed = false;
        for status in tools {
            match status {
                ToolStatus::InProgress => return JobStatus::InProgress,
                ToolStatus::Pending => any_pending = true,
                ToolStatus::Failed => any_failed = true,
                ToolStatus::Finished => {}
            }
        }

        if any_pending {
            // Not every tool has been launched yet
            self
        } else if any_failed {
            JobStatus::FinishedWithErrors
        } else {
            JobStatus::Completed
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Starting => write!(f, "starting"),
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::FinishedWithErrors => write!(f, "finished_with_errors"),
        }
    }
}

/// Model under test for the LLM-safety tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    #[serde(rename = "type")]
    pub model_type: String,
    pub name: String,
}

impl ModelDescriptor {
    pub fn new(model_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            model_type: model_type.into(),
            name: name.into(),
        }
    }
}

/// Execution details of one tool run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRun {
    pub exit_code: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// One orchestrated scan run against one target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub target: String,
    pub model: ModelDescriptor,
    pub status: JobStatus,
    /// Tool name to status; keys are fixed at creation
    pub tools: BTreeMap<String, ToolStatus>,
    /// Tool name to run details; same keys as `tools`
    pub tool_runs: BTreeMap<String, ToolRun>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job in `starting` state with every tool `pending`
    pub fn new<I, S>(target: impl Into<String>, model: ModelDescriptor, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = tools.into_iter().map(Into::into).collect();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            target: target.into(),
            model,
            status: JobStatus::Starting,
            tools: names
                .iter()
                .map(|n| (n.clone(), ToolStatus::Pending))
                .collect(),
            tool_runs: names
                .into_iter()
                .map(|n| (n, ToolRun::default()))
                .collect(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Flip to `in_progress` and mark every still-pending tool as running
    pub(crate) fn begin(&mut self) {
        if self.status != JobStatus::Starting {
            return;
        }
        for status in self.tools.values_mut() {
            if *status == ToolStatus::Pending {
                *status = ToolStatus::InProgress;
            }
        }
        self.status = JobStatus::InProgress;
        self.updated_at = Utc::now();
    }

    /// Write one tool's status, then re-evaluate the overall status
    pub(crate) fn set_tool_status(&mut self, tool: &str, status: ToolStatus) -> Result<()> {
        let slot = self
            .tools
            .get_mut(tool)
            .ok_or_else(|| Error::UnknownTool(tool.to_string()))?;
        *slot = status;

        let now = Utc::now();
        if let Some(run) = self.tool_runs.get_mut(tool) {
            match status {
                ToolStatus::InProgress => run.started_at = Some(now),
                ToolStatus::Finished | ToolStatus::Failed => run.finished_at = Some(now),
                ToolStatus::Pending => {}
            }
        }
        self.updated_at = now;
        self.refresh_status();
        Ok(())
    }

    pub(crate) fn record_exit_code(&mut self, tool: &str, exit_code: Option<i32>) -> Result<()> {
        let run = self
            .tool_runs
            .get_mut(tool)
            .ok_or_else(|| Error::UnknownTool(tool.to_string()))?;
        run.exit_code = exit_code;
        Ok(())
    }

    /// Re-derive the overall status from the tool statuses
    pub(crate) fn refresh_status(&mut self) -> JobStatus {
        self.status = self.status.evaluate(self.tools.values().copied());
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
