//! Process-wide table of scan jobs
//!
//! The registry is the only shared mutable state in the engine. Every
//! mutation takes the write lock for exactly one read-modify-write, so
//! concurrent tool runners for the same job are linearized.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::models::{Job, JobStatus, ModelDescriptor, ToolStatus};
use crate::{Error, Result};

/// Shared handle to the job table; clones refer to the same table
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job with one `pending` entry per tool
    pub async fn create<I, S>(&self, target: &str, model: ModelDescriptor, tools: I) -> Uuid
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let job = Job::new(target, model, tools);
        let id = job.id;
        self.jobs.write().await.insert(id, job);
        debug!(job_id = %id, scan_target = %target, "Job created");
        id
    }

    /// Move a `starting` job to `in_progress`
    pub async fn begin(&self, job_id: Uuid) -> Result<()> {
        self.with_job(job_id, |job| {
            job.begin();
            Ok(())
        })
        .await
    }

    /// Write one tool's status and re-evaluate the job, atomically
    pub async fn set_tool_status(
        &self,
        job_id: Uuid,
        tool: &str,
        status: ToolStatus,
    ) -> Result<JobStatus> {
        self.with_job(job_id, |job| {
            job.set_tool_status(tool, status)?;
            Ok(job.status)
        })
        .await
    }

    /// Record the exit code a tool's process ended with
    pub async fn record_exit_code(
        &self,
        job_id: Uuid,
        tool: &str,
        exit_code: Option<i32>,
    ) -> Result<()> {
        self.with_job(job_id, |job| job.record_exit_code(tool, exit_code))
            .await
    }

    /// Re-evaluate the overall status; safe to call redundantly
    pub async fn refresh_status(&self, job_id: Uuid) -> Result<JobStatus> {
        self.with_job(job_id, |job| Ok(job.refresh_status())).await
    }

    /// Snapshot of one job
    pub async fn get(&self, job_id: Uuid) -> Result<Job> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or(Error::JobNotFound(job_id))
    }

    /// Snapshot of every job, oldest first
    pub async fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    async fn with_job<T, F>(&self, job_id: Uuid, f: F) -> Result<T>
    where
        F: FnOnce(&mut Job) -> Result<T>,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&job_id).ok_or(Error::JobNotFound(job_id))?;
        f(job)
    }
}
