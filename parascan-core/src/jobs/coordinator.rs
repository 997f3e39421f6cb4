//! Scan coordination: one job, one concurrent runner per tool

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::{DefaultsConfig, ScanConfig};
use crate::tools::{CommandBuilder, ExitCodeTable, ToolRunner, ToolSpec, normalize_model_name};
use crate::Result;

use super::models::{Job, ModelDescriptor};
use super::registry::JobRegistry;

/// Acknowledgement returned as soon as a scan is accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReceipt {
    pub scan_id: Uuid,
    pub status: String,
    pub target: String,
}

/// What to scan; missing fields fall back to the configured defaults
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    pub target: Option<String>,
    pub model_type: Option<String>,
    pub model_name: Option<String>,
}

impl ScanRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_model_type(mut self, model_type: impl Into<String>) -> Self {
        self.model_type = Some(model_type.into());
        self
    }

    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }

    fn resolve(self, defaults: &DefaultsConfig) -> (String, ModelDescriptor) {
        let target = self.target.unwrap_or_else(|| defaults.target.clone());
        let model = ModelDescriptor::new(
            self.model_type
                .unwrap_or_else(|| defaults.model_type.clone()),
            self.model_name
                .unwrap_or_else(|| defaults.model_name.clone()),
        );
        (target, model)
    }
}

/// Creates jobs and launches their tools; the single entry point for
/// submitting and querying scans
#[derive(Debug, Clone)]
pub struct ScanCoordinator {
    registry: JobRegistry,
    tools: Arc<[ToolSpec]>,
    builder: CommandBuilder,
    runner: ToolRunner,
    defaults: DefaultsConfig,
    /// Cancellation tokens of jobs whose tools are still running
    running: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl ScanCoordinator {
    /// Create a coordinator with its own, empty registry
    pub fn new(config: &ScanConfig) -> Result<Self> {
        Self::with_registry(config, JobRegistry::new())
    }

    /// Create a coordinator over an existing registry
    pub fn with_registry(config: &ScanConfig, registry: JobRegistry) -> Result<Self> {
        config.validate()?;

        let exit_codes = Arc::new(ExitCodeTable::from_specs(&config.tools));
        let runner = ToolRunner::new(registry.clone(), exit_codes, config.reports.clone());

        Ok(Self {
            registry,
            tools: config.tools.clone().into(),
            builder: CommandBuilder::from_config(config),
            runner,
            defaults: config.defaults.clone(),
            running: Arc::default(),
        })
    }

    /// Accept a scan and launch every configured tool in the background.
    ///
    /// Returns as soon as the job is registered; tool processes run on
    /// independently spawned tasks. Must be called within a Tokio runtime.
    pub async fn start_scan(&self, request: ScanRequest) -> Result<ScanReceipt> {
        let (target, model) = request.resolve(&self.defaults);
        let names: Vec<String> = self.tools.iter().map(|t| t.name.clone()).collect();

        let job_id = self.registry.create(&target, model.clone(), names).await;
        info!(job_id = %job_id, scan_target = %target, model = %model.name, "Scan accepted");

        let cancel = CancellationToken::new();
        self.running.lock().await.insert(job_id, cancel.clone());

        let this = self.clone();
        let launch_target = target.clone();
        tokio::spawn(async move {
            this.launch(job_id, &launch_target, &model, cancel).await;
            this.running.lock().await.remove(&job_id);
        });

        Ok(ScanReceipt {
            scan_id: job_id,
            status: "all_tools_triggered".to_string(),
            target,
        })
    }

    /// Flip the job to `in_progress`, start one runner per tool and wait for
    /// all of them
    async fn launch(
        &self,
        job_id: Uuid,
        target: &str,
        model: &ModelDescriptor,
        cancel: CancellationToken,
    ) {
        if let Err(e) = self.registry.begin(job_id).await {
            error!(job_id = %job_id, error = %e, "Cannot start job");
            return;
        }

        let model_name = normalize_model_name(&model.name);
        let invocations = self
            .builder
            .build_all(&self.tools, target, job_id, &model_name);

        let mut runners = JoinSet::new();
        for (spec, invocation) in self.tools.iter().cloned().zip(invocations) {
            let runner = self.runner.clone();
            let cancel = cancel.child_token();
            runners.spawn(async move { runner.run(job_id, &spec, invocation, cancel).await });
        }

        info!(job_id = %job_id, tools = self.tools.len(), "All tools triggered");

        while let Some(joined) = runners.join_next().await {
            if let Err(e) = joined {
                error!(job_id = %job_id, error = %e, "Tool runner task aborted");
            }
        }
        debug!(job_id = %job_id, "All tool runners returned");
    }

    /// Kill every running tool of one job; they are recorded as `failed`.
    ///
    /// Returns `false` when the job has no running tools left. Other jobs,
    /// and scans started later, are unaffected.
    pub async fn cancel_job(&self, job_id: Uuid) -> Result<bool> {
        self.registry.get(job_id).await?;

        match self.running.lock().await.get(&job_id) {
            Some(cancel) => {
                info!(job_id = %job_id, "Cancelling running tools");
                cancel.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Current state of one job
    pub async fn get_status(&self, job_id: Uuid) -> Result<Job> {
        self.registry.get(job_id).await
    }

    /// Every job tracked by this process
    pub async fn list_jobs(&self) -> Vec<Job> {
        self.registry.list().await
    }

    /// Poll until the job reaches a terminal status.
    ///
    /// Never times out on its own; wrap in `tokio::time::timeout` or call
    /// [`cancel_job`](Self::cancel_job) to bound it.
    pub async fn wait_for_completion(&self, job_id: Uuid, poll_interval: Duration) -> Result<Job> {
        loop {
            let job = self.registry.get(job_id).await?;
            if job.is_finished() {
                return Ok(job);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::config::ReportsConfig;
    use crate::jobs::{JobStatus, ToolStatus};
    use tempfile::TempDir;

    fn config(dir: &TempDir, tools: Vec<ToolSpec>) -> ScanConfig {
        ScanConfig {
            reports: ReportsConfig::new(dir.path()),
            tools,
            ..ScanConfig::default()
        }
    }

    #[test]
    fn test_request_defaults() {
        let defaults = DefaultsConfig::default();
        let (target, model) = ScanRequest::new().resolve(&defaults);
        assert_eq!(target, "http://testphp.vulnweb.com");
        assert_eq!(model, ModelDescriptor::new("ollama", "llama3"));

        let (target, model) = ScanRequest::new()
            .with_target("http://localhost:8000")
            .with_model_type("ollama")
            .with_model_name("phi3:mini")
            .resolve(&defaults);
        assert_eq!(target, "http://localhost:8000");
        assert_eq!(model.name, "phi3:mini");
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let result = ScanCoordinator::new(&config(&dir, vec![]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let dir = TempDir::new().unwrap();
        let coordinator = ScanCoordinator::new(&config(&dir, vec![ToolSpec::command("a", ["true"])])).unwrap();
        let missing = Uuid::new_v4();
        assert!(matches!(
            coordinator.get_status(missing).await,
            Err(Error::JobNotFound(id)) if id == missing
        ));
        assert!(matches!(
            coordinator.wait_for_completion(missing, Duration::from_millis(10)).await,
            Err(Error::JobNotFound(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_scan_returns_receipt_and_completes() {
        let dir = TempDir::new().unwrap();
        let tools = vec![
            ToolSpec::command("a", ["sh", "-c", "exit 0"]),
            ToolSpec::command("b", ["sh", "-c", "echo {target} {model}"]),
        ];
        let coordinator = ScanCoordinator::new(&config(&dir, tools)).unwrap();

        let receipt = coordinator
            .start_scan(ScanRequest::new().with_target("http://t"))
            .await
            .unwrap();
        assert_eq!(receipt.status, "all_tools_triggered");
        assert_eq!(receipt.target, "http://t");

        let job = coordinator.get_status(receipt.scan_id).await.unwrap();
        assert_eq!(job.tools.len(), 2);

        let job = tokio::time::timeout(
            Duration::from_secs(10),
            coordinator.wait_for_completion(receipt.scan_id, Duration::from_millis(20)),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.tools.values().all(|s| *s == ToolStatus::Finished));
        assert_eq!(coordinator.list_jobs().await.len(), 1);
    }

    async fn wait_started(coordinator: &ScanCoordinator, id: Uuid, tool: &str) {
        loop {
            let job = coordinator.get_status(id).await.unwrap();
            if job.tool_runs[tool].started_at.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn wait(coordinator: &ScanCoordinator, id: Uuid) -> Job {
        tokio::time::timeout(
            Duration::from_secs(10),
            coordinator.wait_for_completion(id, Duration::from_millis(20)),
        )
        .await
        .unwrap()
        .unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_job_fails_hung_tools() {
        let dir = TempDir::new().unwrap();
        let tools = vec![ToolSpec::command("hang", ["sleep", "60"])];
        let coordinator = ScanCoordinator::new(&config(&dir, tools)).unwrap();

        let receipt = coordinator.start_scan(ScanRequest::new()).await.unwrap();
        wait_started(&coordinator, receipt.scan_id, "hang").await;
        assert!(coordinator.cancel_job(receipt.scan_id).await.unwrap());

        let job = wait(&coordinator, receipt.scan_id).await;
        assert_eq!(job.tools["hang"], ToolStatus::Failed);
        assert_eq!(job.status, JobStatus::FinishedWithErrors);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_job_leaves_other_and_later_scans_running() {
        let dir = TempDir::new().unwrap();
        let gate = dir.path().join("release");
        let script = format!("while [ ! -f '{}' ]; do sleep 0.02; done", gate.display());
        let tools = vec![ToolSpec::command("a", ["sh".to_string(), "-c".to_string(), script])];
        let coordinator = ScanCoordinator::new(&config(&dir, tools)).unwrap();

        let cancelled = coordinator.start_scan(ScanRequest::new()).await.unwrap();
        let neighbour = coordinator.start_scan(ScanRequest::new()).await.unwrap();
        wait_started(&coordinator, cancelled.scan_id, "a").await;
        wait_started(&coordinator, neighbour.scan_id, "a").await;

        coordinator.cancel_job(cancelled.scan_id).await.unwrap();
        let job = wait(&coordinator, cancelled.scan_id).await;
        assert_eq!(job.status, JobStatus::FinishedWithErrors);

        let later = coordinator.start_scan(ScanRequest::new()).await.unwrap();
        std::fs::write(&gate, "").unwrap();

        assert_eq!(wait(&coordinator, neighbour.scan_id).await.status, JobStatus::Completed);
        let job = wait(&coordinator, later.scan_id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.tools["a"], ToolStatus::Finished);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_finished_job_is_noop() {
        let dir = TempDir::new().unwrap();
        let tools = vec![ToolSpec::command("a", ["sh", "-c", "exit 0"])];
        let coordinator = ScanCoordinator::new(&config(&dir, tools)).unwrap();

        let receipt = coordinator.start_scan(ScanRequest::new()).await.unwrap();
        let job = wait(&coordinator, receipt.scan_id).await;
        assert_eq!(job.status, JobStatus::Completed);

        // The token is released once every runner has returned
        let released = tokio::time::timeout(Duration::from_secs(5), async {
            while coordinator.cancel_job(receipt.scan_id).await.unwrap() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(released.is_ok());
        assert_eq!(
            coordinator.get_status(receipt.scan_id).await.unwrap().status,
            JobStatus::Completed
        );
        assert!(matches!(
            coordinator.cancel_job(Uuid::new_v4()).await,
            Err(Error::JobNotFound(_))
        ));
    }
}
