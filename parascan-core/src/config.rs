//! Configuration types for parascan scans

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tools::{ToolSpec, default_tools};
use crate::{Error, Result};

const DEFAULT_TARGET: &str = "http://testphp.vulnweb.com";
const DEFAULT_MODEL_TYPE: &str = "ollama";
const DEFAULT_MODEL_NAME: &str = "llama3";
const DEFAULT_INTERNAL_REPORTS_DIR: &str = "/reports";
const DEFAULT_LLM_ENDPOINT: &str = "http://host.docker.internal:11434";
const DEFAULT_WORDLIST: &str = "/usr/share/wordlists/dirb/common.txt";
const LOCAL_CONFIG_FILE: &str = "parascan.toml";

/// Values used when a scan request leaves a field out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default = "default_model_type")]
    pub model_type: String,
    #[serde(default = "default_model_name")]
    pub model_name: String,
}

fn default_target() -> String {
    DEFAULT_TARGET.to_string()
}

fn default_model_type() -> String {
    DEFAULT_MODEL_TYPE.to_string()
}

fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.to_string()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            model_type: default_model_type(),
            model_name: default_model_name(),
        }
    }
}

/// Location of the shared reports volume
///
/// `host_dir` is the directory as the host (and the container runtime's
/// volume mounts) sees it. `internal_dir` is the same directory as seen by
/// tools that run inside their own mount namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default = "default_host_dir")]
    pub host_dir: PathBuf,
    #[serde(default = "default_internal_dir")]
    pub internal_dir: PathBuf,
}

fn default_host_dir() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("reports")
}

fn default_internal_dir() -> PathBuf {
    PathBuf::from(DEFAULT_INTERNAL_REPORTS_DIR)
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            host_dir: default_host_dir(),
            internal_dir: default_internal_dir(),
        }
    }
}

impl ReportsConfig {
    /// Create a reports config rooted at `host_dir`
    pub fn new(host_dir: impl Into<PathBuf>) -> Self {
        Self {
            host_dir: host_dir.into(),
            internal_dir: default_internal_dir(),
        }
    }

    /// Artifact file name for one tool and job, e.g. `nuclei_<id>.json`
    pub fn artifact_name(tool: &str, job_id: Uuid, ext: &str) -> String {
        format!("{}_{}.{}", tool, job_id, ext)
    }

    /// Artifact path under the host reports directory
    pub fn host_artifact(&self, tool: &str, job_id: Uuid, ext: &str) -> PathBuf {
        self.host_dir.join(Self::artifact_name(tool, job_id, ext))
    }

    /// Artifact path under the internal reports directory
    pub fn internal_artifact(&self, tool: &str, job_id: Uuid, ext: &str) -> PathBuf {
        self.internal_dir.join(Self::artifact_name(tool, job_id, ext))
    }
}

/// Model-serving backend used by the LLM-safety scanner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    /// Program and leading arguments of the LLM-safety wrapper process
    #[serde(default = "default_wrapper")]
    pub wrapper: Vec<String>,
}

fn default_llm_endpoint() -> String {
    DEFAULT_LLM_ENDPOINT.to_string()
}

fn default_wrapper() -> Vec<String> {
    vec!["python".to_string(), "giskard_wrapper.py".to_string()]
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            wrapper: default_wrapper(),
        }
    }
}

/// Fuzzer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzerConfig {
    #[serde(default = "default_wordlist")]
    pub wordlist: String,
}

fn default_wordlist() -> String {
    DEFAULT_WORDLIST.to_string()
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        Self {
            wordlist: default_wordlist(),
        }
    }
}

/// Complete scan configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub fuzzer: FuzzerConfig,
    #[serde(default = "default_tools")]
    pub tools: Vec<ToolSpec>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            reports: ReportsConfig::default(),
            llm: LlmConfig::default(),
            fuzzer: FuzzerConfig::default(),
            tools: default_tools(),
        }
    }
}

impl ScanConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from default locations with cascade:
    /// 1. ./parascan.toml (local override)
    /// 2. ~/.parascan/config.toml (global defaults)
    /// 3. Built-in defaults
    pub fn load_default() -> Self {
        Self::load_first([Some(PathBuf::from(LOCAL_CONFIG_FILE)), Self::global_config_path()])
    }

    /// First candidate that exists and parses, else built-in defaults
    fn load_first<I>(candidates: I) -> Self
    where
        I: IntoIterator<Item = Option<PathBuf>>,
    {
        candidates
            .into_iter()
            .flatten()
            .find_map(|path| Self::from_file(&path).ok())
            .unwrap_or_default()
    }

    /// Load from an explicit path if given, otherwise the default cascade,
    /// then apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::load_default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".parascan").join("config.toml"))
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` to resolve variable names
    ///
    /// Recognised variables: `REAL_HOST_PATH`, `PARASCAN_TARGET`,
    /// `PARASCAN_MODEL`, `OLLAMA_URL`. Empty values are ignored.
    pub fn apply_env_overrides_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get("REAL_HOST_PATH") {
            self.reports.host_dir = PathBuf::from(path);
        }
        if let Some(target) = get("PARASCAN_TARGET") {
            self.defaults.target = target;
        }
        if let Some(model) = get("PARASCAN_MODEL") {
            self.defaults.model_name = model;
        }
        if let Some(endpoint) = get("OLLAMA_URL") {
            self.llm.endpoint = endpoint;
        }
    }

    /// Reject configurations the coordinator cannot run
    pub fn validate(&self) -> Result<()> {
        if self.tools.is_empty() {
            return Err(Error::Config("at least one tool must be configured".into()));
        }

        let mut seen = HashSet::new();
        for tool in &self.tools {
            if tool.name.trim().is_empty() {
                return Err(Error::Config("tool name must not be empty".into()));
            }
            if !seen.insert(tool.name.as_str()) {
                return Err(Error::Config(format!("duplicate tool name '{}'", tool.name)));
            }
            tool.validate()?;
        }

        if self.llm.wrapper.is_empty() {
            return Err(Error::Config("llm.wrapper must name a program".into()));
        }

        Ok(())
    }

    /// Keep only the named tools, preserving configured order
    pub fn restrict_tools(&mut self, names: &[String]) -> Result<()> {
        if let Some(unknown) = names
            .iter()
            .find(|n| !self.tools.iter().any(|t| &t.name == *n))
        {
            return Err(Error::UnknownTool(unknown.clone()));
        }
        self.tools.retain(|t| names.contains(&t.name));
        Ok(())
    }
}
