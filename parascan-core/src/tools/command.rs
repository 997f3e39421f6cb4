//! Command construction for each scanner tool
//!
//! Building is pure: same inputs, same argv. Nothing here touches the
//! filesystem or spawns anything.

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{FuzzerConfig, LlmConfig, ReportsConfig, ScanConfig};

use super::catalog::{ToolKind, ToolSpec};

const NUCLEI_IMAGE: &str = "projectdiscovery/nuclei:latest";
const ZAP_IMAGE: &str = "ghcr.io/zaproxy/zaproxy:stable";
const FFUF_IMAGE: &str = "ghcr.io/ffuf/ffuf:latest";

/// Mount point of the reports volume inside scanner containers
const CONTAINER_REPORTS_DIR: &str = "/reports";
/// ZAP only writes reports into its working directory
const ZAP_WORK_DIR: &str = "/zap/wrk";

/// A fully built command for one tool of one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// Tool name as configured
    pub tool: String,
    /// Executable followed by its arguments
    pub argv: Vec<String>,
}

impl Invocation {
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.argv.join(" "))
    }
}

/// Ensure a model reference carries a tag; untagged references get `:latest`
pub fn normalize_model_name(model_name: &str) -> String {
    if model_name.contains(':') {
        model_name.to_string()
    } else {
        format!("{}:latest", model_name)
    }
}

/// Maps (tool, target, job id, model) to a concrete invocation
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    reports: ReportsConfig,
    llm: LlmConfig,
    fuzzer: FuzzerConfig,
}

impl CommandBuilder {
    pub fn new(reports: ReportsConfig, llm: LlmConfig, fuzzer: FuzzerConfig) -> Self {
        Self {
            reports,
            llm,
            fuzzer,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(
            config.reports.clone(),
            config.llm.clone(),
            config.fuzzer.clone(),
        )
    }

    /// Build the invocation for one tool
    pub fn build(&self, tool: &ToolSpec, target: &str, job_id: Uuid, model_name: &str) -> Invocation {
        let model = normalize_model_name(model_name);
        let host_dir = path_str(&self.reports.host_dir);

        let argv: Vec<String> = match tool.kind {
            ToolKind::Nuclei => vec![
                "docker".into(),
                "run".into(),
                "--rm".into(),
                "--user".into(),
                "root".into(),
                "-v".into(),
                format!("{}:{}", host_dir, CONTAINER_REPORTS_DIR),
                NUCLEI_IMAGE.into(),
                "-u".into(),
                target.into(),
                "-j".into(),
                "-o".into(),
                container_artifact(CONTAINER_REPORTS_DIR, tool, job_id, "json"),
                "-v".into(),
            ],
            ToolKind::Zap => vec![
                "docker".into(),
                "run".into(),
                "--rm".into(),
                "--user".into(),
                "root".into(),
                "-v".into(),
                format!("{}:{}:rw", host_dir, ZAP_WORK_DIR),
                ZAP_IMAGE.into(),
                "zap-full-scan.py".into(),
                "-t".into(),
                target.into(),
                "-r".into(),
                ReportsConfig::artifact_name(tool.artifact_prefix(), job_id, "html"),
                "-d".into(),
            ],
            ToolKind::Ffuf => vec![
                "docker".into(),
                "run".into(),
                "--rm".into(),
                "-v".into(),
                format!("{}:{}", host_dir, CONTAINER_REPORTS_DIR),
                FFUF_IMAGE.into(),
                "-u".into(),
                format!("{}/FUZZ", target.trim_end_matches('/')),
                "-w".into(),
                self.fuzzer.wordlist.clone(),
                "-of".into(),
                "html".into(),
                "-o".into(),
                container_artifact(CONTAINER_REPORTS_DIR, tool, job_id, "html"),
            ],
            ToolKind::Giskard => {
                let mut argv = self.llm.wrapper.clone();
                argv.extend([
                    "--model".into(),
                    model,
                    "--output".into(),
                    path_str(
                        &self
                            .reports
                            .internal_artifact(tool.artifact_prefix(), job_id, "html"),
                    ),
                    "--ollama-url".into(),
                    self.llm.endpoint.clone(),
                ]);
                argv
            }
            ToolKind::Command => tool
                .command
                .iter()
                .map(|token| {
                    token
                        .replace("{target}", target)
                        .replace("{job_id}", &job_id.to_string())
                        .replace("{model}", &model)
                        .replace("{reports}", &host_dir)
                })
                .collect(),
        };

        Invocation {
            tool: tool.name.clone(),
            argv,
        }
    }

    /// Build invocations for every tool, in configured order
    pub fn build_all(
        &self,
        tools: &[ToolSpec],
        target: &str,
        job_id: Uuid,
        model_name: &str,
    ) -> Vec<Invocation> {
        tools
            .iter()
            .map(|tool| self.build(tool, target, job_id, model_name))
            .collect()
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn container_artifact(dir: &str, tool: &ToolSpec, job_id: Uuid, ext: &str) -> String {
    format!(
        "{}/{}",
        dir,
        ReportsConfig::artifact_name(tool.artifact_prefix(), job_id, ext)
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn has(inv: &Invocation, token: &str) -> bool {
        inv.argv.iter().any(|a| a == token)
    }

    fn builder() -> CommandBuilder {
        CommandBuilder::new(
            ReportsConfig::new("/srv/reports"),
            LlmConfig::default(),
            FuzzerConfig::default(),
        )
    }

    #[test]
    fn test_normalize_model_name() {
        assert_eq!(normalize_model_name("llama3"), "llama3:latest");
        assert_eq!(normalize_model_name("llama3:8b"), "llama3:8b");
        assert_eq!(normalize_model_name("mistral:latest"), "mistral:latest");
    }

    #[test]
    fn test_giskard_untagged_model_gets_latest() {
        let id = Uuid::new_v4();
        let inv = builder().build(&ToolSpec::new("giskard", ToolKind::Giskard), "http://t", id, "llama3");

        assert!(has(&inv, "llama3:latest"));
        assert!(!has(&inv, "llama3"));
        assert_eq!(inv.program(), "python");
        assert_eq!(inv.args()[0], "giskard_wrapper.py");
        assert!(has(&inv, "--ollama-url"));
        assert!(has(&inv, "http://host.docker.internal:11434"));
        assert!(has(&inv, &format!("/reports/giskard_{}.html", id)));
    }

    #[test]
    fn test_giskard_tagged_model_unchanged() {
        let inv = builder().build(
            &ToolSpec::new("giskard", ToolKind::Giskard),
            "http://t",
            Uuid::new_v4(),
            "llama3:8b",
        );
        assert!(has(&inv, "llama3:8b"));
        assert!(!has(&inv, "llama3:8b:latest"));
    }

    #[test]
    fn test_nuclei_invocation() {
        let id = Uuid::new_v4();
        let inv = builder().build(&ToolSpec::new("nuclei", ToolKind::Nuclei), "http://t", id, "m");

        assert_eq!(inv.tool, "nuclei");
        assert_eq!(inv.program(), "docker");
        assert!(has(&inv, "/srv/reports:/reports"));
        assert!(has(&inv, "projectdiscovery/nuclei:latest"));
        assert!(has(&inv, "-j"));
        assert!(has(&inv, &format!("/reports/nuclei_{}.json", id)));

        let u = inv.argv.iter().position(|a| a == "-u").unwrap();
        assert_eq!(inv.argv[u + 1], "http://t");
    }

    #[test]
    fn test_zap_invocation() {
        let id = Uuid::new_v4();
        let inv = builder().build(&ToolSpec::new("zap", ToolKind::Zap), "http://t", id, "m");

        assert!(has(&inv, "/srv/reports:/zap/wrk:rw"));
        assert!(has(&inv, "zap-full-scan.py"));
        assert!(has(&inv, &format!("zap_{}.html", id)));
        assert_eq!(inv.argv.last().unwrap(), "-d");
    }

    #[test]
    fn test_ffuf_invocation() {
        let id = Uuid::new_v4();
        let inv = builder().build(&ToolSpec::new("ffuf", ToolKind::Ffuf), "http://t/", id, "m");

        assert!(has(&inv, "http://t/FUZZ"));
        assert!(has(&inv, "/usr/share/wordlists/dirb/common.txt"));
        assert!(has(&inv, &format!("/reports/ffuf_{}.html", id)));
    }

    #[test]
    fn test_command_placeholders() {
        let id = Uuid::new_v4();
        let spec = ToolSpec::command(
            "echo",
            ["echo", "{target}", "{job_id}", "{model}", "{reports}/out.txt"],
        );
        let inv = builder().build(&spec, "http://t", id, "phi3");

        assert_eq!(
            inv.argv,
            vec![
                "echo".to_string(),
                "http://t".to_string(),
                id.to_string(),
                "phi3:latest".to_string(),
                "/srv/reports/out.txt".to_string(),
            ]
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let b = builder();
        let id = Uuid::new_v4();
        let tools = crate::tools::default_tools();
        assert_eq!(
            b.build_all(&tools, "http://t", id, "llama3"),
            b.build_all(&tools, "http://t", id, "llama3")
        );
    }

    #[test]
    fn test_display_joins_argv() {
        let inv = Invocation {
            tool: "x".into(),
            argv: vec!["sh".into(), "-c".into(), "true".into()],
        };
        assert_eq!(inv.to_string(), "sh -c true");
        assert_eq!(inv.program(), "sh");
        assert_eq!(inv.args().len(), 2);
    }
}
