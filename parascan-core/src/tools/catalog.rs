//! Catalogue of scanner tools a job can run

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The kind of external scanner a tool entry invokes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// Template-based web vulnerability scanner emitting newline-delimited JSON
    Nuclei,
    /// Proxy-based active scanner writing an HTML report
    Zap,
    /// Content fuzzer writing an HTML report
    Ffuf,
    /// LLM-safety scanner driven through a wrapper process
    Giskard,
    /// Arbitrary command template with `{target}`, `{job_id}`, `{model}`
    /// and `{reports}` placeholders
    Command,
}

impl ToolKind {
    /// Short name used for artifact files (`<slug>_<job id>.<ext>`)
    pub fn slug(&self) -> &'static str {
        match self {
            ToolKind::Nuclei => "nuclei",
            ToolKind::Zap => "zap",
            ToolKind::Ffuf => "ffuf",
            ToolKind::Giskard => "giskard",
            ToolKind::Command => "command",
        }
    }

    /// Whether the tool writes findings the report normalizer understands
    pub fn emits_json_findings(&self) -> bool {
        matches!(self, ToolKind::Nuclei)
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slug())
    }
}

/// One configured tool of a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub kind: ToolKind,
    /// Non-zero exit codes that still mean the tool completed
    #[serde(default)]
    pub benign_exit_codes: Vec<i32>,
    /// Convert the tool's JSON findings to HTML after a successful run.
    /// Defaults to on for tools that emit JSON findings.
    #[serde(default)]
    pub normalize_report: Option<bool>,
    /// Command template, only used by `kind = "command"`
    #[serde(default)]
    pub command: Vec<String>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, kind: ToolKind) -> Self {
        Self {
            name: name.into(),
            kind,
            benign_exit_codes: Vec::new(),
            normalize_report: None,
            command: Vec::new(),
        }
    }

    /// A `command` tool running the given argv template
    pub fn command<I, S>(name: impl Into<String>, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = Self::new(name, ToolKind::Command);
        spec.command = argv.into_iter().map(Into::into).collect();
        spec
    }

    pub fn with_benign_exit(mut self, code: i32) -> Self {
        if !self.benign_exit_codes.contains(&code) {
            self.benign_exit_codes.push(code);
        }
        self
    }

    pub fn with_report_normalization(mut self, enabled: bool) -> Self {
        self.normalize_report = Some(enabled);
        self
    }

    /// Whether a successful run is followed by report normalization
    pub fn normalizes_report(&self) -> bool {
        self.normalize_report.unwrap_or_else(|| self.kind.emits_json_findings())
    }

    /// Prefix of this tool's artifact files: the kind's slug for built-in
    /// scanners, the tool name for command templates
    pub fn artifact_prefix(&self) -> &str {
        match self.kind {
            ToolKind::Command => &self.name,
            kind => kind.slug(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.kind == ToolKind::Command && self.command.is_empty() {
            return Err(Error::Config(format!(
                "tool '{}' has kind = \"command\" but no command",
                self.name
            )));
        }
        if self.benign_exit_codes.contains(&0) {
            return Err(Error::Config(format!(
                "tool '{}': exit code 0 is always a success",
                self.name
            )));
        }
        Ok(())
    }
}

/// The tool set run when no configuration says otherwise
pub fn default_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new("nuclei", ToolKind::Nuclei),
        // zap-full-scan exits 2 when the scan completed with warnings
        ToolSpec::new("zap", ToolKind::Zap).with_benign_exit(2),
        ToolSpec::new("giskard", ToolKind::Giskard),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tools() {
        let tools = default_tools();
        assert_eq!(tools.len(), 3);

        let zap = tools.iter().find(|t| t.name == "zap").unwrap();
        assert_eq!(zap.benign_exit_codes, vec![2]);

        let nuclei = tools.iter().find(|t| t.name == "nuclei").unwrap();
        assert!(nuclei.normalizes_report());
        assert!(nuclei.benign_exit_codes.is_empty());

        let giskard = tools.iter().find(|t| t.name == "giskard").unwrap();
        assert!(!giskard.normalizes_report());
    }

    #[test]
    fn test_normalization_override() {
        let spec = ToolSpec::new("nuclei", ToolKind::Nuclei).with_report_normalization(false);
        assert!(!spec.normalizes_report());

        let spec = ToolSpec::command("custom", ["sh", "-c", "true"]).with_report_normalization(true);
        assert!(spec.normalizes_report());
    }

    #[test]
    fn test_with_benign_exit_dedupes() {
        let spec = ToolSpec::new("zap", ToolKind::Zap)
            .with_benign_exit(2)
            .with_benign_exit(2);
        assert_eq!(spec.benign_exit_codes, vec![2]);
    }

    #[test]
    fn test_validate_command_requires_argv() {
        let spec = ToolSpec::new("empty", ToolKind::Command);
        assert!(spec.validate().is_err());

        let spec = ToolSpec::command("echo", ["echo", "{target}"]);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_as_benign() {
        let spec = ToolSpec::new("zap", ToolKind::Zap).with_benign_exit(0);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_artifact_prefix() {
        assert_eq!(ToolSpec::new("deep-nuclei", ToolKind::Nuclei).artifact_prefix(), "nuclei");
        assert_eq!(ToolSpec::command("mytool", ["true"]).artifact_prefix(), "mytool");
    }

    #[test]
    fn test_kind_serde() {
        let spec: ToolSpec = toml::from_str("name = \"fuzz\"\nkind = \"ffuf\"").unwrap();
        assert_eq!(spec.kind, ToolKind::Ffuf);
        assert_eq!(spec.kind.to_string(), "ffuf");
        assert!(spec.normalize_report.is_none());
    }
}
