//! Error types for parascan-core

use miette::Diagnostic;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias using parascan Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for parascan
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(code(parascan::config))]
    Config(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(parascan::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(parascan::serde))]
    Serde(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    #[diagnostic(code(parascan::toml))]
    Toml(#[from] toml::de::Error),

    #[error("Scan ID not found: {0}")]
    #[diagnostic(code(parascan::job_not_found))]
    JobNotFound(Uuid),

    #[error("Unknown tool '{0}'")]
    #[diagnostic(
        code(parascan::unknown_tool),
        help("tool names are fixed when the job is created")
    )]
    UnknownTool(String),

    #[error("Failed to launch {tool}: {source}")]
    #[diagnostic(
        code(parascan::spawn),
        help("check that the tool binary or container runtime is installed and on PATH")
    )]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} was cancelled")]
    #[diagnostic(code(parascan::cancelled))]
    Cancelled(String),

    #[error("Report generation error: {0}")]
    #[diagnostic(code(parascan::report))]
    Report(String),
}
