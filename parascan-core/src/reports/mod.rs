//! Report normalization module

pub mod models;
pub mod normalizer;

pub use models::{Finding, Severity, SeverityCounts};
pub use normalizer::{find_nuclei_json, normalize_dir, normalize_file, parse_findings, render_html};
