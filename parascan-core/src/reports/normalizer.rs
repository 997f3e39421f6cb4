//! Conversion of nuclei JSONL output into a self-contained HTML report
//!
//! Rendering is deterministic: the same input bytes always produce the same
//! document. Rows keep the order in which findings were read.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::Result;

use super::models::{Finding, Severity, SeverityCounts};

/// File names the directory scan accepts as nuclei output
#[allow(clippy::expect_used)]
static NUCLEI_JSON_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^nuclei.*\.json$").expect("valid nuclei file pattern"));

const REPORT_TITLE: &str = "Nuclei Scan Report";

const STYLE: &str = r#"        body { font-family: Arial, sans-serif; margin: 20px; }
        table { border-collapse: collapse; width: 100%; margin-top: 20px; }
        th, td { border: 1px solid #ddd; padding: 10px; text-align: left; }
        th { background-color: #333; color: white; }
        .summary span { display: inline-block; margin-right: 12px; padding: 4px 8px; }
        .critical { background-color: #ffcccc; }
        .high { background-color: #ffebcc; }
        .medium { background-color: #ffffcc; }
        .low { background-color: #e6ffcc; }
        .info { background-color: #e6f2ff; }
"#;

/// Parse JSONL content, silently skipping blank and malformed lines
pub fn parse_findings(content: &str) -> Vec<Finding> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(Finding::from_json_line)
        .collect()
}

/// Render findings as a complete HTML document
pub fn render_html(findings: &[Finding]) -> String {
    let counts = SeverityCounts::from_findings(findings);
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("    <meta charset=\"UTF-8\">\n");
    html.push_str(&format!("    <title>{}</title>\n", REPORT_TITLE));
    html.push_str("    <style>\n");
    html.push_str(STYLE);
    html.push_str("    </style>\n</head>\n<body>\n");
    html.push_str(&format!("    <h2>{}</h2>\n", REPORT_TITLE));

    html.push_str("    <div class=\"summary\">\n");
    for severity in Severity::ALL {
        html.push_str(&format!(
            "        <span class=\"{}\">{}: {}</span>\n",
            severity,
            severity.as_str().to_uppercase(),
            counts.get(severity)
        ));
    }
    html.push_str(&format!(
        "        <span>TOTAL: {}</span>\n    </div>\n",
        counts.total()
    ));

    html.push_str("    <table>\n");
    html.push_str("        <tr>\n");
    html.push_str("            <th>Severity</th>\n");
    html.push_str("            <th>Vulnerability Name</th>\n");
    html.push_str("            <th>Target / URL</th>\n");
    html.push_str("        </tr>\n");

    for finding in findings {
        let target = escape_html(&finding.target);
        html.push_str(&format!("        <tr class=\"{}\">\n", finding.severity));
        html.push_str(&format!(
            "            <td><strong>{}</strong></td>\n",
            finding.severity.as_str().to_uppercase()
        ));
        html.push_str(&format!("            <td>{}</td>\n", escape_html(&finding.name)));
        html.push_str(&format!(
            "            <td><a href=\"{}\" target=\"_blank\">{}</a></td>\n",
            target, target
        ));
        html.push_str("        </tr>\n");
    }

    html.push_str("    </table>\n</body>\n</html>\n");
    html
}

/// Convert one JSONL file to HTML next to it (same stem, `.html`)
///
/// Returns `Ok(None)` when the input file does not exist.
pub fn normalize_file(json_path: &Path) -> Result<Option<PathBuf>> {
    if !json_path.is_file() {
        info!(path = %json_path.display(), "No nuclei JSON report found; skipping HTML conversion");
        return Ok(None);
    }

    let bytes = std::fs::read(json_path)?;
    let content = String::from_utf8_lossy(&bytes);
    let findings = parse_findings(&content);
    debug!(path = %json_path.display(), findings = findings.len(), "Parsed nuclei findings");

    let html_path = json_path.with_extension("html");
    std::fs::write(&html_path, render_html(&findings))?;

    info!(path = %html_path.display(), "HTML report generated");
    Ok(Some(html_path))
}

/// Find the first nuclei JSON file in `dir` (lexicographic order)
pub fn find_nuclei_json(dir: &Path) -> Result<Option<PathBuf>> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| NUCLEI_JSON_PATTERN.is_match(name))
        })
        .map(|entry| entry.path())
        .collect();
    candidates.sort();

    Ok(candidates.into_iter().next())
}

/// Convert the first nuclei JSON file found in `dir`
///
/// Returns `Ok(None)` when the directory holds no matching file.
pub fn normalize_dir(dir: &Path) -> Result<Option<PathBuf>> {
    match find_nuclei_json(dir)? {
        Some(json_path) => normalize_file(&json_path),
        None => {
            info!(dir = %dir.display(), "No nuclei JSON report found in directory");
            Ok(None)
        }
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
