//! Finding model for scanner output

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a finding, ordered `Info < Low < Medium < High < Critical`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Every severity, most severe first
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    /// Lenient parse: anything unrecognised is `Info`
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "info" => Ok(Severity::Info),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// One finding as shown in a normalized report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub name: String,
    pub target: String,
}

impl Finding {
    /// Parse one JSONL line; `None` if it is not a JSON object.
    ///
    /// Fields are read leniently: a missing or oddly typed field falls back
    /// to its default instead of dropping the line.
    pub fn from_json_line(line: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(line).ok()?;
        let record = value.as_object()?;

        let info = record.get("info");
        let info_str = |key: &str| info.and_then(|i| i.get(key)).and_then(Value::as_str);
        let record_str = |key: &str| record.get(key).and_then(Value::as_str);

        Some(Self {
            severity: info_str("severity")
                .map(Severity::from_label)
                .unwrap_or_default(),
            name: info_str("name").unwrap_or("Unknown").to_string(),
            target: record_str("host")
                .or_else(|| record_str("matched-at"))
                .unwrap_or("Unknown")
                .to_string(),
        })
    }
}

/// Finding counts by severity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    pub info: u32,
}

impl SeverityCounts {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            *counts.slot(finding.severity) += 1;
        }
        counts
    }

    pub fn get(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Info => self.info,
        }
    }

    pub fn total(&self) -> u32 {
        self.critical + self.high + self.medium + self.low + self.info
    }

    fn slot(&mut self, severity: Severity) -> &mut u32 {
        match severity {
            Severity::Critical => &mut self.critical,
            Severity::High => &mut self.high,
            Severity::Medium => &mut self.medium,
            Severity::Low => &mut self.low,
            Severity::Info => &mut self.info,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::Low > Severity::Info);
        assert_eq!(Severity::default(), Severity::Info);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
        assert!("urgent".parse::<Severity>().is_err());
        assert_eq!(Severity::from_label("urgent"), Severity::Info);
        assert_eq!(Severity::from_label(" Critical "), Severity::Critical);
    }

    #[test]
    fn test_finding_from_json_line() {
        let finding =
            Finding::from_json_line(r#"{"info":{"severity":"high","name":"X"},"host":"http://t"}"#)
                .unwrap();
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.name, "X");
        assert_eq!(finding.target, "http://t");
    }

    #[test]
    fn test_finding_defaults() {
        let finding = Finding::from_json_line(r#"{"matched-at":"http://t/login"}"#).unwrap();
        assert_eq!(finding.severity, Severity::Info);
        assert_eq!(finding.name, "Unknown");
        assert_eq!(finding.target, "http://t/login");

        let finding = Finding::from_json_line("{}").unwrap();
        assert_eq!(finding.target, "Unknown");
    }

    #[test]
    fn test_finding_tolerates_odd_field_types() {
        let finding = Finding::from_json_line(
            r#"{"info":{"severity":"high","name":"X"},"host":"http://t","matched-at":["a"]}"#,
        )
        .unwrap();
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.name, "X");
        assert_eq!(finding.target, "http://t");

        let finding = Finding::from_json_line(
            r#"{"info":{"severity":3,"name":"Y"},"host":80,"matched-at":"http://t:80/"}"#,
        )
        .unwrap();
        assert_eq!(finding.severity, Severity::Info);
        assert_eq!(finding.name, "Y");
        assert_eq!(finding.target, "http://t:80/");

        let finding = Finding::from_json_line(r#"{"info":"broken","host":null}"#).unwrap();
        assert_eq!(finding.name, "Unknown");
        assert_eq!(finding.target, "Unknown");
    }

    #[test]
    fn test_finding_rejects_non_objects() {
        assert!(Finding::from_json_line("{not json").is_none());
        assert!(Finding::from_json_line("42").is_none());
        assert!(Finding::from_json_line(r#"["a"]"#).is_none());
    }

    #[test]
    fn test_severity_counts() {
        let findings = vec![
            Finding {
                severity: Severity::High,
                name: "a".into(),
                target: "t".into(),
            },
            Finding {
                severity: Severity::High,
                name: "b".into(),
                target: "t".into(),
            },
            Finding {
                severity: Severity::Info,
                name: "c".into(),
                target: "t".into(),
            },
        ];
        let counts = SeverityCounts::from_findings(&findings);
        assert_eq!(counts.high, 2);
        assert_eq!(counts.get(Severity::Info), 1);
        assert_eq!(counts.get(Severity::Critical), 0);
        assert_eq!(counts.total(), 3);
    }
}
