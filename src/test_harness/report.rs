//! Test report generation
//!
//! Generates test reports in multiple formats:
//! - Text (human-readable console output)
//! - JSON (machine-readable)
//! - JUnit XML (CI/CD integration)

use super::runner::CaseOutcome;
use super::validator::Verdict;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Complete test run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    /// Repository or case name
    pub application: String,

    /// Run ID
    pub run_id: String,

    /// Start time (ISO 8601)
    pub start_time: String,

    /// End time (ISO 8601)
    pub end_time: String,

    /// Total duration in milliseconds
    pub duration_ms: u64,

    /// Summary statistics
    pub summary: TestSummary,

    /// Per-case results in execution order
    pub cases: Vec<CaseReport>,
}

/// Summary statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Cases that passed without asserting anything
    pub invalid: usize,
    /// Cases aborted before validation
    pub errors: usize,
    pub warnings: usize,
}

impl TestSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

/// Report for a single case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    pub name: String,

    /// `suite/module` the case belongs to
    pub group: String,

    pub status: CaseStatus,

    pub duration_ms: u64,

    /// Failure or error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Number of validation rows captured
    pub rows: usize,
}

/// Case outcome status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Failed,
    Invalid,
    Error,
}

impl CaseReport {
    pub fn from_outcome(outcome: &CaseOutcome, group: &str) -> Self {
        let (status, message) = match &outcome.verdict {
            Some(Verdict::Pass) => (CaseStatus::Passed, None),
            Some(Verdict::Fail(message)) => (CaseStatus::Failed, Some(message.clone())),
            Some(Verdict::Invalid) => (
                CaseStatus::Invalid,
                Some("result contains no boolean, nothing was asserted".to_string()),
            ),
            None => (CaseStatus::Error, outcome.errors.first().cloned()),
        };

        Self {
            name: outcome.name.clone(),
            group: group.to_string(),
            status,
            duration_ms: outcome.duration_ms,
            message,
            warnings: outcome.warnings.clone(),
            rows: outcome.rows.len(),
        }
    }
}

/// Report generator
#[derive(Debug)]
pub struct ReportGenerator {
    application: String,
    run_id: String,
    cases: Vec<CaseReport>,
    start_time: chrono::DateTime<chrono::Utc>,
}

impl ReportGenerator {
    /// Create new report generator
    pub fn new(application: &str, run_id: &str) -> Self {
        Self {
            application: application.to_string(),
            run_id: run_id.to_string(),
            cases: Vec::new(),
            start_time: chrono::Utc::now(),
        }
    }

    /// Add one finished case
    pub fn add_case(&mut self, outcome: &CaseOutcome, group: &str) {
        self.cases.push(CaseReport::from_outcome(outcome, group));
    }

    pub fn cases(&self) -> &[CaseReport] {
        &self.cases
    }

    /// Generate final report
    pub fn generate(&self) -> TestReport {
        let end_time = chrono::Utc::now();
        let duration = end_time - self.start_time;

        TestReport {
            application: self.application.clone(),
            run_id: self.run_id.clone(),
            start_time: self.start_time.to_rfc3339(),
            end_time: end_time.to_rfc3339(),
            duration_ms: duration.num_milliseconds().max(0) as u64,
            summary: self.calculate_summary(),
            cases: self.cases.clone(),
        }
    }

    fn calculate_summary(&self) -> TestSummary {
        let count = |status: CaseStatus| self.cases.iter().filter(|c| c.status == status).count();

        TestSummary {
            total: self.cases.len(),
            passed: count(CaseStatus::Passed),
            failed: count(CaseStatus::Failed),
            invalid: count(CaseStatus::Invalid),
            errors: count(CaseStatus::Error),
            warnings: self.cases.iter().map(|c| c.warnings.len()).sum(),
        }
    }
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
    Junit,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "junit" | "xml" => Ok(OutputFormat::Junit),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Write report to output
pub fn write_report(
    report: &TestReport,
    format: OutputFormat,
    writer: &mut dyn Write,
) -> std::io::Result<()> {
    match format {
        OutputFormat::Text => write_text_report(report, writer),
        OutputFormat::Json => write_json_report(report, writer),
        OutputFormat::Junit => write_junit_report(report, writer),
    }
}

fn write_text_report(report: &TestReport, writer: &mut dyn Write) -> std::io::Result<()> {
    writeln!(writer, "\n🧪 HQL Unit Test Report")?;
    writeln!(writer, "════════════════════════════════════════")?;
    writeln!(writer, "Repository: {}", report.application)?;
    writeln!(writer, "Run ID: {}", report.run_id)?;
    writeln!(writer, "Duration: {}ms", report.duration_ms)?;
    writeln!(writer)?;

    writeln!(writer, "📊 Summary")?;
    writeln!(writer, "────────────────────────────────────────")?;
    writeln!(
        writer,
        "Cases: {} total, {} passed, {} failed, {} invalid, {} errors",
        report.summary.total,
        report.summary.passed,
        report.summary.failed,
        report.summary.invalid,
        report.summary.errors
    )?;
    writeln!(writer)?;

    writeln!(writer, "📋 Case Results")?;
    writeln!(writer, "────────────────────────────────────────")?;

    let mut current_group: Option<&str> = None;
    for case in &report.cases {
        if current_group != Some(case.group.as_str()) {
            writeln!(writer, "\n{}", case.group)?;
            current_group = Some(case.group.as_str());
        }

        let status_icon = match case.status {
            CaseStatus::Passed => "✅",
            CaseStatus::Failed => "❌",
            CaseStatus::Invalid => "⚠️",
            CaseStatus::Error => "💥",
        };
        writeln!(
            writer,
            "  {} {} ({}ms, {} rows)",
            status_icon, case.name, case.duration_ms, case.rows
        )?;

        if let Some(ref message) = case.message {
            writeln!(writer, "     {}", message)?;
        }
        for warning in &case.warnings {
            writeln!(writer, "     warning: {}", warning)?;
        }
    }

    writeln!(writer)?;
    if report.summary.is_success() {
        writeln!(writer, "🎉 ALL TESTS PASSED!")?;
    } else {
        writeln!(
            writer,
            "❌ {} failures, {} errors",
            report.summary.failed, report.summary.errors
        )?;
    }

    Ok(())
}

fn write_json_report(report: &TestReport, writer: &mut dyn Write) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    writeln!(writer, "{}", json)
}

/// One `<testsuite>` per case group, in first-seen order
fn write_junit_report(report: &TestReport, writer: &mut dyn Write) -> std::io::Result<()> {
    writeln!(writer, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        writer,
        r#"<testsuites name="{}" tests="{}" failures="{}" errors="{}" time="{:.3}">"#,
        escape_xml(&report.application),
        report.summary.total,
        report.summary.failed,
        report.summary.errors,
        report.duration_ms as f64 / 1000.0
    )?;

    let mut groups: Vec<&str> = Vec::new();
    for case in &report.cases {
        if !groups.contains(&case.group.as_str()) {
            groups.push(&case.group);
        }
    }

    for group in groups {
        let cases: Vec<&CaseReport> = report.cases.iter().filter(|c| c.group == group).collect();
        let failures = cases.iter().filter(|c| c.status == CaseStatus::Failed).count();
        let errors = cases.iter().filter(|c| c.status == CaseStatus::Error).count();
        let time: u64 = cases.iter().map(|c| c.duration_ms).sum();

        writeln!(
            writer,
            r#"  <testsuite name="{}" tests="{}" failures="{}" errors="{}" skipped="0" time="{:.3}">"#,
            escape_xml(group),
            cases.len(),
            failures,
            errors,
            time as f64 / 1000.0
        )?;

        for case in cases {
            writeln!(
                writer,
                r#"    <testcase name="{}" classname="{}" time="{:.3}">"#,
                escape_xml(&case.name),
                escape_xml(group),
                case.duration_ms as f64 / 1000.0
            )?;

            let message = case.message.as_deref().unwrap_or_default();
            match case.status {
                CaseStatus::Failed => {
                    writeln!(
                        writer,
                        r#"      <failure type="assertion" message="{}"/>"#,
                        escape_xml(message)
                    )?;
                }
                CaseStatus::Error => {
                    writeln!(
                        writer,
                        r#"      <error message="{}">{}</error>"#,
                        escape_xml(message),
                        escape_xml(message)
                    )?;
                }
                CaseStatus::Invalid => {
                    writeln!(
                        writer,
                        "      <system-out>INVALID: {}</system-out>",
                        escape_xml(message)
                    )?;
                }
                CaseStatus::Passed => {}
            }

            writeln!(writer, "    </testcase>")?;
        }

        writeln!(writer, "  </testsuite>")?;
    }

    writeln!(writer, "</testsuites>")?;
    Ok(())
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
