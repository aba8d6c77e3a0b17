//! Report export
//!
//! Turns a completed session's final report into a downloadable artifact.
//! The JSON form carries every backend-defined field verbatim, so parsing
//! the artifact back yields the original report. The text form follows the
//! backend presenter's "IMARA RESEARCH REPORT" layout for reading.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::format::{format_confidence, format_score};
use crate::types::{FinalReport, Session, SessionStatus};

/// Default file name for JSON exports
pub const JSON_FILE_NAME: &str = "imara-research-report.json";

/// Default file name for text exports
pub const TEXT_FILE_NAME: &str = "imara-research-report.txt";

const RULE: &str = "======================================================================";

/// Artifact encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Pretty-printed JSON of the full report
    #[default]
    Json,
    /// Plain-text report
    Text,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Text => "text",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ExportFormat::Json => JSON_FILE_NAME,
            ExportFormat::Text => TEXT_FILE_NAME,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Text => "text/plain; charset=utf-8",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "json" => Ok(ExportFormat::Json),
            "text" | "txt" => Ok(ExportFormat::Text),
            _ => Err(format!("unknown export format: {}", s)),
        }
    }
}

/// A ready-to-save export
#[derive(Debug, Clone, PartialEq)]
pub struct ReportArtifact {
    pub file_name: &'static str,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ReportArtifact {
    /// Write the artifact into `dir` under its file name
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name);
        std::fs::write(&path, &self.bytes)?;
        tracing::info!(path = %path.display(), bytes = self.bytes.len(), "Report saved");
        Ok(path)
    }
}

/// Export a completed session's final report
pub fn export(session: &Session, format: ExportFormat) -> Result<ReportArtifact> {
    let report = match (&session.status, &session.final_report) {
        (SessionStatus::Completed, Some(report)) => report,
        _ => {
            return Err(Error::NotCompleted {
                status: session.status,
            })
        }
    };

    let bytes = match format {
        ExportFormat::Json => export_json(report)?,
        ExportFormat::Text => render_text(session, report).into_bytes(),
    };

    Ok(ReportArtifact {
        file_name: format.file_name(),
        content_type: format.content_type(),
        bytes,
    })
}

/// Pretty-printed JSON of the full report
pub fn export_json(report: &FinalReport) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(report)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parse a JSON artifact back into a report
pub fn parse_json(bytes: &[u8]) -> Result<FinalReport> {
    Ok(serde_json::from_slice(bytes)?)
}

fn render_text(session: &Session, report: &FinalReport) -> String {
    let metrics = report.metrics();
    let section = |field: &str| report.text(field).unwrap_or("N/A").trim().to_string();

    let mut out = String::new();
    out.push_str(RULE);
    out.push_str("\n              IMARA RESEARCH REPORT\n");
    out.push_str(RULE);
    out.push_str("\n\n");

    out.push_str(&format!("QUERY: {}\n", session.query));
    if let Some(routing) = &session.routing {
        out.push_str(&format!(
            "ROUTE: {} (confidence {})\n",
            routing.path,
            format_confidence(Some(routing))
        ));
    }
    out.push('\n');

    for (heading, field) in [
        ("RESEARCH FINDINGS", "research"),
        ("CODE GENERATED", "code"),
        ("REVIEW FEEDBACK", "review"),
    ] {
        out.push_str(&format!("{}:\n{}\n\n{}\n\n", heading, section(field), RULE));
    }

    out.push_str("QUALITY METRICS:\n");
    out.push_str(&format!("Grade:           {}\n", metrics.grade_or_default()));
    out.push_str(&format!(
        "Overall Score:   {}\n",
        format_score(metrics.score_or_default())
    ));
    out.push_str(&format!(
        "Papers Analyzed: {}\n",
        metrics.paper_count_or_default()
    ));
    for (dimension, score) in &metrics.breakdown {
        out.push_str(&format!("  {:<16} {}\n", format!("{}:", dimension), score));
    }
    out.push_str(RULE);
    out.push('\n');
    out
}
