use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::models::TestResult;

pub mod csv;
pub mod json;
pub mod text;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Csv,
    Json,
    Text,
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "text" | "txt" => Ok(ExportFormat::Text),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] ::csv::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
}

/// Aggregate figures for a set of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub athlete_count: usize,
    pub best_distance: u32,
    pub mean_distance: f64,
    pub mean_vo2max: f64,
}

impl ReportSummary {
    pub fn from_results(results: &[TestResult]) -> Option<Self> {
        if results.is_empty() {
            return None;
        }

        let count = results.len() as f64;
        Some(Self {
            athlete_count: results.len(),
            best_distance: results.iter().map(|r| r.distance).max().unwrap_or(0),
            mean_distance: results.iter().map(|r| r.distance as f64).sum::<f64>() / count,
            mean_vo2max: results.iter().map(|r| r.vo2max).sum::<f64>() / count,
        })
    }
}

/// Ranked results ready for export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsReport {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    /// Furthest distance first
    pub results: Vec<TestResult>,
}

impl ResultsReport {
    pub fn new(title: impl Into<String>, results: &[TestResult]) -> Result<Self, ExportError> {
        let summary = ReportSummary::from_results(results)
            .ok_or_else(|| ExportError::InsufficientData("No results to export".to_string()))?;

        Ok(Self {
            title: title.into(),
            generated_at: Utc::now(),
            summary,
            results: rank_by_distance(results),
        })
    }
}

/// Results sorted by distance, furthest first; ties keep their original order
pub fn rank_by_distance(results: &[TestResult]) -> Vec<TestResult> {
    let mut ranked = results.to_vec();
    ranked.sort_by(|a, b| b.distance.cmp(&a.distance));
    ranked
}

/// Write `results` to `output_path` in the requested format
pub fn export_results<P: AsRef<Path>>(
    results: &[TestResult],
    format: ExportFormat,
    output_path: P,
) -> Result<(), ExportError> {
    let report = ResultsReport::new("Yo-Yo IR1 results", results)?;

    match format {
        ExportFormat::Csv => csv::export_results(&report.results, output_path),
        ExportFormat::Json => json::export_report(&report, output_path),
        ExportFormat::Text => text::export_report(&report, output_path),
    }?;

    tracing::info!(?format, count = results.len(), "Results exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn sample_results() -> Vec<TestResult> {
        let date = Utc.with_ymd_and_hms(2024, 9, 12, 18, 0, 0).unwrap();
        vec![
            TestResult {
                name: "Ana".to_string(),
                distance: 480,
                level: "14.1".to_string(),
                vo2max: crate::vo2max::estimate(480),
                date,
            },
            TestResult {
                name: "Bruno".to_string(),
                distance: 1040,
                level: "15.7".to_string(),
                vo2max: crate::vo2max::estimate(1040),
                date,
            },
        ]
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("txt".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_report_ranks_and_summarises() {
        let report = ResultsReport::new("Squad", &sample_results()).unwrap();

        assert_eq!(report.results[0].name, "Bruno");
        assert_eq!(report.summary.athlete_count, 2);
        assert_eq!(report.summary.best_distance, 1040);
        assert!((report.summary.mean_distance - 760.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_results_rejected() {
        assert!(matches!(
            ResultsReport::new("Empty", &[]),
            Err(ExportError::InsufficientData(_))
        ));
    }
}
