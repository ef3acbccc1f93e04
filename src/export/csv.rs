use super::ExportError;
use crate::models::TestResult;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ResultRow<'a> {
    #[serde(rename = "Rank")]
    rank: usize,
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Distance_M")]
    distance: u32,
    #[serde(rename = "Level")]
    level: &'a str,
    #[serde(rename = "VO2max")]
    vo2max: String,
    #[serde(rename = "Date")]
    date: String,
}

/// Export ranked results to CSV (suitable for spreadsheets)
pub fn export_results<P: AsRef<Path>>(results: &[TestResult], output_path: P) -> Result<(), ExportError> {
    let mut writer = ::csv::Writer::from_path(output_path)?;

    for (index, result) in results.iter().enumerate() {
        writer.serialize(ResultRow {
            rank: index + 1,
            name: &result.name,
            distance: result.distance,
            level: &result.level,
            vo2max: format!("{:.2}", result.vo2max),
            date: result.date.to_rfc3339(),
        })?;
    }

    writer.flush()?;
    Ok(())
}
