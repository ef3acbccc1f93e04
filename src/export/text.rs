use super::{ExportError, ResultsReport};
use std::io::Write;
use std::path::Path;

/// Export a results report to human-readable text format
pub fn export_report<P: AsRef<Path>>(report: &ResultsReport, output_path: P) -> Result<(), ExportError> {
    let mut file = std::fs::File::create(output_path)?;
    write_report(report, &mut file)?;
    Ok(())
}

fn write_report<W: Write>(report: &ResultsReport, out: &mut W) -> std::io::Result<()> {
    // Header
    writeln!(out, "{:=<64}", "")?;
    writeln!(out, "{}", report.title.to_uppercase())?;
    writeln!(out, "{:=<64}", "")?;
    writeln!(out)?;
    writeln!(out, "Generated: {}", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(out)?;

    writeln!(out, "SUMMARY")?;
    writeln!(out, "{:-<64}", "")?;
    writeln!(out, "Athletes: {}", report.summary.athlete_count)?;
    writeln!(out, "Best Distance: {} m", report.summary.best_distance)?;
    writeln!(out, "Mean Distance: {:.0} m", report.summary.mean_distance)?;
    writeln!(out, "Mean VO2max: {:.2} ml/kg/min", report.summary.mean_vo2max)?;
    writeln!(out)?;

    writeln!(out, "RESULTS")?;
    writeln!(out, "{:-<64}", "")?;
    writeln!(out, "{:<5} {:<20} {:>10} {:>8} {:>8}  {}", "Rank", "Athlete", "Distance", "Level", "VO2max", "Date")?;

    for (index, result) in report.results.iter().enumerate() {
        writeln!(
            out,
            "{:<5} {:<20} {:>8} m {:>8} {:>8.2}  {}",
            index + 1,
            result.name,
            result.distance,
            result.level,
            result.vo2max,
            result.date.format("%Y-%m-%d %H:%M")
        )?;
    }

    Ok(())
}
