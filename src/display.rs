//! Terminal rendering for the operator console

use colored::*;
use tabled::{settings::Style, Table, Tabled};

use crate::cues::CueSink;
use crate::export::rank_by_distance;
use crate::models::{AthleteStatus, TestResult};
use crate::roster::{Roster, WarnOutcome};
use crate::session::{Completion, Phase, TestSession, TickOutcome, Urgency};
use crate::stages::StageTable;

#[derive(Tabled)]
struct StandingRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Athlete")]
    name: String,
    #[tabled(rename = "Distance (m)")]
    distance: u32,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "VO2max")]
    vo2max: String,
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Athlete")]
    name: String,
    #[tabled(rename = "Distance (m)")]
    distance: u32,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "VO2max")]
    vo2max: String,
}

#[derive(Tabled)]
struct StageRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Speed (km/h)")]
    speed: String,
    #[tabled(rename = "Leg (s)")]
    leg: String,
    #[tabled(rename = "Shuttle (s)")]
    ticks: u32,
    #[tabled(rename = "Total (m)")]
    distance: u32,
}

#[derive(Tabled)]
struct RosterRow {
    #[tabled(rename = "#")]
    number: usize,
    #[tabled(rename = "Athlete")]
    name: String,
    #[tabled(rename = "Warnings")]
    warnings: u8,
    #[tabled(rename = "Status")]
    status: String,
}

/// Final standings, furthest distance first
pub fn standings_table(results: &[TestResult]) -> String {
    let rows = rank_by_distance(results)
        .into_iter()
        .enumerate()
        .map(|(i, r)| StandingRow {
            rank: i + 1,
            name: r.name,
            distance: r.distance,
            level: r.level,
            vo2max: format!("{:.2}", r.vo2max),
        });

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Stored results in the order given
pub fn history_table(results: &[TestResult]) -> String {
    let rows = results.iter().map(|r| HistoryRow {
        date: r.date.format("%Y-%m-%d %H:%M").to_string(),
        name: r.name.clone(),
        distance: r.distance,
        level: r.level.clone(),
        vo2max: format!("{:.2}", r.vo2max),
    });

    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn stages_table(table: &StageTable) -> String {
    let rows = table.stages().iter().enumerate().map(|(i, s)| StageRow {
        index: i + 1,
        level: s.level.clone(),
        speed: format!("{:.1}", s.speed_kmh),
        leg: format!("{:.2}", s.shuttle_seconds),
        ticks: s.round_trip_ticks(),
        distance: s.cumulative_distance,
    });

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Athletes with their warning count; numbers are accepted by `warn #`
pub fn roster_table(roster: &Roster) -> String {
    let rows = roster.athletes().iter().enumerate().map(|(i, a)| RosterRow {
        number: i + 1,
        name: a.name().to_string(),
        warnings: a.warnings(),
        status: match a.status() {
            AthleteStatus::Active => "running".to_string(),
            AthleteStatus::Finished(result) => format!("out at {} m", result.distance),
        },
    });

    Table::new(rows).with(Style::rounded()).to_string()
}

fn paint(text: String, urgency: Urgency) -> ColoredString {
    match urgency {
        Urgency::Idle => text.normal(),
        Urgency::Steady => text.green(),
        Urgency::Hurry => text.yellow(),
        Urgency::Critical => text.red().bold(),
        Urgency::Recovery => text.blue(),
    }
}

/// One-line clock summary
pub fn status_line<C: CueSink>(session: &TestSession<C>) -> String {
    let stage = session
        .current_stage()
        .map(|s| format!("level {} @ {:.1} km/h", s.level, s.speed_kmh))
        .unwrap_or_else(|| "get ready".to_string());

    let clock = format!("{:>8} {:>3}s", session.phase().to_string(), session.remaining());
    format!(
        "{}  {}  {} active / {}",
        paint(clock, session.urgency()),
        stage,
        session.roster().active_count(),
        session.roster().len()
    )
}

/// Operator line for a clock event; `None` for ticks not worth printing.
///
/// Completion is left to [`completion_line`], since commands can also end a test.
pub fn tick_line<C: CueSink>(outcome: &TickOutcome, session: &TestSession<C>) -> Option<String> {
    match outcome {
        TickOutcome::Counting {
            phase: Phase::Preparing,
            remaining,
        } => Some(format!("Starting in {}...", remaining).dimmed().to_string()),
        TickOutcome::Counting { .. } | TickOutcome::Completed { .. } | TickOutcome::Idle => None,
        TickOutcome::Transitioned { to: Phase::Running, .. } => {
            let stage = session.current_stage()?;
            Some(format!(
                "{} Level {}  {:.1} km/h  {}s",
                ">>".green().bold(),
                stage.level.bold(),
                stage.speed_kmh,
                stage.round_trip_ticks()
            ))
        }
        TickOutcome::Transitioned { to: Phase::Resting, .. } => Some(format!(
            "{} Rest {}s",
            "..".blue().bold(),
            session.remaining()
        )),
        TickOutcome::Transitioned { .. } => None,
    }
}

pub fn completion_line(reason: Completion) -> String {
    let text = match reason {
        Completion::TableExhausted => "Test complete: every stage was run",
        Completion::AllEliminated => "Test complete: all athletes are out",
        Completion::Aborted => "Test stopped by the operator",
    };
    text.green().bold().to_string()
}

pub fn warn_line(outcome: &WarnOutcome) -> String {
    match outcome {
        WarnOutcome::Warned { name } => {
            format!("{} {} warned (1 of 2)", "!".yellow().bold(), name.bold())
        }
        WarnOutcome::Eliminated(result) => format!(
            "{} {} is out: {} m, level {}, VO2max {:.2}",
            "x".red().bold(),
            result.name.bold(),
            result.distance,
            result.level,
            result.vo2max
        ),
    }
}
