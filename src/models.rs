use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label credited to athletes who never completed a stage
pub const START_LEVEL_LABEL: &str = "Início";

/// One protocol stage: a single 40m shuttle (20m out, 20m back) at a fixed speed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Display label, e.g. "14.3" (speed level 14, third shuttle)
    pub level: String,

    /// Running speed in km/h
    pub speed_kmh: f64,

    /// Seconds allotted for one 20m leg
    pub shuttle_seconds: f64,

    /// Total meters covered by an athlete who completes this stage
    pub cumulative_distance: u32,
}

impl Stage {
    pub fn new(level: impl Into<String>, speed_kmh: f64, shuttle_seconds: f64, cumulative_distance: u32) -> Self {
        Self {
            level: level.into(),
            speed_kmh,
            shuttle_seconds,
            cumulative_distance,
        }
    }

    /// Whole clock ticks needed for the out-and-back shuttle.
    ///
    /// A fractional remainder still costs a full tick.
    pub fn round_trip_ticks(&self) -> u32 {
        // Tolerate float noise such as 12.000000000000002
        (self.shuttle_seconds * 2.0 - 1e-9).ceil().max(1.0) as u32
    }
}

/// Distance and level credited to an athlete when they stop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCredit {
    pub distance: u32,
    pub level: String,
}

impl StageCredit {
    /// Credit for an athlete who stopped before completing any stage
    pub fn start() -> Self {
        Self {
            distance: 0,
            level: START_LEVEL_LABEL.to_string(),
        }
    }
}

impl From<&Stage> for StageCredit {
    fn from(stage: &Stage) -> Self {
        Self {
            distance: stage.cumulative_distance,
            level: stage.level.clone(),
        }
    }
}

/// Final outcome for one athlete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,

    /// Meters covered over fully completed stages
    pub distance: u32,

    /// Label of the last fully completed stage
    pub level: String,

    /// Estimated VO2max in ml/kg/min
    pub vo2max: f64,

    /// When the athlete finished
    pub date: DateTime<Utc>,
}

impl TestResult {
    pub fn from_credit(name: impl Into<String>, credit: &StageCredit, date: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            distance: credit.distance,
            level: credit.level.clone(),
            vo2max: crate::vo2max::estimate(credit.distance),
            date,
        }
    }
}

/// Participation state of an athlete
#[derive(Debug, Clone, PartialEq)]
pub enum AthleteStatus {
    Active,
    /// Finished athletes carry their immutable result
    Finished(TestResult),
}

/// Per-athlete state during a test run
#[derive(Debug, Clone, PartialEq)]
pub struct Athlete {
    pub(crate) name: String,
    pub(crate) warnings: u8,
    pub(crate) status: AthleteStatus,
}

impl Athlete {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            warnings: 0,
            status: AthleteStatus::Active,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 0 or 1; the eliminating warning is not counted
    pub fn warnings(&self) -> u8 {
        self.warnings
    }

    pub fn status(&self) -> &AthleteStatus {
        &self.status
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, AthleteStatus::Active)
    }

    pub fn result(&self) -> Option<&TestResult> {
        match &self.status {
            AthleteStatus::Active => None,
            AthleteStatus::Finished(result) => Some(result),
        }
    }
}
