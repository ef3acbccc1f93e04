//! Protocol stage tables
//!
//! A stage table is the ordered list of shuttles an athlete runs. The table is
//! validated once when built and never changes afterwards.

use serde::{Deserialize, Serialize};

use crate::error::StageTableError;
use crate::models::{Stage, StageCredit};

/// Length of one leg of the shuttle course
pub const LEG_METERS: f64 = 20.0;

/// Distance added by each completed shuttle
pub const SHUTTLE_METERS: u32 = 40;

/// Yo-Yo IR1 speed levels: (level, km/h, shuttles at that level)
const IR1_LEVELS: &[(u8, f64, u8)] = &[
    (5, 10.0, 1),
    (9, 12.0, 1),
    (11, 13.0, 2),
    (12, 13.5, 3),
    (13, 14.0, 4),
    (14, 14.5, 8),
    (15, 15.0, 8),
    (16, 15.5, 8),
    (17, 16.0, 8),
    (18, 16.5, 8),
    (19, 17.0, 8),
    (20, 17.5, 8),
    (21, 18.0, 8),
    (22, 18.5, 8),
    (23, 19.0, 8),
];

/// Seconds needed to cover one leg at the given speed
pub fn leg_seconds(speed_kmh: f64) -> f64 {
    LEG_METERS * 3.6 / speed_kmh
}

/// Validated, immutable sequence of stages
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StageTable {
    stages: Vec<Stage>,
}

impl StageTable {
    /// Build a table, checking ordering and timing invariants
    pub fn new(stages: Vec<Stage>) -> Result<Self, StageTableError> {
        if stages.is_empty() {
            return Err(StageTableError::Empty);
        }

        for (index, stage) in stages.iter().enumerate() {
            if !stage.shuttle_seconds.is_finite() || stage.shuttle_seconds <= 0.0 {
                return Err(StageTableError::InvalidShuttleTime {
                    index,
                    seconds: stage.shuttle_seconds,
                });
            }
        }

        for (index, pair) in stages.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            if current.cumulative_distance <= previous.cumulative_distance {
                return Err(StageTableError::NonIncreasingDistance {
                    index: index + 1,
                    previous: previous.cumulative_distance,
                    current: current.cumulative_distance,
                });
            }
            if current.speed_kmh < previous.speed_kmh {
                return Err(StageTableError::DecreasingSpeed {
                    index: index + 1,
                    previous: previous.speed_kmh,
                    current: current.speed_kmh,
                });
            }
        }

        Ok(Self { stages })
    }

    /// The standard Yo-Yo Intermittent Recovery level 1 protocol (91 shuttles, 3640m)
    pub fn yoyo_ir1() -> Self {
        let mut stages = Vec::new();
        let mut distance = 0;

        for &(level, speed_kmh, shuttles) in IR1_LEVELS {
            for shuttle in 1..=shuttles {
                distance += SHUTTLE_METERS;
                stages.push(Stage::new(
                    format!("{}.{}", level, shuttle),
                    speed_kmh,
                    leg_seconds(speed_kmh),
                    distance,
                ));
            }
        }

        Self { stages }
    }

    pub fn get(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn last(&self) -> Option<&Stage> {
        self.stages.last()
    }

    /// Credit for an athlete who fully completed `stages_completed` stages
    pub fn credit(&self, stages_completed: usize) -> StageCredit {
        stages_completed
            .checked_sub(1)
            .and_then(|index| self.stages.get(index))
            .map(StageCredit::from)
            .unwrap_or_else(StageCredit::start)
    }
}

impl Default for StageTable {
    fn default() -> Self {
        Self::yoyo_ir1()
    }
}

impl<'de> Deserialize<'de> for StageTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let stages = Vec::<Stage>::deserialize(deserializer)?;
        StageTable::new(stages).map_err(serde::de::Error::custom)
    }
}
