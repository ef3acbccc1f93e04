//! Test clock and stage progression
//!
//! A [`TestSession`] is advanced by an external scheduler calling [`TestSession::tick`]
//! once per second. Phases cycle:
//!
//! ```text
//! Preparing -> Running -> Resting -> Running -> ... -> Completed
//! ```
//!
//! Each Running/Resting cycle covers one stage of the table. The session
//! completes when the table is exhausted, when every athlete has been
//! eliminated, or when the operator aborts.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cues::{Cue, CueSink, SilentCues};
use crate::error::{RosterError, SessionError};
use crate::models::{Stage, StageCredit, TestResult};
use crate::roster::{Roster, WarnOutcome};
use crate::stages::StageTable;

/// Fixed durations around the shuttles, in ticks (seconds).
///
/// A phase always lasts at least one tick, so zero behaves like one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolTiming {
    /// Countdown before the first shuttle
    pub preparation_seconds: u32,
    /// Active recovery between shuttles
    pub rest_seconds: u32,
}

impl Default for ProtocolTiming {
    fn default() -> Self {
        Self {
            preparation_seconds: 5,
            rest_seconds: 10,
        }
    }
}

/// Clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Preparing,
    Running,
    Resting,
    Completed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Preparing => write!(f, "Preparing"),
            Phase::Running => write!(f, "Running"),
            Phase::Resting => write!(f, "Resting"),
            Phase::Completed => write!(f, "Completed"),
        }
    }
}

/// Why a session completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every stage of the table was run
    TableExhausted,
    /// No athlete remains active
    AllEliminated,
    /// The operator stopped the test for everyone
    Aborted,
}

/// Result of advancing the clock by one tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Countdown decremented within the same phase
    Counting { phase: Phase, remaining: u32 },
    /// Phase changed; `stage_index` is the stage now being run or rested after
    Transitioned { from: Phase, to: Phase, stage_index: usize },
    /// The session completed on this tick
    Completed { reason: Completion, results: Vec<TestResult> },
    /// The session was already completed; nothing happened
    Idle,
}

/// How urgent the current countdown is, for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    /// Before the first shuttle or after completion
    Idle,
    /// More than 40% of the shuttle time left
    Steady,
    /// More than 20% left
    Hurry,
    /// 20% or less left
    Critical,
    /// Recovery between shuttles
    Recovery,
}

/// One group test run
pub struct TestSession<C: CueSink = SilentCues> {
    id: Uuid,
    table: StageTable,
    timing: ProtocolTiming,
    roster: Roster,
    phase: Phase,
    stage_index: usize,
    remaining: u32,
    elapsed_ticks: u64,
    completion: Option<Completion>,
    results: Option<Vec<TestResult>>,
    cues: C,
}

impl<C: CueSink> TestSession<C> {
    /// Register the athletes and enter the preparation countdown.
    ///
    /// Fails before any clock state exists if the names are invalid.
    pub fn start<I, S>(
        names: I,
        table: StageTable,
        timing: ProtocolTiming,
        cues: C,
    ) -> Result<Self, RosterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roster = Roster::register(names)?;
        let id = Uuid::new_v4();

        tracing::info!(
            session = %id,
            athletes = roster.len(),
            stages = table.len(),
            preparation_seconds = timing.preparation_seconds,
            "Test session created"
        );

        Ok(Self {
            id,
            table,
            timing,
            roster,
            phase: Phase::Preparing,
            stage_index: 0,
            remaining: timing.preparation_seconds.max(1),
            elapsed_ticks: 0,
            completion: None,
            results: None,
            cues,
        })
    }

    /// Advance the clock by one time unit
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase == Phase::Completed {
            return TickOutcome::Idle;
        }

        if self.roster.all_finished() {
            return self.complete(Completion::AllEliminated);
        }

        self.elapsed_ticks += 1;
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            tracing::debug!(phase = %self.phase, remaining = self.remaining, "Tick");
            return TickOutcome::Counting {
                phase: self.phase,
                remaining: self.remaining,
            };
        }

        match self.phase {
            Phase::Preparing => {
                self.stage_index = 0;
                self.enter_running(Phase::Preparing, Cue::Start)
            }
            Phase::Running => {
                self.phase = Phase::Resting;
                self.remaining = self.timing.rest_seconds.max(1);
                self.cues.emit(Cue::Rest);
                tracing::debug!(stage = self.stage_index, "Shuttle over, resting");
                TickOutcome::Transitioned {
                    from: Phase::Running,
                    to: Phase::Resting,
                    stage_index: self.stage_index,
                }
            }
            Phase::Resting => {
                if self.stage_index + 1 >= self.table.len() {
                    let credit = self.table.credit(self.table.len());
                    self.roster.force_finish_all(&credit, Utc::now());
                    return self.complete(Completion::TableExhausted);
                }
                self.stage_index += 1;
                self.enter_running(Phase::Resting, Cue::NextStage)
            }
            Phase::Completed => TickOutcome::Idle,
        }
    }

    /// Record a warning for an athlete.
    ///
    /// An elimination that leaves nobody active completes the session at once.
    pub fn warn(&mut self, name: &str) -> Result<WarnOutcome, RosterError> {
        let credit = self.current_credit();
        let outcome = self.roster.warn(name, &credit, Utc::now())?;

        if matches!(outcome, WarnOutcome::Eliminated(_)) && self.roster.all_finished() {
            self.complete(Completion::AllEliminated);
        }
        Ok(outcome)
    }

    /// Stop the test for every remaining athlete.
    ///
    /// Calling this on a completed session returns the existing results.
    pub fn abort(&mut self) -> Result<&[TestResult], SessionError> {
        match self.phase {
            Phase::Preparing => return Err(SessionError::NotStarted),
            Phase::Running | Phase::Resting => {
                let credit = self.current_credit();
                self.roster.force_finish_all(&credit, Utc::now());
                self.complete(Completion::Aborted);
            }
            Phase::Completed => {}
        }
        Ok(self.results().unwrap_or_default())
    }

    fn enter_running(&mut self, from: Phase, cue: Cue) -> TickOutcome {
        let ticks = self
            .table
            .get(self.stage_index)
            .map(Stage::round_trip_ticks)
            .unwrap_or(1);

        self.phase = Phase::Running;
        self.remaining = ticks;
        self.cues.emit(cue);

        tracing::info!(
            stage = self.stage_index,
            level = %self.current_stage().map(|s| s.level.as_str()).unwrap_or("-"),
            ticks,
            "Shuttle started"
        );
        TickOutcome::Transitioned {
            from,
            to: Phase::Running,
            stage_index: self.stage_index,
        }
    }

    fn complete(&mut self, reason: Completion) -> TickOutcome {
        let results = self.roster.results();

        self.phase = Phase::Completed;
        self.remaining = 0;
        self.completion = Some(reason);
        self.results = Some(results.clone());

        tracing::info!(
            session = %self.id,
            ?reason,
            athletes = results.len(),
            elapsed_seconds = self.elapsed_ticks,
            "Test session completed"
        );
        TickOutcome::Completed { reason, results }
    }

    /// Credit for stopping now: the stage before the current one.
    ///
    /// While resting after stage `i`, stage `i` still counts as in progress
    /// because the warning that follows a shuttle means it was not completed
    /// in time.
    pub fn current_credit(&self) -> StageCredit {
        self.table.credit(self.stage_index)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stage_index(&self) -> usize {
        self.stage_index
    }

    /// Stage being run, or rested after; `None` before the first shuttle
    pub fn current_stage(&self) -> Option<&Stage> {
        match self.phase {
            Phase::Preparing => None,
            _ => self.table.get(self.stage_index),
        }
    }

    /// Ticks left in the current phase
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_ticks
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn table(&self) -> &StageTable {
        &self.table
    }

    pub fn timing(&self) -> ProtocolTiming {
        self.timing
    }

    pub fn cues(&self) -> &C {
        &self.cues
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    pub fn completion(&self) -> Option<Completion> {
        self.completion
    }

    /// Final results in registration order, once completed
    pub fn results(&self) -> Option<&[TestResult]> {
        self.results.as_deref()
    }

    pub fn urgency(&self) -> Urgency {
        match self.phase {
            Phase::Preparing | Phase::Completed => Urgency::Idle,
            Phase::Resting => Urgency::Recovery,
            Phase::Running => {
                let total = self
                    .current_stage()
                    .map(Stage::round_trip_ticks)
                    .unwrap_or(1);
                let fraction = self.remaining as f64 / total as f64;
                if fraction > 0.4 {
                    Urgency::Steady
                } else if fraction > 0.2 {
                    Urgency::Hurry
                } else {
                    Urgency::Critical
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cues::RecordedCues;
    use crate::models::START_LEVEL_LABEL;

    /// Two stages of 12 and 10 ticks, 2s preparation, 3s rest
    fn small_session(names: &[&str]) -> TestSession<RecordedCues> {
        let table = StageTable::new(vec![
            Stage::new("1", 12.0, 6.0, 160),
            Stage::new("2", 14.4, 5.0, 200),
        ])
        .unwrap();
        let timing = ProtocolTiming {
            preparation_seconds: 2,
            rest_seconds: 3,
        };
        TestSession::start(names.iter().copied(), table, timing, RecordedCues::new()).unwrap()
    }

    fn tick_n<C: CueSink>(session: &mut TestSession<C>, n: u32) -> TickOutcome {
        let mut last = TickOutcome::Idle;
        for _ in 0..n {
            last = session.tick();
        }
        last
    }

    #[test]
    fn test_start_rejects_empty_roster() {
        let names: Vec<&str> = Vec::new();
        let result = TestSession::start(names, StageTable::default(), ProtocolTiming::default(), SilentCues);
        assert!(matches!(result, Err(RosterError::EmptyRoster)));
    }

    #[test]
    fn test_preparation_countdown() {
        let mut session = small_session(&["Ana"]);
        assert_eq!(session.phase(), Phase::Preparing);
        assert!(session.current_stage().is_none());

        assert_eq!(
            session.tick(),
            TickOutcome::Counting {
                phase: Phase::Preparing,
                remaining: 1
            }
        );
        assert_eq!(
            session.tick(),
            TickOutcome::Transitioned {
                from: Phase::Preparing,
                to: Phase::Running,
                stage_index: 0
            }
        );
        assert_eq!(session.remaining(), 12);
        assert_eq!(session.cues().cues(), &[Cue::Start]);
    }

    #[test]
    fn test_zero_length_phases_last_one_tick() {
        let table = StageTable::new(vec![Stage::new("1", 12.0, 0.5, 20)]).unwrap();
        let timing = ProtocolTiming {
            preparation_seconds: 0,
            rest_seconds: 0,
        };
        let mut session = TestSession::start(["Ana"], table, timing, RecordedCues::new()).unwrap();
        assert_eq!(session.remaining(), 1);

        assert!(matches!(session.tick(), TickOutcome::Transitioned { to: Phase::Running, .. }));
        assert!(matches!(session.tick(), TickOutcome::Transitioned { to: Phase::Resting, .. }));
        assert_eq!(session.remaining(), 1);
        assert!(matches!(session.tick(), TickOutcome::Completed { .. }));
        assert_eq!(session.elapsed_seconds(), 3);
    }

    #[test]
    fn test_running_and_resting_cycle() {
        let mut session = small_session(&["Ana"]);
        tick_n(&mut session, 2);

        let outcome = tick_n(&mut session, 12);
        assert_eq!(
            outcome,
            TickOutcome::Transitioned {
                from: Phase::Running,
                to: Phase::Resting,
                stage_index: 0
            }
        );
        assert_eq!(session.remaining(), 3);

        let outcome = tick_n(&mut session, 3);
        assert_eq!(
            outcome,
            TickOutcome::Transitioned {
                from: Phase::Resting,
                to: Phase::Running,
                stage_index: 1
            }
        );
        assert_eq!(session.remaining(), 10);
        assert_eq!(session.cues().cues(), &[Cue::Start, Cue::Rest, Cue::NextStage]);
    }

    #[test]
    fn test_exhaustion_credits_last_stage() {
        let mut session = small_session(&["Ana"]);
        // 2 prep + 12 run + 3 rest + 10 run + 3 rest
        let outcome = tick_n(&mut session, 30);

        match outcome {
            TickOutcome::Completed { reason, results } => {
                assert_eq!(reason, Completion::TableExhausted);
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].distance, 200);
                assert_eq!(results[0].level, "2");
            }
            other => panic!("expected completion, got {:?}", other),
        }
        assert_eq!(session.tick(), TickOutcome::Idle);
        assert_eq!(session.elapsed_seconds(), 30);
    }

    #[test]
    fn test_elimination_before_first_stage_completed() {
        let mut session = small_session(&["Ana", "Bruno"]);
        tick_n(&mut session, 5);

        session.warn("Ana").unwrap();
        let outcome = session.warn("Ana").unwrap();
        match outcome {
            WarnOutcome::Eliminated(result) => {
                assert_eq!(result.distance, 0);
                assert_eq!(result.level, START_LEVEL_LABEL);
            }
            other => panic!("expected elimination, got {:?}", other),
        }
        assert!(!session.is_completed());
    }

    #[test]
    fn test_last_elimination_completes_immediately() {
        let mut session = small_session(&["Ana"]);
        tick_n(&mut session, 3);

        session.warn("Ana").unwrap();
        session.warn("Ana").unwrap();

        assert!(session.is_completed());
        assert_eq!(session.completion(), Some(Completion::AllEliminated));
        assert_eq!(session.results().unwrap().len(), 1);
        assert_eq!(session.tick(), TickOutcome::Idle);
    }

    #[test]
    fn test_elimination_during_preparation() {
        let mut session = small_session(&["Ana", "Bruno"]);
        session.warn("Ana").unwrap();
        session.warn("Ana").unwrap();
        assert!(!session.is_completed());
        assert_eq!(session.roster().active_count(), 1);

        session.warn("Bruno").unwrap();
        session.warn("Bruno").unwrap();
        assert!(session.is_completed());
        assert!(session.results().unwrap().iter().all(|r| r.distance == 0));
        assert!(session.cues().cues().is_empty());
    }

    #[test]
    fn test_abort() {
        let mut session = small_session(&["Ana", "Bruno"]);
        assert_eq!(session.abort().unwrap_err(), SessionError::NotStarted);

        // Into stage 1 running
        tick_n(&mut session, 2 + 12 + 3 + 1);
        assert_eq!(session.stage_index(), 1);

        let results = session.abort().unwrap().to_vec();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.distance == 160 && r.level == "1"));
        assert_eq!(session.completion(), Some(Completion::Aborted));

        let again = session.abort().unwrap().to_vec();
        assert_eq!(again, results);
        assert_eq!(session.tick(), TickOutcome::Idle);
    }

    #[test]
    fn test_urgency() {
        let mut session = small_session(&["Ana"]);
        assert_eq!(session.urgency(), Urgency::Idle);

        tick_n(&mut session, 2);
        assert_eq!(session.urgency(), Urgency::Steady);

        // 12 ticks: 4 left = 33%
        tick_n(&mut session, 8);
        assert_eq!(session.urgency(), Urgency::Hurry);

        // 2 left = 16%
        tick_n(&mut session, 2);
        assert_eq!(session.urgency(), Urgency::Critical);

        tick_n(&mut session, 2);
        assert_eq!(session.urgency(), Urgency::Recovery);
    }
}
