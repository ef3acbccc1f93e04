//! Athlete roster for a single test run
//!
//! Tracks warnings and eliminations. Two warnings end an athlete's run; the
//! result credits only fully completed stages.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::error::RosterError;
use crate::models::{Athlete, AthleteStatus, StageCredit, TestResult};

/// Warnings that eliminate an athlete
pub const WARNINGS_TO_ELIMINATE: u8 = 2;

/// Effect of a recorded warning
#[derive(Debug, Clone, PartialEq)]
pub enum WarnOutcome {
    /// First warning; the athlete keeps running
    Warned { name: String },
    /// Second warning; the athlete is finished with this result
    Eliminated(TestResult),
}

/// Ordered collection of athletes taking part in one test
#[derive(Debug, Clone)]
pub struct Roster {
    athletes: Vec<Athlete>,
}

impl Roster {
    /// Register athletes in the given order.
    ///
    /// Names are trimmed and must be unique ignoring case.
    pub fn register<I, S>(names: I) -> Result<Self, RosterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut athletes = Vec::new();

        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                return Err(RosterError::BlankName);
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(RosterError::DuplicateName {
                    name: name.to_string(),
                });
            }
            athletes.push(Athlete::new(name.to_string()));
        }

        if athletes.is_empty() {
            return Err(RosterError::EmptyRoster);
        }

        tracing::debug!(count = athletes.len(), "Roster registered");
        Ok(Self { athletes })
    }

    /// Record a warning for `name`, eliminating on the second one
    pub fn warn(
        &mut self,
        name: &str,
        credit: &StageCredit,
        at: DateTime<Utc>,
    ) -> Result<WarnOutcome, RosterError> {
        let athlete = self
            .find_mut(name)
            .ok_or_else(|| RosterError::UnknownAthlete {
                name: name.trim().to_string(),
            })?;

        if !athlete.is_active() {
            return Err(RosterError::AlreadyFinished {
                name: athlete.name.clone(),
            });
        }

        // The eliminating warning ends the run; the count stays at 0 or 1
        if athlete.warnings + 1 < WARNINGS_TO_ELIMINATE {
            athlete.warnings += 1;
            tracing::info!(athlete = %athlete.name, "Warning recorded");
            return Ok(WarnOutcome::Warned {
                name: athlete.name.clone(),
            });
        }

        let result = TestResult::from_credit(athlete.name.clone(), credit, at);
        athlete.status = AthleteStatus::Finished(result.clone());

        tracing::info!(
            athlete = %result.name,
            distance = result.distance,
            level = %result.level,
            "Athlete eliminated"
        );
        Ok(WarnOutcome::Eliminated(result))
    }

    /// Finish every still-active athlete with the same credit.
    ///
    /// Already finished athletes keep their result. Returns how many
    /// athletes were finished by this call.
    pub fn force_finish_all(&mut self, credit: &StageCredit, at: DateTime<Utc>) -> usize {
        let mut finished = 0;

        for athlete in self.athletes.iter_mut().filter(|a| a.is_active()) {
            let result = TestResult::from_credit(athlete.name.clone(), credit, at);
            athlete.status = AthleteStatus::Finished(result);
            finished += 1;
        }

        if finished > 0 {
            tracing::info!(
                finished,
                distance = credit.distance,
                level = %credit.level,
                "Remaining athletes finished"
            );
        }
        finished
    }

    pub fn active_count(&self) -> usize {
        self.athletes.iter().filter(|a| a.is_active()).count()
    }

    pub fn all_finished(&self) -> bool {
        self.athletes.iter().all(|a| !a.is_active())
    }

    pub fn athletes(&self) -> &[Athlete] {
        &self.athletes
    }

    pub fn len(&self) -> usize {
        self.athletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.athletes.is_empty()
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<&Athlete> {
        let key = name.trim().to_lowercase();
        self.athletes.iter().find(|a| a.name.to_lowercase() == key)
    }

    /// Results of finished athletes, in registration order
    pub fn results(&self) -> Vec<TestResult> {
        self.athletes
            .iter()
            .filter_map(|a| a.result().cloned())
            .collect()
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Athlete> {
        let key = name.trim().to_lowercase();
        self.athletes.iter_mut().find(|a| a.name.to_lowercase() == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::START_LEVEL_LABEL;

    fn credit(distance: u32, level: &str) -> StageCredit {
        StageCredit {
            distance,
            level: level.to_string(),
        }
    }

    #[test]
    fn test_register() {
        let roster = Roster::register(["Ana", " Bruno "]).unwrap();

        assert_eq!(roster.len(), 2);
        assert_eq!(roster.active_count(), 2);
        assert!(!roster.all_finished());
        assert_eq!(roster.athletes()[1].name(), "Bruno");
        assert_eq!(roster.athletes()[0].warnings(), 0);
        assert!(roster.athletes()[0].result().is_none());
    }

    #[test]
    fn test_register_rejects_invalid_names() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(Roster::register(empty).unwrap_err(), RosterError::EmptyRoster);

        assert_eq!(
            Roster::register(["Ana", "ANA"]).unwrap_err(),
            RosterError::DuplicateName {
                name: "ANA".to_string()
            }
        );

        assert_eq!(Roster::register(["Ana", "  "]).unwrap_err(), RosterError::BlankName);
    }

    #[test]
    fn test_two_warnings_eliminate() {
        let mut roster = Roster::register(["Ana", "Bruno"]).unwrap();
        let now = Utc::now();

        let first = roster.warn("ana", &StageCredit::start(), now).unwrap();
        assert_eq!(first, WarnOutcome::Warned { name: "Ana".to_string() });
        assert_eq!(roster.get("Ana").unwrap().warnings(), 1);
        assert_eq!(roster.active_count(), 2);

        let second = roster.warn("Ana", &StageCredit::start(), now).unwrap();
        match second {
            WarnOutcome::Eliminated(result) => {
                assert_eq!(result.distance, 0);
                assert_eq!(result.level, START_LEVEL_LABEL);
                assert_eq!(result.vo2max, 36.4);
            }
            other => panic!("expected elimination, got {:?}", other),
        }
        assert_eq!(roster.active_count(), 1);
        assert_eq!(roster.get("Ana").unwrap().warnings(), 1);
    }

    #[test]
    fn test_warn_errors() {
        let mut roster = Roster::register(["Ana"]).unwrap();
        let now = Utc::now();

        assert_eq!(
            roster.warn("Carla", &StageCredit::start(), now).unwrap_err(),
            RosterError::UnknownAthlete {
                name: "Carla".to_string()
            }
        );

        roster.warn("Ana", &StageCredit::start(), now).unwrap();
        roster.warn("Ana", &StageCredit::start(), now).unwrap();
        assert_eq!(
            roster.warn("Ana", &credit(400, "13.2"), now).unwrap_err(),
            RosterError::AlreadyFinished {
                name: "Ana".to_string()
            }
        );
        assert_eq!(roster.get("Ana").unwrap().result().unwrap().distance, 0);
    }

    #[test]
    fn test_force_finish_all_is_idempotent() {
        let mut roster = Roster::register(["Ana", "Bruno", "Carla"]).unwrap();
        let now = Utc::now();

        roster.warn("Bruno", &StageCredit::start(), now).unwrap();
        roster.warn("Bruno", &credit(80, "9.1"), now).unwrap();

        assert_eq!(roster.force_finish_all(&credit(160, "11.2"), now), 2);
        assert!(roster.all_finished());
        let first = roster.results();

        assert_eq!(roster.force_finish_all(&credit(999, "x"), Utc::now()), 0);
        assert_eq!(roster.results(), first);

        assert_eq!(first[0].distance, 160);
        assert_eq!(first[1].distance, 80);
        assert_eq!(first[1].level, "9.1");
    }
}
