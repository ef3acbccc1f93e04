//! Unified error hierarchy for yoyors
//!
//! Validation errors raised by the roster and session are recoverable by the
//! caller, who re-prompts or ignores the command. Storage and export failures
//! are wrapped into the top-level [`YoyoError`].

use thiserror::Error;

use crate::export::ExportError;
use crate::history::HistoryError;

/// Top-level error type for all yoyors operations
#[derive(Debug, Error)]
pub enum YoyoError {
    /// Athlete registration or warning errors
    #[error("Roster error: {0}")]
    Roster(#[from] RosterError),

    /// Test clock errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Result history errors
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// Export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

/// Athlete roster validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// No athletes were registered
    #[error("At least one athlete is required")]
    EmptyRoster,

    /// Two names collide ignoring case
    #[error("Duplicate athlete name: {name}")]
    DuplicateName { name: String },

    /// Name is empty after trimming
    #[error("Athlete name cannot be blank")]
    BlankName,

    /// No athlete registered under that name
    #[error("Unknown athlete: {name}")]
    UnknownAthlete { name: String },

    /// Athlete already has a final result
    #[error("Athlete already finished: {name}")]
    AlreadyFinished { name: String },
}

/// Test clock command errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Abort requested while still in the preparation countdown
    #[error("Test has not started yet")]
    NotStarted,
}

/// Stage table validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageTableError {
    #[error("Stage table is empty")]
    Empty,

    #[error("Cumulative distance must strictly increase at stage {index}: {previous}m then {current}m")]
    NonIncreasingDistance { index: usize, previous: u32, current: u32 },

    #[error("Speed must not decrease at stage {index}: {previous} km/h then {current} km/h")]
    DecreasingSpeed { index: usize, previous: f64, current: f64 },

    #[error("Shuttle time must be positive at stage {index}: {seconds}s")]
    InvalidShuttleTime { index: usize, seconds: f64 },
}

impl YoyoError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            YoyoError::Roster(_) => ErrorSeverity::Warning,
            YoyoError::Session(_) => ErrorSeverity::Warning,
            YoyoError::History(HistoryError::Sqlite(_)) => ErrorSeverity::Critical,
            YoyoError::History(_) | YoyoError::Export(_) => ErrorSeverity::Error,
        }
    }

    /// Log at the error's severity and return the operator message.
    ///
    /// Warnings are operator input the console already echoes, so they log at info.
    pub fn report(&self) -> String {
        match self.severity() {
            ErrorSeverity::Critical => tracing::error!(error = %self, critical = true, "Operation failed"),
            ErrorSeverity::Error => tracing::error!(error = %self, "Operation failed"),
            ErrorSeverity::Warning => tracing::info!(error = %self, "Command rejected"),
        }
        self.user_message()
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            YoyoError::Roster(RosterError::DuplicateName { name }) => {
                format!("\"{}\" is already on the list. Use distinct names.", name)
            }
            YoyoError::Roster(RosterError::EmptyRoster) => {
                "Add at least one athlete before starting the test.".to_string()
            }
            YoyoError::Roster(RosterError::UnknownAthlete { name }) => {
                format!("No athlete named \"{}\" in this test.", name)
            }
            YoyoError::History(HistoryError::Sqlite(_)) => {
                "Unable to open the result history. Check the storage path in your configuration."
                    .to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Storage unusable
    Critical,
    /// Operation failed
    Error,
    /// Invalid input that the operator can correct
    Warning,
}
