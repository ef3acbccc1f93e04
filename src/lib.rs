// Library interface for yoyors modules
// This allows the binary and integration tests to share the core

pub mod config;
pub mod cues;
pub mod display;
pub mod error;
pub mod export;
pub mod history;
pub mod logging;
pub mod models;
pub mod roster;
pub mod runner;
pub mod session;
pub mod stages;
pub mod tones;
pub mod vo2max;

// Re-export commonly used types for convenience
pub use models::*;
pub use cues::{open_sink, Cue, CueOutput, CueSink, RecordedCues, SilentCues, TerminalBell};
pub use error::{ErrorSeverity, RosterError, SessionError, StageTableError, YoyoError};
pub use history::{HistoryError, HistoryFilters, HistoryStore, MemoryHistory, SqliteHistory};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use roster::{Roster, WarnOutcome};
pub use session::{Completion, Phase, ProtocolTiming, TestSession, TickOutcome, Urgency};
pub use stages::StageTable;
pub use tones::{ToneCues, ToneError};
