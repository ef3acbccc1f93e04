//! Audio cue signalling
//!
//! The test clock emits a cue on every shuttle boundary. How the cue is
//! rendered is up to the sink; sinks must not block.

use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::tones::ToneCues;

/// Transition that triggered a cue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    /// Preparation countdown over, first shuttle begins
    Start,
    /// Shuttle time over, recovery begins
    Rest,
    /// Recovery over, next shuttle begins
    NextStage,
}

/// Fire-and-forget cue output
pub trait CueSink {
    fn emit(&mut self, cue: Cue);
}

impl<S: CueSink + ?Sized> CueSink for Box<S> {
    fn emit(&mut self, cue: Cue) {
        (**self).emit(cue)
    }
}

/// Sink that ignores every cue
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentCues;

impl CueSink for SilentCues {
    fn emit(&mut self, _cue: Cue) {}
}

/// Rings the terminal bell (BEL) on stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl CueSink for TerminalBell {
    fn emit(&mut self, cue: Cue) {
        let mut stderr = std::io::stderr();
        // A failed bell must never interrupt the test
        if let Err(e) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
            tracing::warn!(?cue, error = %e, "Failed to ring terminal bell");
        }
    }
}

/// How cues are rendered during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CueOutput {
    /// Synthesised tones on the default audio device
    #[default]
    Tone,
    /// Terminal bell
    Bell,
    Silent,
}

impl std::fmt::Display for CueOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CueOutput::Tone => write!(f, "tone"),
            CueOutput::Bell => write!(f, "bell"),
            CueOutput::Silent => write!(f, "silent"),
        }
    }
}

impl std::str::FromStr for CueOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tone" => Ok(CueOutput::Tone),
            "bell" => Ok(CueOutput::Bell),
            "silent" | "off" => Ok(CueOutput::Silent),
            _ => Err(format!("Invalid cue output: {} (expected tone, bell or silent)", s)),
        }
    }
}

/// Build the sink for `output`.
///
/// Tones fall back to the terminal bell when no audio device opens.
pub fn open_sink(output: CueOutput, volume: f32) -> Box<dyn CueSink> {
    match output {
        CueOutput::Tone => match ToneCues::open(volume) {
            Ok(tones) => Box::new(tones),
            Err(e) => {
                tracing::warn!(error = %e, "Tone cues unavailable, using the terminal bell");
                Box::new(TerminalBell)
            }
        },
        CueOutput::Bell => Box::new(TerminalBell),
        CueOutput::Silent => Box::new(SilentCues),
    }
}

/// Keeps every emitted cue in order
#[derive(Debug, Default, Clone)]
pub struct RecordedCues {
    cues: Vec<Cue>,
}

impl RecordedCues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn count(&self, cue: Cue) -> usize {
        self.cues.iter().filter(|c| **c == cue).count()
    }
}

impl CueSink for RecordedCues {
    fn emit(&mut self, cue: Cue) {
        tracing::trace!(?cue, "Cue recorded");
        self.cues.push(cue);
    }
}
